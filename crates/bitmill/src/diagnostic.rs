//! Source locations, compile warnings, and output sinks.
//!
//! Every diagnostic the toolchain emits points at a `file:line:col`
//! position. Warnings are accumulated during compilation and flushed
//! through a [`Sink`] once compilation succeeds: first a count line, then
//! one warning per line. The same sink receives run output (rendered
//! results), so embedders can capture everything the toolchain would print.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A position in a source file. Lines and columns are 1-based; a line of 0
/// marks positions that precede any token (an unreadable root file, an
/// empty program).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Location {
    pub file: String,
    pub line: u32,
    pub col: u32,
}

impl Location {
    pub fn new(file: impl Into<String>, line: u32, col: u32) -> Self {
        Self {
            file: file.into(),
            line,
            col,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}

/// The closed set of compile warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum WarningKind {
    /// A variable was declared and never mentioned again.
    UnusedVariable,
    /// A loop with fewer than two iterations.
    TrivialLoop,
    /// `>_:0` pops nothing.
    ZeroReduce,
}

/// A compile warning with its source position and the token it refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Warning {
    pub kind: WarningKind,
    pub location: Location,
    pub token: String,
}

impl Warning {
    pub fn new(kind: WarningKind, location: Location, token: impl Into<String>) -> Self {
        Self {
            kind,
            location,
            token: token.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: warning: ", self.location)?;
        match self.kind {
            WarningKind::UnusedVariable => write!(f, "unused variable `{}`", self.token),
            WarningKind::TrivialLoop => {
                write!(f, "loop runs {} times and could be unrolled", self.token)
            }
            WarningKind::ZeroReduce => write!(f, "reduce of zero bits has no effect"),
        }
    }
}

/// Receiver for everything the toolchain reports: compile warnings and run
/// output. The core performs no console I/O itself; the CLI passes a
/// [`ConsoleSink`], tests and embedders a [`BufferSink`].
pub trait Sink {
    /// Called once at the end of a successful compilation with every
    /// accumulated warning, in source order.
    fn warnings(&mut self, warnings: &[Warning]);

    /// A single line of run output.
    fn print(&mut self, line: &str);
}

/// Prints warnings to stderr and run output to stdout.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl Sink for ConsoleSink {
    fn warnings(&mut self, warnings: &[Warning]) {
        if warnings.is_empty() {
            return;
        }
        eprintln!("{} warning(s):", warnings.len());
        for w in warnings {
            eprintln!("{w}");
        }
    }

    fn print(&mut self, line: &str) {
        println!("{line}");
    }
}

/// Captures warnings and output lines for later inspection.
#[derive(Debug, Default)]
pub struct BufferSink {
    pub warnings: Vec<Warning>,
    pub lines: Vec<String>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take and clear the captured output lines.
    pub fn take_lines(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }
}

impl Sink for BufferSink {
    fn warnings(&mut self, warnings: &[Warning]) {
        self.warnings.extend_from_slice(warnings);
    }

    fn print(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display() {
        let loc = Location::new("adder.bm", 3, 14);
        assert_eq!(loc.to_string(), "adder.bm:3:14");
    }

    #[test]
    fn test_warning_display() {
        let w = Warning::new(
            WarningKind::UnusedVariable,
            Location::new("main.bm", 2, 7),
            "carry",
        );
        assert_eq!(w.to_string(), "main.bm:2:7: warning: unused variable `carry`");
    }

    #[test]
    fn test_buffer_sink_captures() {
        let mut sink = BufferSink::new();
        sink.print("nand(1, 1) = 0");
        let w = Warning::new(WarningKind::ZeroReduce, Location::new("a", 1, 1), ">_:0");
        sink.warnings(&[w.clone()]);
        assert_eq!(sink.lines, vec!["nand(1, 1) = 0".to_string()]);
        assert_eq!(sink.warnings, vec![w]);
        assert!(sink.take_lines().len() == 1 && sink.lines.is_empty());
    }
}
