//! High-level embedding facade.
//!
//! A [`Workbench`] couples a compiled program with a capturing sink, so
//! embedders get compile-warnings and rendered run output without wiring
//! up their own sink. The lower-level pieces ([`compiler::compile`],
//! [`Program::run`]) remain available for callers that need custom
//! providers or sinks.
//!
//! [`compiler::compile`]: crate::compiler::compile

use std::path::Path;

use crate::compiler;
use crate::diagnostic::{BufferSink, Location, Warning};
use crate::error::{CompileError, CompileErrorKind, Result};
use crate::lexer::{DirSource, MemSource, SourceProvider};
use crate::program::Program;
use crate::vm::{RunOutput, RunParams};

/// A compiled program plus captured diagnostics and output.
///
/// # Example
///
/// ```
/// use bitmill::{RunParams, Workbench};
/// use num_bigint::BigUint;
///
/// let mut bench = Workbench::compile_source(
///     "func nand:2:1 #1b+1b:1b { >and:2:1> >not:1:1> }",
/// ).unwrap();
///
/// let out = bench.run("nand:2:1", RunParams::list([1u32, 1])).unwrap();
/// assert_eq!(out.value, BigUint::from(0u32));
///
/// let out = bench.run("nand:2:1", RunParams::list([1u32, 0])).unwrap();
/// assert_eq!(out.value, BigUint::from(1u32));
/// ```
#[derive(Debug)]
pub struct Workbench {
    program: Program,
    sink: BufferSink,
}

impl Workbench {
    /// Compile `root` through an arbitrary source provider.
    pub fn compile(provider: &dyn SourceProvider, root: &str) -> Result<Self> {
        let mut sink = BufferSink::new();
        let program = compiler::compile(provider, root, &mut sink)?;
        Ok(Workbench { program, sink })
    }

    /// Compile a program from a file on disk. Includes resolve against the
    /// file's directory.
    pub fn compile_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let Some(name) = path.file_name() else {
            return Err(CompileError {
                kind: CompileErrorKind::Io {
                    file: path.display().to_string(),
                    message: "path has no file name".to_string(),
                },
                location: Location::new(path.display().to_string(), 0, 0),
                token: String::new(),
            }
            .into());
        };
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        let provider = DirSource::new(dir.unwrap_or_else(|| Path::new(".")));
        Self::compile(&provider, &name.to_string_lossy())
    }

    /// Compile a single in-memory source, named `main`. Includes are not
    /// resolvable; use [`Workbench::compile`] with a [`MemSource`] holding
    /// every file for multi-file programs.
    pub fn compile_source(source: &str) -> Result<Self> {
        let mut provider = MemSource::new();
        provider.insert("main", source);
        Self::compile(&provider, "main")
    }

    /// The compiled program graph.
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Warnings accumulated during compilation, in source order.
    pub fn warnings(&self) -> &[Warning] {
        &self.sink.warnings
    }

    /// Execute a function. Rendered result lines are captured; drain them
    /// with [`Workbench::take_output`].
    pub fn run(&mut self, descriptor: &str, params: RunParams) -> Result<RunOutput> {
        Ok(self.program.run(descriptor, params, &mut self.sink)?)
    }

    /// Take and clear the captured run output lines.
    pub fn take_output(&mut self) -> Vec<String> {
        self.sink.take_lines()
    }

    /// Give up the workbench, keeping the program.
    pub fn into_program(self) -> Program {
        self.program
    }
}
