//! Source loading and tokenization.
//!
//! This is the only module that touches source text. It resolves logical
//! file names through a [`SourceProvider`], expands `#include` directives
//! in place (rejecting cycles), and flattens everything into one token
//! stream. Tokens carry their file, line and column so every later
//! diagnostic can point back at real source positions.
//!
//! Tokenization is line-oriented: `//` starts a comment, the three
//! self-delimiting characters `.`, `{`, `}` are padded with spaces, and the
//! line is then split on whitespace. Columns are recovered by searching for
//! each piece in the original line, left to right.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::diagnostic::Location;
use crate::error::{CompileError, CompileErrorKind};

/// Resolves a logical (bare) file name to its text.
pub trait SourceProvider {
    fn read(&self, name: &str) -> io::Result<String>;
}

/// Reads files from a single directory; the directory implicit in the root
/// file's path.
#[derive(Debug, Clone)]
pub struct DirSource {
    dir: PathBuf,
}

impl DirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SourceProvider for DirSource {
    fn read(&self, name: &str) -> io::Result<String> {
        fs::read_to_string(self.dir.join(name))
    }
}

/// In-memory provider for tests and embedders.
#[derive(Debug, Clone, Default)]
pub struct MemSource {
    files: HashMap<String, String>,
}

impl MemSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) -> &mut Self {
        self.files.insert(name.into(), text.into());
        self
    }
}

impl SourceProvider for MemSource {
    fn read(&self, name: &str) -> io::Result<String> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no such file: {name}")))
    }
}

/// One source token. Comparison is by text only; the position is
/// diagnostic metadata.
#[derive(Debug, Clone)]
pub struct Token {
    pub file: Arc<str>,
    pub line: u32,
    pub col: u32,
    pub text: String,
}

impl Token {
    pub fn location(&self) -> Location {
        Location::new(self.file.as_ref(), self.line, self.col)
    }

    /// Text equality against a literal.
    pub fn is(&self, text: &str) -> bool {
        self.text == text
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Token {}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Load `root` and every file it transitively includes, producing the flat
/// token stream the compiler consumes.
pub fn load(provider: &dyn SourceProvider, root: &str) -> Result<Vec<Token>, CompileError> {
    let mut tokens = Vec::new();
    let mut chain = Vec::new();
    load_into(provider, root, None, &mut chain, &mut tokens)?;
    debug!(root, count = tokens.len(), "tokenized");
    Ok(tokens)
}

fn load_into(
    provider: &dyn SourceProvider,
    name: &str,
    included_from: Option<Location>,
    chain: &mut Vec<String>,
    out: &mut Vec<Token>,
) -> Result<(), CompileError> {
    let at = |loc: Option<Location>| loc.unwrap_or_else(|| Location::new(name, 0, 0));

    if chain.iter().any(|n| n == name) {
        return Err(CompileError {
            kind: CompileErrorKind::IncludeCycle {
                name: name.to_string(),
            },
            location: at(included_from),
            token: name.to_string(),
        });
    }

    let text = provider.read(name).map_err(|e| CompileError {
        kind: CompileErrorKind::Io {
            file: name.to_string(),
            message: e.to_string(),
        },
        location: at(included_from),
        token: name.to_string(),
    })?;

    chain.push(name.to_string());
    let file: Arc<str> = Arc::from(name);

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx as u32 + 1;
        let line = raw.trim_end();

        // Comments run to end of line.
        let line = match line.find("//") {
            Some(pos) => &line[..pos],
            None => line,
        };

        if let Some(rest) = line.trim_start().strip_prefix("#include") {
            let target = rest.trim();
            let here = Location::new(
                name,
                line_no,
                raw.find("#include").map(|p| p as u32 + 1).unwrap_or(1),
            );
            if target.is_empty() || target.contains('/') || target.contains('\\') {
                return Err(CompileError {
                    kind: CompileErrorKind::IncludeBadName {
                        name: target.to_string(),
                    },
                    location: here,
                    token: target.to_string(),
                });
            }
            load_into(provider, target, Some(here), chain, out)?;
            continue;
        }

        tokenize_line(&file, line_no, raw, line, out);
    }

    chain.pop();
    Ok(())
}

/// Split one comment-stripped line into tokens. `raw` is the original line,
/// used only to recover column positions.
fn tokenize_line(file: &Arc<str>, line_no: u32, raw: &str, line: &str, out: &mut Vec<Token>) {
    let mut padded = String::with_capacity(line.len() + 8);
    for ch in line.chars() {
        match ch {
            '.' | '{' | '}' => {
                padded.push(' ');
                padded.push(ch);
                padded.push(' ');
            }
            _ => padded.push(ch),
        }
    }

    let mut search_from = 0usize;
    for piece in padded.split_whitespace() {
        // Every piece is a contiguous substring of the original line, so a
        // left-to-right search recovers its true column.
        let col = match raw[search_from..].find(piece) {
            Some(pos) => {
                let col = search_from + pos;
                search_from = col + piece.len();
                col as u32 + 1
            }
            None => search_from as u32 + 1,
        };
        out.push(Token {
            file: Arc::clone(file),
            line: line_no,
            col,
            text: piece.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        let mut mem = MemSource::new();
        mem.insert("main", src);
        load(&mem, "main").unwrap()
    }

    fn texts(src: &str) -> Vec<String> {
        tokens(src).into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn test_whitespace_split() {
        assert_eq!(texts("func a:1:1"), vec!["func", "a:1:1"]);
    }

    #[test]
    fn test_punctuation_self_delimits() {
        assert_eq!(texts("{.}"), vec!["{", ".", "}"]);
        assert_eq!(texts("a{b}"), vec!["a", "{", "b", "}"]);
    }

    #[test]
    fn test_comment_stripped() {
        assert_eq!(texts("a b // c d"), vec!["a", "b"]);
        assert!(texts("// whole line").is_empty());
    }

    #[test]
    fn test_columns_point_at_source() {
        let toks = tokens("ab {cd}  ef");
        let cols: Vec<u32> = toks.iter().map(|t| t.col).collect();
        assert_eq!(cols, vec![1, 4, 5, 7, 10]);
        let lines: Vec<u32> = toks.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![1; 5]);
    }

    #[test]
    fn test_repeated_piece_columns_advance() {
        let toks = tokens("x x x");
        let cols: Vec<u32> = toks.iter().map(|t| t.col).collect();
        assert_eq!(cols, vec![1, 3, 5]);
    }

    #[test]
    fn test_include_splices_in_place() {
        let mut mem = MemSource::new();
        mem.insert("main", "a\n#include lib\nd");
        mem.insert("lib", "b c");
        let toks = load(&mem, "main").unwrap();
        let texts: Vec<&str> = toks.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c", "d"]);
        assert_eq!(toks[1].file.as_ref(), "lib");
        assert_eq!(toks[3].file.as_ref(), "main");
    }

    #[test]
    fn test_include_cycle_rejected() {
        let mut mem = MemSource::new();
        mem.insert("main", "#include other");
        mem.insert("other", "#include main");
        let err = load(&mem, "main").unwrap_err();
        assert_eq!(
            err.kind,
            CompileErrorKind::IncludeCycle {
                name: "main".to_string()
            }
        );
        assert_eq!(err.location.file, "other");
    }

    #[test]
    fn test_include_with_path_rejected() {
        let mut mem = MemSource::new();
        mem.insert("main", "#include ../evil");
        let err = load(&mem, "main").unwrap_err();
        assert!(matches!(err.kind, CompileErrorKind::IncludeBadName { .. }));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let mem = MemSource::new();
        let err = load(&mem, "main").unwrap_err();
        assert!(matches!(err.kind, CompileErrorKind::Io { .. }));
    }

    #[test]
    fn test_diamond_include_is_not_a_cycle() {
        let mut mem = MemSource::new();
        mem.insert("main", "#include a\n#include b");
        mem.insert("a", "#include shared");
        mem.insert("b", "#include shared");
        mem.insert("shared", "x");
        let toks = load(&mem, "main").unwrap();
        assert_eq!(toks.len(), 2);
    }
}
