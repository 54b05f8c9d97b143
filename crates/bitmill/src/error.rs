//! Error types shared across the crate.
//!
//! Compilation produces a [`CompileError`]: a [`CompileErrorKind`] plus the
//! source location and the offending token text. Execution produces a
//! [`RunError`]. The crate-level [`Error`] is the sum of both, and
//! [`Result`] is the crate-wide result alias.

use thiserror::Error;

use crate::diagnostic::Location;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error: everything that can go wrong between reading a source
/// file and finishing a run.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Run(#[from] RunError),
}

/// A compile-time error with its source position.
///
/// `token` is the text of the token the compiler was looking at when the
/// error was raised; it is empty for errors with no single offending token
/// (an empty program, an unexpected end of input).
#[derive(Debug, Clone, Error)]
#[error("{location}: {kind}")]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub location: Location,
    pub token: String,
}

/// Everything the compiler can reject, one variant per rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileErrorKind {
    #[error("empty program")]
    EmptyProgram,
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("included file name `{name}` must be bare (no path separators)")]
    IncludeBadName { name: String },
    #[error("cyclic include of `{name}`")]
    IncludeCycle { name: String },
    #[error("cannot read `{file}`: {message}")]
    Io { file: String, message: String },
    #[error("malformed function descriptor `{token}` (expected name:in:out)")]
    BadDescriptor { token: String },
    #[error("`{name}` is not a valid identifier")]
    BadName { name: String },
    #[error("function `{descriptor}` declares zero output bits")]
    OutZero { descriptor: String },
    #[error("function `{descriptor}` is already defined")]
    DuplicateFunction { descriptor: String },
    #[error("malformed format string `{token}`")]
    BadFormat { token: String },
    #[error("format widths sum to {sum}, declared length is {declared}")]
    FormatLenMismatch { declared: u32, sum: u32 },
    #[error("format piece has zero width")]
    ZeroPieceWidth,
    #[error("expected `{expected}`, found `{found}`")]
    ExpectedToken {
        expected: &'static str,
        found: String,
    },
    #[error("unknown operation `{token}`")]
    UnknownOp { token: String },
    #[error("unknown function `{descriptor}`")]
    UnknownFunction { descriptor: String },
    #[error("variable `{name}` is not visible here")]
    UndefinedVariable { name: String },
    #[error("variable `{name}` is already declared in this function")]
    DuplicateVariable { name: String },
    #[error("variable `{name}` has {declared} bits, used with width {used}")]
    VarSizeMismatch {
        name: String,
        declared: u32,
        used: u32,
    },
    #[error("width must be positive")]
    ZeroWidth,
    #[error("cannot pop the stack into a constant")]
    ConstantToSelf,
    #[error("constant is never pushed onto the stack")]
    ConstantNotPushed,
    #[error("constant `{constant}` does not fit in {width} bits")]
    ConstantTooWide { constant: String, width: u32 },
    #[error("malformed assignment `{token}`")]
    BadAssignSyntax { token: String },
    #[error("malformed reduce `{token}`")]
    BadReduceSyntax { token: String },
    #[error("malformed call `{token}`")]
    BadCallSyntax { token: String },
    #[error("`{radix}` is not a radix (expected d, h or b)")]
    BadRadix { radix: String },
    #[error("`{token}` is not a valid constant")]
    BadConstant { token: String },
    #[error("stack underflow: need {need} bits, have {have}")]
    StackUnderflow { need: u32, have: u32 },
    #[error("stack holds {found} bits, expected {expected}")]
    StackLenMismatch { expected: u32, found: u32 },
    #[error("if branches leave different stack depths ({then_len} vs {else_len})")]
    IfElseMismatch { then_len: u32, else_len: u32 },
    #[error("depth check inside a loop body that changes the stack depth")]
    PointInVariantLoop,
    #[error("function `{descriptor}` calls itself (possibly indirectly)")]
    Recursion { descriptor: String },
}

/// Everything that can go wrong while running a compiled program.
///
/// The compiler has already proved the stack and scope invariants, so the
/// only user-facing failures concern the supplied inputs and unimplemented
/// native declarations. `Internal` marks a broken invariant and is a bug in
/// the toolchain, never in the circuit program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("unknown function `{descriptor}`")]
    UnknownFunction { descriptor: String },
    #[error("input value `{value}` does not fit in {width} bits")]
    InputLengthMismatch { value: String, width: u32 },
    #[error("{given} input values supplied, format declares {expected} fields")]
    InputCountMismatch { expected: usize, given: usize },
    #[error("native function `{descriptor}` has no implementation")]
    UnknownNative { descriptor: String },
    #[error("internal interpreter error: {0}")]
    Internal(String),
}
