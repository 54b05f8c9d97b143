//! Bitmill: a compiler and interpreter for a bit-oriented stack language
//! describing fixed-width logic circuits.
//!
//! Programs declare functions with fixed input and output bit widths,
//! written over a single operand stack of bits. The compiler parses source
//! in one pass while proving rich static rules (most importantly that the
//! stack depth is known and non-negative at every token), and the
//! interpreter walks the resulting graph over a bit stack.
//!
//! # Quick start
//!
//! ```
//! use bitmill::{RunParams, Workbench};
//! use num_bigint::BigUint;
//!
//! // xor of four input bits, folded through an accumulator variable.
//! let mut bench = Workbench::compile_source(r#"
//!     func xor4:4:1 #4b:1b {
//!         def { a:1 }
//!         >a:1
//!         loop 3 { a:1> >xor:2:1> >a:1 }
//!         a:1>
//!     }
//! "#).unwrap();
//!
//! let out = bench.run("xor4:4:1", RunParams::single(0b1110u32)).unwrap();
//! assert_eq!(out.value, BigUint::from(1u32));
//! ```
//!
//! # The language
//!
//! - `func name:in:out [#format] { … }` declares a function; its input
//!   bits are the initial stack contents and its body must leave exactly
//!   `out` bits. `func name:in:out native` declares a native.
//! - `def { v:4 w:1 }` declares fixed-width variables, scoped to the
//!   enclosing block, zero-initialized per activation.
//! - `>v:4` pops four bits into `v`; `v:4>` pushes `v`; `>v:4>` snapshots
//!   the stack top without consuming it. `10#d:4>` pushes a constant.
//! - `>name:in:out>` calls a function. Five natives are built in:
//!   `not:1:1`, `xor:2:1`, `or:2:1`, `and:2:1`, `im:2:1`.
//! - `if { … } else { … }` pops the condition bit; both arms must leave
//!   the same depth. `loop n { … }` repeats a body `n` times.
//! - `>_:k` pops `k` bits, `>>_` pops everything, `.` asserts depth zero
//!   at compile time.
//! - `#include name` splices another file; `//` starts a comment.
//!
//! # Guarantees
//!
//! - A compiled program is immutable and freely shareable; every run owns
//!   its stack and frames.
//! - The compiler rejects recursion (the user call graph is a DAG), stack
//!   underflow at any program point, width mismatches, and undeclared or
//!   shadowed variables, so a successful compile cannot fail at runtime on
//!   anything but malformed inputs or an undefined native.
//!
//! # Not supported
//!
//! - Signed or floating-point arithmetic, dynamic widths
//! - Recursion, first-class functions
//! - Any optimization or code generation; the graph is walked directly

mod bits;
pub mod compiler;
mod diagnostic;
mod error;
mod format;
mod lexer;
mod natives;
mod program;
mod vm;
mod workbench;

pub use bits::{BitStack, Bits, Input};
pub use diagnostic::{BufferSink, ConsoleSink, Location, Sink, Warning, WarningKind};
pub use error::{CompileError, CompileErrorKind, Error, Result, RunError};
pub use format::{parse_literal, render_fields, render_piece};
pub use lexer::{DirSource, MemSource, SourceProvider, Token};
pub use program::{
    AssignTarget, Block, Callee, Format, FormatPiece, FuncId, Function, NativeId, Node, Program,
    Radix, VarId, Variable,
};
pub use vm::{InputValue, RunOutput, RunParams};
pub use workbench::Workbench;
