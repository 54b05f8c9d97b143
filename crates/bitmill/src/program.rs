//! The compiled program representation.
//!
//! This module defines what the compiler produces and the interpreter
//! walks. A [`Program`] owns its functions; each [`Function`] owns its top
//! level [`Block`] and its variable table; each block owns its code list.
//! Cross-references never own: a call site stores a [`Callee`] index into
//! the program's tables, and an assignment stores a [`VarId`] index into
//! the enclosing function's variable table.
//!
//! Once compilation succeeds the graph is immutable. Independent runs may
//! share one `Program` freely; all mutable state lives in the interpreter.

use std::collections::HashMap;

use num_bigint::BigUint;

use crate::error::CompileErrorKind;
use crate::lexer::Token;

/// Index of a user function in [`Program::funcs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(pub(crate) usize);

/// Index of a native function in [`Program::natives`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeId(pub(crate) usize);

/// Index of a variable in the enclosing function's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(pub(crate) usize);

/// Display radix of one format piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Radix {
    Dec,
    Hex,
    Bin,
}

impl Radix {
    /// The letter used in format strings and constant suffixes.
    pub fn letter(self) -> char {
        match self {
            Radix::Dec => 'd',
            Radix::Hex => 'h',
            Radix::Bin => 'b',
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'd' => Some(Radix::Dec),
            'h' => Some(Radix::Hex),
            'b' => Some(Radix::Bin),
            _ => None,
        }
    }

    pub fn base(self) -> u32 {
        match self {
            Radix::Dec => 10,
            Radix::Hex => 16,
            Radix::Bin => 2,
        }
    }
}

/// One field of a function's input or output: a width in bits and the
/// radix it is displayed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatPiece {
    pub width: u32,
    pub radix: Radix,
}

/// A function's declared input/output decomposition. Piece widths sum to
/// the function's `len_in` and `len_out` respectively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    pub input: Vec<FormatPiece>,
    pub output: Vec<FormatPiece>,
}

/// A variable of fixed bit width, owned by its function. `used` records
/// whether any assignment ever referenced it (for the unused-variable
/// warning).
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub size: u32,
    pub declared_at: Token,
    pub used: bool,
}

/// A brace-delimited instruction sequence with its compile-time stack
/// window.
///
/// `stack_len_in`/`stack_len_out` are the stack depths the compiler proved
/// at `{` and `}`. `min_len` is the lowest depth reached anywhere inside
/// (including nested blocks); loop checking uses it to prove that repeated
/// iterations of a draining body never underflow. `first_point` remembers
/// the first depth-check token inside the block, transitively.
#[derive(Debug, Clone)]
pub struct Block {
    pub stack_len_in: u32,
    pub stack_len_out: u32,
    pub min_len: u32,
    pub code: Vec<Node>,
    pub first_point: Option<Token>,
}

/// Target of an assignment: a function variable or a literal constant.
#[derive(Debug, Clone)]
pub enum AssignTarget {
    Var(VarId),
    Const(BigUint),
}

/// A resolved call target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callee {
    Native(NativeId),
    User(FuncId),
}

/// One executable node. The set is closed; the interpreter dispatches on
/// the variant tag.
#[derive(Debug, Clone)]
pub enum Node {
    /// Pop one bit; run `then_block` on 1, `else_block` (if any) on 0.
    If {
        then_block: Block,
        else_block: Option<Block>,
        stack_len_in: u32,
        stack_len_out: u32,
    },
    /// Run `block` exactly `count` times.
    Loop {
        block: Block,
        count: u32,
        stack_len_in: u32,
        stack_len_out: u32,
    },
    /// Delete the top `n` bits. For `>>_` the compiler captured `n` from
    /// the ambient depth; for `>_:k` it is the literal count.
    Reduce { n: u32 },
    /// Move bits between the stack and a variable or push a constant.
    /// `from_stack` reads the top `width` bits into the target;
    /// `to_stack` pushes the target's bits. Both together snapshot the top
    /// bits without changing the stack.
    Assign {
        target: AssignTarget,
        width: u32,
        from_stack: bool,
        to_stack: bool,
    },
    /// Invoke a function; consumes its `len_in` top bits, leaves `len_out`.
    Call { callee: Callee },
}

/// One function: a fixed input/output width, a display format, and either
/// a body block (user functions) or a native marker.
#[derive(Debug, Clone)]
pub struct Function {
    pub descriptor: String,
    pub name: String,
    pub len_in: u32,
    pub len_out: u32,
    pub format: Format,
    pub native: bool,
    pub body: Option<Block>,
    pub vars: Vec<Variable>,
    /// Sorted, deduplicated descriptors of the user functions this body
    /// calls. Always empty for natives.
    pub called: Vec<String>,
    pub declared_at: Token,
}

impl Function {
    pub fn var(&self, id: VarId) -> &Variable {
        &self.vars[id.0]
    }
}

/// A compiled program: native and user function tables plus a combined
/// descriptor index. User functions keep their source order.
#[derive(Debug, Clone, Default)]
pub struct Program {
    natives: Vec<Function>,
    funcs: Vec<Function>,
    by_descriptor: HashMap<String, Callee>,
}

impl Program {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A fresh program with the built-in natives pre-registered, so that
    /// `>and:2:1>` and friends resolve without any declaration and a
    /// source-level redeclaration collides.
    pub(crate) fn with_builtins() -> Self {
        let mut program = Program::new();
        for func in crate::natives::builtin_functions() {
            // Built-in descriptors are distinct; the insert cannot collide.
            let _ = program.insert_native(func);
        }
        program
    }

    /// Resolve a descriptor, natives first.
    pub fn lookup(&self, descriptor: &str) -> Option<Callee> {
        self.by_descriptor.get(descriptor).copied()
    }

    pub fn function(&self, callee: Callee) -> &Function {
        match callee {
            Callee::Native(id) => &self.natives[id.0],
            Callee::User(id) => &self.funcs[id.0],
        }
    }

    /// User functions in declaration order.
    pub fn funcs(&self) -> impl Iterator<Item = &Function> {
        self.funcs.iter()
    }

    /// Native functions, built-ins first.
    pub fn natives(&self) -> impl Iterator<Item = &Function> {
        self.natives.iter()
    }

    pub(crate) fn insert_native(&mut self, func: Function) -> Result<NativeId, CompileErrorKind> {
        self.check_fresh(&func.descriptor)?;
        let id = NativeId(self.natives.len());
        self.by_descriptor
            .insert(func.descriptor.clone(), Callee::Native(id));
        self.natives.push(func);
        Ok(id)
    }

    /// Register a user function from its header, before its body is
    /// parsed, so calls inside the body (including self-calls, caught
    /// later by the recursion check) resolve.
    pub(crate) fn insert_func(&mut self, func: Function) -> Result<FuncId, CompileErrorKind> {
        self.check_fresh(&func.descriptor)?;
        let id = FuncId(self.funcs.len());
        self.by_descriptor
            .insert(func.descriptor.clone(), Callee::User(id));
        self.funcs.push(func);
        Ok(id)
    }

    pub(crate) fn func_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.funcs[id.0]
    }

    fn check_fresh(&self, descriptor: &str) -> Result<(), CompileErrorKind> {
        if self.by_descriptor.contains_key(descriptor) {
            return Err(CompileErrorKind::DuplicateFunction {
                descriptor: descriptor.to_string(),
            });
        }
        Ok(())
    }
}
