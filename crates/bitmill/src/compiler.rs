//! Single-pass compiler: token stream in, validated program graph out.
//!
//! The compiler walks the token stream exactly once, building the graph and
//! proving every static rule as it goes. The central piece of bookkeeping
//! is `stack_len`, the compile-time bit depth of the operand stack: every
//! operation adjusts it, every block records its entry and exit depths, and
//! any operation that would drive it negative is rejected on the spot. The
//! interpreter later relies on these proofs and performs no checks of its
//! own.
//!
//! Variables live in a scope stack: block entry snapshots the current
//! scope, block exit restores it. Names never shadow; a variable name is
//! unique across its whole function.
//!
//! Function headers are registered before their bodies are parsed, so a
//! body can call anything declared at or above it in the source. Forward
//! references are unknown functions, and the final whole-program pass
//! rejects any function that transitively calls itself.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::diagnostic::{Location, Sink, Warning, WarningKind};
use crate::error::{CompileError, CompileErrorKind};
use crate::format;
use crate::lexer::{self, SourceProvider, Token};
use crate::program::{
    AssignTarget, Block, Callee, Function, Node, Program, VarId, Variable,
};

/// Compile the file `root` (resolved through `provider`) and everything it
/// includes. Warnings accumulate during the pass and are flushed through
/// `sink` once compilation succeeds; on error no program is returned and
/// nothing is flushed.
pub fn compile(
    provider: &dyn SourceProvider,
    root: &str,
    sink: &mut dyn Sink,
) -> Result<Program, CompileError> {
    let tokens = lexer::load(provider, root)?;
    if tokens.is_empty() {
        return Err(CompileError {
            kind: CompileErrorKind::EmptyProgram,
            location: Location::new(root, 0, 0),
            token: String::new(),
        });
    }

    let mut compiler = Compiler {
        tokens,
        idx: 0,
        program: Program::with_builtins(),
        warnings: Vec::new(),
        scopes: Vec::new(),
        vars: Vec::new(),
        called: Vec::new(),
        stack_len: 0,
        cur_min: 0,
        cur_point: None,
    };

    while compiler.idx < compiler.tokens.len() {
        compiler.parse_function()?;
    }
    compiler.check_recursion()?;

    debug!(
        funcs = compiler.program.funcs().count(),
        warnings = compiler.warnings.len(),
        "compilation finished"
    );
    sink.warnings(&compiler.warnings);
    Ok(compiler.program)
}

struct Compiler {
    tokens: Vec<Token>,
    idx: usize,
    program: Program,
    warnings: Vec<Warning>,

    // Per-function state, reset at each body.
    scopes: Vec<HashMap<String, VarId>>,
    vars: Vec<Variable>,
    called: Vec<String>,
    stack_len: u32,
    /// Lowest depth seen since entry to the innermost open block.
    cur_min: u32,
    /// First depth-check token seen in the innermost open block,
    /// transitively through nested blocks.
    cur_point: Option<Token>,
}

impl Compiler {
    // -----------------------------------------------------------------------
    // Token cursor
    // -----------------------------------------------------------------------

    fn bump(&mut self) -> Result<Token, CompileError> {
        match self.tokens.get(self.idx) {
            Some(tok) => {
                self.idx += 1;
                Ok(tok.clone())
            }
            None => Err(CompileError {
                kind: CompileErrorKind::UnexpectedEof,
                location: self.eof_location(),
                token: String::new(),
            }),
        }
    }

    fn peek_is(&self, text: &str) -> bool {
        self.tokens.get(self.idx).is_some_and(|t| t.is(text))
    }

    fn peek_starts_with(&self, ch: char) -> bool {
        self.tokens
            .get(self.idx)
            .is_some_and(|t| t.text.starts_with(ch))
    }

    /// The most recently consumed token. Only valid once parsing has begun.
    fn prev(&self) -> &Token {
        &self.tokens[self.idx - 1]
    }

    fn eof_location(&self) -> Location {
        self.tokens
            .last()
            .map(|t| t.location())
            .unwrap_or_else(|| Location::new("", 0, 0))
    }

    fn expect(&mut self, text: &'static str) -> Result<Token, CompileError> {
        let tok = self.bump()?;
        if !tok.is(text) {
            return Err(self.err(
                &tok,
                CompileErrorKind::ExpectedToken {
                    expected: text,
                    found: tok.text.clone(),
                },
            ));
        }
        Ok(tok)
    }

    fn err(&self, tok: &Token, kind: CompileErrorKind) -> CompileError {
        CompileError {
            kind,
            location: tok.location(),
            token: tok.text.clone(),
        }
    }

    fn warn(&mut self, kind: WarningKind, location: Location, token: impl Into<String>) {
        self.warnings.push(Warning::new(kind, location, token));
    }

    // -----------------------------------------------------------------------
    // Compile-time stack depth
    // -----------------------------------------------------------------------

    fn dec_stack(&mut self, n: u32, at: &Token) -> Result<(), CompileError> {
        if self.stack_len < n {
            return Err(self.err(
                at,
                CompileErrorKind::StackUnderflow {
                    need: n,
                    have: self.stack_len,
                },
            ));
        }
        self.stack_len -= n;
        self.cur_min = self.cur_min.min(self.stack_len);
        Ok(())
    }

    fn inc_stack(&mut self, n: u32) {
        self.stack_len += n;
    }

    // -----------------------------------------------------------------------
    // Functions
    // -----------------------------------------------------------------------

    fn parse_function(&mut self) -> Result<(), CompileError> {
        let kw = self.bump()?;
        if !kw.is("func") {
            return Err(self.err(
                &kw,
                CompileErrorKind::ExpectedToken {
                    expected: "func",
                    found: kw.text.clone(),
                },
            ));
        }

        let desc_tok = self.bump()?;
        let parts: Vec<&str> = desc_tok.text.split(':').collect();
        let [name, in_text, out_text] = parts.as_slice() else {
            return Err(self.err(
                &desc_tok,
                CompileErrorKind::BadDescriptor {
                    token: desc_tok.text.clone(),
                },
            ));
        };
        if !is_ident(name) {
            return Err(self.err(
                &desc_tok,
                CompileErrorKind::BadName {
                    name: name.to_string(),
                },
            ));
        }
        let (Some(len_in), Some(len_out)) = (parse_number(in_text), parse_number(out_text)) else {
            return Err(self.err(
                &desc_tok,
                CompileErrorKind::BadDescriptor {
                    token: desc_tok.text.clone(),
                },
            ));
        };
        let descriptor = format!("{name}:{len_in}:{len_out}");
        if len_out == 0 {
            return Err(self.err(&desc_tok, CompileErrorKind::OutZero { descriptor }));
        }

        let format = if self.peek_starts_with('#') {
            let format_tok = self.bump()?;
            format::parse_format(&format_tok.text, len_in, len_out)
                .map_err(|kind| self.err(&format_tok, kind))?
        } else {
            format::default_format(len_in, len_out)
        };

        let next = self.bump()?;
        let func = Function {
            descriptor: descriptor.clone(),
            name: name.to_string(),
            len_in,
            len_out,
            format,
            native: next.is("native"),
            body: None,
            vars: Vec::new(),
            called: Vec::new(),
            declared_at: desc_tok.clone(),
        };

        if next.is("native") {
            self.program
                .insert_native(func)
                .map_err(|kind| self.err(&desc_tok, kind))?;
            return Ok(());
        }
        if !next.is("{") {
            return Err(self.err(
                &next,
                CompileErrorKind::ExpectedToken {
                    expected: "{",
                    found: next.text.clone(),
                },
            ));
        }

        // Register the header first so calls inside the body resolve.
        let id = self
            .program
            .insert_func(func)
            .map_err(|kind| self.err(&desc_tok, kind))?;

        self.scopes = vec![HashMap::new()];
        self.vars = Vec::new();
        self.called = Vec::new();
        self.stack_len = len_in;
        self.cur_min = len_in;
        self.cur_point = None;

        let body = self.parse_block_body()?;

        if self.stack_len != len_out {
            let close = self.prev().clone();
            return Err(self.err(
                &close,
                CompileErrorKind::StackLenMismatch {
                    expected: len_out,
                    found: self.stack_len,
                },
            ));
        }

        let mut called = std::mem::take(&mut self.called);
        called.sort();
        called.dedup();
        let vars = std::mem::take(&mut self.vars);
        for var in &vars {
            if !var.used {
                self.warn(
                    WarningKind::UnusedVariable,
                    var.declared_at.location(),
                    var.name.clone(),
                );
            }
        }

        let func = self.program.func_mut(id);
        func.body = Some(body);
        func.vars = vars;
        func.called = called;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Blocks
    // -----------------------------------------------------------------------

    fn parse_block(&mut self) -> Result<Block, CompileError> {
        self.expect("{")?;
        self.parse_block_body()
    }

    /// Parse a block whose `{` has already been consumed.
    fn parse_block_body(&mut self) -> Result<Block, CompileError> {
        let snapshot = self.scopes.last().cloned().unwrap_or_default();
        self.scopes.push(snapshot);
        let saved_min = self.cur_min;
        let saved_point = self.cur_point.take();
        self.cur_min = self.stack_len;
        let stack_len_in = self.stack_len;
        let mut code = Vec::new();

        loop {
            let tok = self.bump()?;
            if tok.is("}") {
                break;
            }
            if tok.is(".") {
                if self.stack_len != 0 {
                    return Err(self.err(
                        &tok,
                        CompileErrorKind::StackLenMismatch {
                            expected: 0,
                            found: self.stack_len,
                        },
                    ));
                }
                if self.cur_point.is_none() {
                    self.cur_point = Some(tok);
                }
                continue;
            }
            if tok.is("def") {
                self.parse_def()?;
                continue;
            }
            if tok.is("if") {
                let node = self.parse_if(&tok)?;
                code.push(node);
                continue;
            }
            if tok.is("loop") {
                let node = self.parse_loop(&tok)?;
                code.push(node);
                continue;
            }
            if tok.is(">>_") {
                let n = self.stack_len;
                self.dec_stack(n, &tok)?;
                code.push(Node::Reduce { n });
                continue;
            }
            if let Some(count_text) = tok.text.strip_prefix(">_:") {
                let Some(n) = parse_number(count_text) else {
                    return Err(self.err(
                        &tok,
                        CompileErrorKind::BadReduceSyntax {
                            token: tok.text.clone(),
                        },
                    ));
                };
                if n == 0 {
                    self.warn(WarningKind::ZeroReduce, tok.location(), tok.text.clone());
                }
                self.dec_stack(n, &tok)?;
                code.push(Node::Reduce { n });
                continue;
            }
            if tok.text.contains('>') {
                match tok.text.matches(':').count() {
                    1 => {
                        let node = self.parse_assign(&tok)?;
                        code.push(node);
                        continue;
                    }
                    2 => {
                        let node = self.parse_call(&tok)?;
                        code.push(node);
                        continue;
                    }
                    _ => {}
                }
            }
            return Err(self.err(
                &tok,
                CompileErrorKind::UnknownOp {
                    token: tok.text.clone(),
                },
            ));
        }

        let block_point = self.cur_point.clone();
        self.cur_point = saved_point.or_else(|| block_point.clone());
        let block = Block {
            stack_len_in,
            stack_len_out: self.stack_len,
            min_len: self.cur_min,
            code,
            first_point: block_point,
        };
        self.cur_min = saved_min.min(self.cur_min);
        self.scopes.pop();
        Ok(block)
    }

    fn parse_def(&mut self) -> Result<(), CompileError> {
        self.expect("{")?;
        loop {
            let tok = self.bump()?;
            if tok.is("}") {
                return Ok(());
            }
            let Some((name, size_text)) = tok.text.split_once(':') else {
                return Err(self.err(
                    &tok,
                    CompileErrorKind::BadName {
                        name: tok.text.clone(),
                    },
                ));
            };
            if !is_ident(name) {
                return Err(self.err(
                    &tok,
                    CompileErrorKind::BadName {
                        name: name.to_string(),
                    },
                ));
            }
            let Some(size) = parse_number(size_text) else {
                return Err(self.err(
                    &tok,
                    CompileErrorKind::BadConstant {
                        token: size_text.to_string(),
                    },
                ));
            };
            if size == 0 {
                return Err(self.err(&tok, CompileErrorKind::ZeroWidth));
            }
            if self.vars.iter().any(|v| v.name == name) {
                return Err(self.err(
                    &tok,
                    CompileErrorKind::DuplicateVariable {
                        name: name.to_string(),
                    },
                ));
            }
            let id = VarId(self.vars.len());
            self.vars.push(Variable {
                name: name.to_string(),
                size,
                declared_at: tok.clone(),
                used: false,
            });
            self.scopes
                .last_mut()
                .expect("scope stack is never empty inside a function")
                .insert(name.to_string(), id);
        }
    }

    // -----------------------------------------------------------------------
    // Control flow
    // -----------------------------------------------------------------------

    fn parse_if(&mut self, at: &Token) -> Result<Node, CompileError> {
        let stack_len_in = self.stack_len;
        self.dec_stack(1, at)?;
        let h0 = self.stack_len;

        let then_block = self.parse_block()?;
        let then_out = self.stack_len;

        let else_block = if self.peek_is("else") {
            self.bump()?;
            self.stack_len = h0;
            let block = self.parse_block()?;
            if self.stack_len != then_out {
                return Err(self.err(
                    at,
                    CompileErrorKind::IfElseMismatch {
                        then_len: then_out,
                        else_len: self.stack_len,
                    },
                ));
            }
            Some(block)
        } else {
            // With no else arm the condition may select "do nothing", so
            // the then arm must leave the depth where it found it.
            if then_out != h0 {
                return Err(self.err(
                    at,
                    CompileErrorKind::IfElseMismatch {
                        then_len: then_out,
                        else_len: h0,
                    },
                ));
            }
            None
        };

        Ok(Node::If {
            then_block,
            else_block,
            stack_len_in,
            stack_len_out: self.stack_len,
        })
    }

    fn parse_loop(&mut self, at: &Token) -> Result<Node, CompileError> {
        let count_tok = self.bump()?;
        let Some(count) = parse_number(&count_tok.text) else {
            return Err(self.err(
                &count_tok,
                CompileErrorKind::BadConstant {
                    token: count_tok.text.clone(),
                },
            ));
        };
        if count < 2 {
            self.warn(
                WarningKind::TrivialLoop,
                count_tok.location(),
                count_tok.text.clone(),
            );
        }

        let stack_len_in = self.stack_len;
        let block = self.parse_block()?;
        let delta = i64::from(block.stack_len_out) - i64::from(block.stack_len_in);

        // A depth assertion inside a body whose depth shifts between
        // iterations can only hold for one of them.
        if let Some(point) = &block.first_point
            && delta != 0
        {
            return Err(self.err(point, CompileErrorKind::PointInVariantLoop));
        }

        // Iteration k runs the body with every depth shifted by k·delta;
        // the lowest point of the whole loop is in the last iteration when
        // the body drains.
        if count > 0 && delta < 0 {
            let lowest = i64::from(block.min_len) + i64::from(count - 1) * delta;
            if lowest < 0 {
                return Err(self.err(
                    at,
                    CompileErrorKind::StackUnderflow {
                        need: (i64::from(stack_len_in) - lowest) as u32,
                        have: stack_len_in,
                    },
                ));
            }
            self.cur_min = self.cur_min.min(lowest as u32);
        }

        self.stack_len = (i64::from(stack_len_in) + delta * i64::from(count)) as u32;
        self.cur_min = self.cur_min.min(self.stack_len);

        Ok(Node::Loop {
            block,
            count,
            stack_len_in,
            stack_len_out: self.stack_len,
        })
    }

    // -----------------------------------------------------------------------
    // Assignments and calls
    // -----------------------------------------------------------------------

    fn parse_assign(&mut self, tok: &Token) -> Result<Node, CompileError> {
        let text = &tok.text;
        let from_stack = text.starts_with('>');
        let to_stack = text.len() > 1 && text.ends_with('>');
        let bad = || CompileErrorKind::BadAssignSyntax {
            token: text.clone(),
        };
        if !from_stack && !to_stack {
            return Err(self.err(tok, bad()));
        }

        let inner = &text[usize::from(from_stack)..text.len() - usize::from(to_stack)];
        let Some((target, width_text)) = inner.split_once(':') else {
            return Err(self.err(tok, bad()));
        };
        if target.is_empty() || target.contains('>') || width_text.contains('>') {
            return Err(self.err(tok, bad()));
        }
        let Some(width) = parse_number(width_text) else {
            return Err(self.err(tok, bad()));
        };
        if width == 0 {
            return Err(self.err(tok, CompileErrorKind::ZeroWidth));
        }

        let looks_constant =
            target.bytes().next().is_some_and(|b| b.is_ascii_digit()) || target.contains('#');
        if looks_constant {
            if !to_stack {
                return Err(self.err(tok, CompileErrorKind::ConstantNotPushed));
            }
            if from_stack {
                return Err(self.err(tok, CompileErrorKind::ConstantToSelf));
            }
            let value = format::parse_constant(target).map_err(|kind| self.err(tok, kind))?;
            if value.bits() > u64::from(width) {
                return Err(self.err(
                    tok,
                    CompileErrorKind::ConstantTooWide {
                        constant: target.to_string(),
                        width,
                    },
                ));
            }
            self.inc_stack(width);
            return Ok(Node::Assign {
                target: AssignTarget::Const(value),
                width,
                from_stack: false,
                to_stack: true,
            });
        }

        let Some(&id) = self.scopes.last().and_then(|scope| scope.get(target)) else {
            return Err(self.err(
                tok,
                CompileErrorKind::UndefinedVariable {
                    name: target.to_string(),
                },
            ));
        };
        self.vars[id.0].used = true;
        let declared = self.vars[id.0].size;
        if declared != width {
            return Err(self.err(
                tok,
                CompileErrorKind::VarSizeMismatch {
                    name: target.to_string(),
                    declared,
                    used: width,
                },
            ));
        }
        if from_stack {
            self.dec_stack(width, tok)?;
        }
        if to_stack {
            self.inc_stack(width);
        }
        Ok(Node::Assign {
            target: AssignTarget::Var(id),
            width,
            from_stack,
            to_stack,
        })
    }

    fn parse_call(&mut self, tok: &Token) -> Result<Node, CompileError> {
        let text = &tok.text;
        let bad = || CompileErrorKind::BadCallSyntax {
            token: text.clone(),
        };
        if text.len() < 2 || !text.starts_with('>') || !text.ends_with('>') {
            return Err(self.err(tok, bad()));
        }
        let inner = &text[1..text.len() - 1];
        let parts: Vec<&str> = inner.split(':').collect();
        let [name, in_text, out_text] = parts.as_slice() else {
            return Err(self.err(tok, bad()));
        };
        if !is_ident(name) {
            return Err(self.err(tok, bad()));
        }
        let (Some(len_in), Some(len_out)) = (parse_number(in_text), parse_number(out_text)) else {
            return Err(self.err(tok, bad()));
        };

        let descriptor = format!("{name}:{len_in}:{len_out}");
        let Some(callee) = self.program.lookup(&descriptor) else {
            return Err(self.err(tok, CompileErrorKind::UnknownFunction { descriptor }));
        };
        if matches!(callee, Callee::User(_)) {
            self.called.push(descriptor);
        }
        self.dec_stack(len_in, tok)?;
        self.inc_stack(len_out);
        Ok(Node::Call { callee })
    }

    // -----------------------------------------------------------------------
    // Whole-program checks
    // -----------------------------------------------------------------------

    /// Reject any user function whose transitive callee closure contains
    /// itself. Direct callees were collected while parsing each body.
    fn check_recursion(&self) -> Result<(), CompileError> {
        for func in self.program.funcs() {
            let mut seen: HashSet<&str> = HashSet::new();
            let mut pending: Vec<&str> = func.called.iter().map(String::as_str).collect();
            while let Some(descriptor) = pending.pop() {
                if descriptor == func.descriptor {
                    return Err(self.err(
                        &func.declared_at,
                        CompileErrorKind::Recursion {
                            descriptor: func.descriptor.clone(),
                        },
                    ));
                }
                if !seen.insert(descriptor) {
                    continue;
                }
                if let Some(Callee::User(id)) = self.program.lookup(descriptor) {
                    let callee = self.program.function(Callee::User(id));
                    pending.extend(callee.called.iter().map(String::as_str));
                }
            }
        }
        Ok(())
    }
}

/// ASCII identifier: a letter, then letters, digits or underscores.
fn is_ident(text: &str) -> bool {
    let mut bytes = text.bytes();
    matches!(bytes.next(), Some(b) if b.is_ascii_alphabetic())
        && bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Strict non-negative decimal: digits only, no sign, no empty string.
fn parse_number(text: &str) -> Option<u32> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}
