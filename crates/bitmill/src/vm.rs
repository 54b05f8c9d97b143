//! Tree-walking interpreter.
//!
//! Executes a compiled [`Program`] by walking the graph over a mutable
//! [`BitStack`] and a stack of variable frames. The compiler has already
//! proved every stack and scope invariant, so the interpreter performs no
//! program-level checks; everything that can still fail mid-run is an
//! internal-consistency assertion and reports as [`RunError::Internal`].
//!
//! All mutable state lives in the per-run [`Machine`]. A `Program` is never
//! mutated by execution, so independent runs (including concurrent ones)
//! may share it freely.

use num_bigint::BigUint;
use tracing::debug;

use crate::bits::{BitStack, Bits, Input};
use crate::diagnostic::Sink;
use crate::error::RunError;
use crate::format::render_fields;
use crate::natives::Primitive;
use crate::program::{AssignTarget, Block, Function, Node, Program};

/// How a run is supplied with input bits.
///
/// A `Single` value is packed into the function's whole input width. A
/// `List` must line up with the function's input format fields (zero-width
/// fields excluded), each value packed into its field's width.
#[derive(Debug, Clone)]
pub enum InputValue {
    Single(Input),
    List(Vec<Input>),
}

/// Parameters of one run.
#[derive(Debug, Clone)]
pub struct RunParams {
    pub input: InputValue,
    /// Render the result through the function's format and emit it on the
    /// sink. Defaults to true.
    pub print_result: bool,
}

impl RunParams {
    /// Run with a single value spanning the whole input width.
    pub fn single(input: impl Into<Input>) -> Self {
        RunParams {
            input: InputValue::Single(input.into()),
            print_result: true,
        }
    }

    /// Run with one value per input format field.
    pub fn list<I: Into<Input>>(inputs: impl IntoIterator<Item = I>) -> Self {
        RunParams {
            input: InputValue::List(inputs.into_iter().map(Into::into).collect()),
            print_result: true,
        }
    }

    /// Run a function that takes no input bits.
    pub fn empty() -> Self {
        Self::list(Vec::<Input>::new())
    }

    /// Disable result rendering.
    pub fn quiet(mut self) -> Self {
        self.print_result = false;
        self
    }
}

impl Default for RunParams {
    fn default() -> Self {
        Self::empty()
    }
}

/// The outcome of a run: the raw output bits, their integer reading, and
/// the rendered result line (when printing was enabled).
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub bits: Bits,
    pub value: BigUint,
    pub rendered: Option<String>,
}

impl Program {
    /// Execute the function `descriptor` (natives resolve first, then user
    /// functions) against the supplied inputs and return its output
    /// bit-vector.
    pub fn run(
        &self,
        descriptor: &str,
        params: RunParams,
        sink: &mut dyn Sink,
    ) -> Result<RunOutput, RunError> {
        let callee = self
            .lookup(descriptor)
            .ok_or_else(|| RunError::UnknownFunction {
                descriptor: descriptor.to_string(),
            })?;
        let func = self.function(callee);
        let input_bits = pack_inputs(func, &params.input)?;
        debug!(descriptor, input = %input_bits, "run");

        let mut machine = Machine {
            program: self,
            stack: BitStack::seeded(input_bits.clone()),
            frames: Vec::new(),
        };
        machine.run_function(func)?;

        let bits = machine.stack.into_bits();
        if bits.len() != func.len_out {
            return Err(internal(format!(
                "{}: final stack holds {} bits, {} declared",
                func.descriptor,
                bits.len(),
                func.len_out
            )));
        }
        let value = bits.to_uint();
        let rendered = if params.print_result {
            let line = format!(
                "{}({}) = {}",
                func.name,
                render_fields(&input_bits, &func.format.input, ", "),
                render_fields(&bits, &func.format.output, ", "),
            );
            sink.print(&line);
            Some(line)
        } else {
            None
        };
        Ok(RunOutput {
            bits,
            value,
            rendered,
        })
    }
}

/// Pack the supplied inputs into the function's initial stack contents,
/// big-endian and left-zero-padded per field.
fn pack_inputs(func: &Function, input: &InputValue) -> Result<Bits, RunError> {
    match input {
        InputValue::Single(value) => {
            value
                .pack(func.len_in)
                .ok_or_else(|| RunError::InputLengthMismatch {
                    value: value.to_string(),
                    width: func.len_in,
                })
        }
        InputValue::List(values) => {
            let fields: Vec<_> = func.format.input.iter().filter(|p| p.width > 0).collect();
            if values.len() != fields.len() {
                return Err(RunError::InputCountMismatch {
                    expected: fields.len(),
                    given: values.len(),
                });
            }
            let mut packed = Vec::with_capacity(func.len_in as usize);
            for (value, field) in values.iter().zip(fields) {
                let bits =
                    value
                        .pack(field.width)
                        .ok_or_else(|| RunError::InputLengthMismatch {
                            value: value.to_string(),
                            width: field.width,
                        })?;
                packed.extend_from_slice(bits.as_slice());
            }
            Ok(Bits::from_vec(packed))
        }
    }
}

fn internal(message: impl Into<String>) -> RunError {
    RunError::Internal(message.into())
}

/// A function activation: the current value of every variable of the
/// active function, indexed by its `VarId`.
struct Frame {
    vars: Vec<Bits>,
}

/// Per-run mutable state: the operand stack and the frame stack.
struct Machine<'p> {
    program: &'p Program,
    stack: BitStack,
    frames: Vec<Frame>,
}

impl Machine<'_> {
    fn run_function(&mut self, func: &Function) -> Result<(), RunError> {
        if func.native {
            let primitive = Primitive::resolve(&func.descriptor).ok_or_else(|| {
                RunError::UnknownNative {
                    descriptor: func.descriptor.clone(),
                }
            })?;
            return primitive.eval(&mut self.stack);
        }

        let body = func
            .body
            .as_ref()
            .ok_or_else(|| internal(format!("{}: user function without a body", func.descriptor)))?;
        self.frames.push(Frame {
            vars: func.vars.iter().map(|v| Bits::zeros(v.size)).collect(),
        });
        let result = self.run_block(body);
        self.frames.pop();
        result
    }

    fn run_block(&mut self, block: &Block) -> Result<(), RunError> {
        for node in &block.code {
            self.run_node(node)?;
        }
        Ok(())
    }

    fn run_node(&mut self, node: &Node) -> Result<(), RunError> {
        match node {
            Node::If {
                then_block,
                else_block,
                ..
            } => {
                let condition = self
                    .stack
                    .pop()
                    .ok_or_else(|| internal("if condition on an empty stack"))?;
                if condition {
                    self.run_block(then_block)?;
                } else if let Some(block) = else_block {
                    self.run_block(block)?;
                }
            }
            Node::Loop { block, count, .. } => {
                for _ in 0..*count {
                    self.run_block(block)?;
                }
            }
            Node::Reduce { n } => {
                if !self.stack.drop_top(*n) {
                    return Err(internal(format!(
                        "reduce of {n} bits on a stack of {}",
                        self.stack.len()
                    )));
                }
            }
            Node::Assign {
                target: AssignTarget::Const(value),
                width,
                ..
            } => {
                let bits = Bits::from_uint(value, *width)
                    .ok_or_else(|| internal("constant wider than its declared width"))?;
                self.stack.push_bits(&bits);
            }
            Node::Assign {
                target: AssignTarget::Var(id),
                width,
                from_stack,
                to_stack,
            } => {
                if *from_stack {
                    let bits = self
                        .stack
                        .top(*width)
                        .ok_or_else(|| internal("variable read past the stack bottom"))?;
                    let frame = self
                        .frames
                        .last_mut()
                        .ok_or_else(|| internal("assignment outside any frame"))?;
                    frame.vars[id.0] = bits;
                    if !*to_stack {
                        self.stack.drop_top(*width);
                    }
                } else if *to_stack {
                    let bits = self
                        .frames
                        .last()
                        .ok_or_else(|| internal("assignment outside any frame"))?
                        .vars[id.0]
                        .clone();
                    self.stack.push_bits(&bits);
                }
            }
            Node::Call { callee } => {
                let func = self.program.function(*callee);
                self.run_function(func)?;
            }
        }
        Ok(())
    }
}
