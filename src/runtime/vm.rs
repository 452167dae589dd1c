use crate::emit::{image::Constant, image::Op, Callable, EntryPoint};
use crate::runtime::{
    error::{RuntimeError, RuntimeFault, RuntimeResult, TraceFrame},
    intrinsics::{Effect, Intrinsic},
    state::SubmissionState,
    value::Value,
};
use std::{cmp::Ordering, time::Duration};

pub const DEFAULT_MAX_CALL_DEPTH: usize = 512;

struct Frame {
    callable: Callable,
    pc: usize,
    locals: Vec<Value>,
    base: usize,
}

/// Why [`Machine::run_slice`] stopped.
#[derive(Debug)]
pub enum Step {
    Done(Value),
    /// The instruction budget ran out.
    Yield,
    Sleep(Duration),
}

/// Stack machine over loaded modules. Runs in bounded slices so the caller
/// can interleave cancellation and timers.
pub struct Machine<'s> {
    frames: Vec<Frame>,
    stack: Vec<Value>,
    state: &'s mut SubmissionState,
    output: Vec<String>,
    max_depth: usize,
}

impl<'s> Machine<'s> {
    pub fn new(entry: &EntryPoint, state: &'s mut SubmissionState, max_depth: usize) -> Self {
        let callable = entry.callable().clone();
        let locals = vec![Value::Unit; callable.proto().locals as usize];
        Self {
            frames: vec![Frame {
                callable,
                pc: 0,
                locals,
                base: 0,
            }],
            stack: Vec::new(),
            state,
            output: Vec::new(),
            max_depth,
        }
    }

    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    /// Wraps `error` with the current call stack, innermost first.
    pub fn fault(&self, error: RuntimeError) -> RuntimeFault {
        let trace = self
            .frames
            .iter()
            .rev()
            .map(|frame| TraceFrame {
                function: frame.callable.name().to_string(),
                line: frame.callable.proto().line_at(frame.pc.saturating_sub(1)),
            })
            .collect();
        RuntimeFault::new(error, trace)
    }

    /// Executes at most `budget` instructions.
    pub fn run_slice(&mut self, budget: usize) -> RuntimeResult<Step> {
        for _ in 0..budget {
            let op = {
                let frame = self.frame_mut()?;
                let op = frame.callable.proto().code.get(frame.pc).copied();
                let op = op.ok_or_else(|| {
                    RuntimeError::invalid(format!(
                        "`{}` ran past its last instruction",
                        frame.callable.name()
                    ))
                })?;
                frame.pc += 1;
                op
            };

            match op {
                Op::Const(index) => {
                    let constant = self.frame()?.callable.proto().constants.get(index as usize);
                    let value = match constant {
                        Some(Constant::Int(v)) => Value::Int(*v),
                        Some(Constant::Float(v)) => Value::Float(*v),
                        Some(Constant::Str(v)) => Value::string(v.as_str()),
                        None => return Err(RuntimeError::invalid("constant out of range")),
                    };
                    self.stack.push(value);
                }
                Op::Unit => self.stack.push(Value::Unit),
                Op::True => self.stack.push(Value::Bool(true)),
                Op::False => self.stack.push(Value::Bool(false)),
                Op::LoadLocal(index) => {
                    let value = self.frame()?.locals.get(index as usize).cloned();
                    let value = value.ok_or_else(|| RuntimeError::invalid("local out of range"))?;
                    self.stack.push(value);
                }
                Op::StoreLocal(index) => {
                    let value = self.pop()?;
                    let local = self.frame_mut()?.locals.get_mut(index as usize);
                    *local.ok_or_else(|| RuntimeError::invalid("local out of range"))? = value;
                }
                Op::LoadSlot { record, index } => {
                    let value = self.state.load(record as usize, index as usize)?;
                    self.stack.push(value);
                }
                Op::StoreSlot { record, index } => {
                    let value = self.pop()?;
                    self.state.store(record as usize, index as usize, value)?;
                }
                Op::LoadImport(index) => {
                    let import = self.frame()?.callable.module().imports().get(index as usize);
                    let import =
                        import.cloned().ok_or_else(|| RuntimeError::invalid("import out of range"))?;
                    self.stack.push(Value::Function(import));
                }
                Op::LoadFunction(index) => {
                    let module = self.frame()?.callable.module().clone();
                    if index as usize >= module.functions().len() {
                        return Err(RuntimeError::invalid("function out of range"));
                    }
                    self.stack.push(Value::Function(Callable::new(module, index)));
                }
                Op::InitSubmission => {
                    let module = self.frame()?.callable.module().clone();
                    let record = module.record_index().ok_or_else(|| {
                        RuntimeError::invalid(format!("`{}` owns no submission record", module.name()))
                    })?;
                    self.state.init_record(record, module.slot_names().clone());
                }
                Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Rem => {
                    let right = self.pop()?;
                    let left = self.pop()?;
                    self.stack.push(arithmetic(op, left, right)?);
                }
                Op::Neg => {
                    let value = match self.pop()? {
                        Value::Int(v) => {
                            Value::Int(v.checked_neg().ok_or(RuntimeError::Overflow { op: "-" })?)
                        }
                        Value::Float(v) => Value::Float(-v),
                        other => {
                            return Err(RuntimeError::type_mismatch(format!(
                                "cannot negate {}",
                                other.type_name()
                            )))
                        }
                    };
                    self.stack.push(value);
                }
                Op::Not => {
                    let value = self.pop()?;
                    self.stack.push(Value::Bool(!value.as_bool()));
                }
                Op::Eq | Op::Ne => {
                    let right = self.pop()?;
                    let left = self.pop()?;
                    let equal = left.equals(&right);
                    self.stack.push(Value::Bool(if op == Op::Eq { equal } else { !equal }));
                }
                Op::Lt | Op::Le | Op::Gt | Op::Ge => {
                    let right = self.pop()?;
                    let left = self.pop()?;
                    let ordering = compare(&left, &right)?;
                    let result = match op {
                        Op::Lt => ordering == Ordering::Less,
                        Op::Le => ordering != Ordering::Greater,
                        Op::Gt => ordering == Ordering::Greater,
                        _ => ordering != Ordering::Less,
                    };
                    self.stack.push(Value::Bool(result));
                }
                Op::Jump(target) => self.frame_mut()?.pc = target as usize,
                Op::JumpIfFalse(target) => {
                    if !self.pop()?.as_bool() {
                        self.frame_mut()?.pc = target as usize;
                    }
                }
                Op::Pop => {
                    self.pop()?;
                }
                Op::Call(argc) => {
                    let args = self.pop_n(argc as usize)?;
                    let callee = self.pop()?;
                    self.call(callee, args)?;
                }
                Op::Intrinsic { id, argc } => {
                    let intrinsic = Intrinsic::from_id(id)
                        .ok_or_else(|| RuntimeError::invalid(format!("unknown intrinsic {id}")))?;
                    let args = self.pop_n(argc as usize)?;
                    match intrinsic.call(args, &mut self.output)? {
                        Effect::Value(value) => self.stack.push(value),
                        Effect::Sleep(duration) => {
                            self.stack.push(Value::Unit);
                            return Ok(Step::Sleep(duration));
                        }
                    }
                }
                Op::MakeList(count) => {
                    let items = self.pop_n(count as usize)?;
                    self.stack.push(Value::list(items));
                }
                Op::Index => {
                    let index = self.pop()?;
                    let base = self.pop()?;
                    self.stack.push(index_value(&base, &index)?);
                }
                Op::SetIndex => {
                    let value = self.pop()?;
                    let index = self.pop()?;
                    let base = self.pop()?;
                    let Value::List(items) = &base else {
                        return Err(RuntimeError::type_mismatch(format!(
                            "cannot assign into {}",
                            base.type_name()
                        )));
                    };
                    let position = position(&index, items.len())?;
                    items.set(position, value)?;
                }
                Op::Return => {
                    let value = self.pop()?;
                    let frame = self
                        .frames
                        .pop()
                        .ok_or_else(|| RuntimeError::invalid("return without a frame"))?;
                    self.stack.truncate(frame.base);
                    if self.frames.is_empty() {
                        return Ok(Step::Done(value));
                    }
                    self.stack.push(value);
                }
            }
        }
        Ok(Step::Yield)
    }

    fn call(&mut self, callee: Value, args: Vec<Value>) -> RuntimeResult<()> {
        let Value::Function(callable) = callee else {
            return Err(RuntimeError::NotCallable {
                type_name: callee.type_name(),
            });
        };
        if callable.arity() != args.len() {
            return Err(RuntimeError::ArityMismatch {
                name: callable.proto().short_name().to_string(),
                expected: callable.arity(),
                received: args.len(),
            });
        }
        if self.frames.len() >= self.max_depth {
            return Err(RuntimeError::StackOverflow {
                limit: self.max_depth,
            });
        }
        let size = (callable.proto().locals as usize).max(args.len());
        let mut locals = args;
        locals.resize(size, Value::Unit);
        self.frames.push(Frame {
            callable,
            pc: 0,
            locals,
            base: self.stack.len(),
        });
        Ok(())
    }

    fn frame(&self) -> RuntimeResult<&Frame> {
        self.frames
            .last()
            .ok_or_else(|| RuntimeError::invalid("no active frame"))
    }

    fn frame_mut(&mut self) -> RuntimeResult<&mut Frame> {
        self.frames
            .last_mut()
            .ok_or_else(|| RuntimeError::invalid("no active frame"))
    }

    fn pop(&mut self) -> RuntimeResult<Value> {
        self.stack
            .pop()
            .ok_or_else(|| RuntimeError::invalid("operand stack underflow"))
    }

    fn pop_n(&mut self, count: usize) -> RuntimeResult<Vec<Value>> {
        let len = self.stack.len();
        if count > len {
            return Err(RuntimeError::invalid("operand stack underflow"));
        }
        Ok(self.stack.split_off(len - count))
    }
}

fn arithmetic(op: Op, left: Value, right: Value) -> RuntimeResult<Value> {
    let symbol = match op {
        Op::Add => "+",
        Op::Sub => "-",
        Op::Mul => "*",
        Op::Div => "/",
        _ => "%",
    };
    match (&left, &right) {
        (Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            if matches!(op, Op::Div | Op::Rem) && b == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            let result = match op {
                Op::Add => a.checked_add(b),
                Op::Sub => a.checked_sub(b),
                Op::Mul => a.checked_mul(b),
                Op::Div => a.checked_div(b),
                _ => a.checked_rem(b),
            };
            result
                .map(Value::Int)
                .ok_or(RuntimeError::Overflow { op: symbol })
        }
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let (a, b) = (as_float(&left), as_float(&right));
            Ok(Value::Float(match op {
                Op::Add => a + b,
                Op::Sub => a - b,
                Op::Mul => a * b,
                Op::Div => a / b,
                _ => a % b,
            }))
        }
        (Value::Str(_), _) | (_, Value::Str(_)) if op == Op::Add => {
            Ok(Value::string(format!("{left}{right}")))
        }
        (Value::List(a), Value::List(b)) if op == Op::Add => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        _ => Err(RuntimeError::type_mismatch(format!(
            "cannot apply `{symbol}` to {} and {}",
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn as_float(value: &Value) -> f64 {
    match value {
        Value::Int(v) => *v as f64,
        Value::Float(v) => *v,
        _ => f64::NAN,
    }
}

fn compare(left: &Value, right: &Value) -> RuntimeResult<Ordering> {
    let ordering = match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            as_float(left).partial_cmp(&as_float(right))
        }
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => {
            return Err(RuntimeError::type_mismatch(format!(
                "cannot compare {} with {}",
                left.type_name(),
                right.type_name()
            )))
        }
    };
    // NaN compares false both ways
    Ok(ordering.unwrap_or(Ordering::Equal))
}

fn position(index: &Value, len: usize) -> RuntimeResult<usize> {
    let Value::Int(index) = *index else {
        return Err(RuntimeError::type_mismatch(format!(
            "index must be an int, found {}",
            index.type_name()
        )));
    };
    usize::try_from(index)
        .ok()
        .filter(|position| *position < len)
        .ok_or(RuntimeError::IndexOutOfBounds { index, len })
}

fn index_value(base: &Value, index: &Value) -> RuntimeResult<Value> {
    match base {
        Value::List(items) => {
            let items = items.borrow();
            let position = position(index, items.len())?;
            Ok(items[position].clone())
        }
        Value::Str(text) => {
            let len = text.chars().count();
            let position = position(index, len)?;
            let ch = text.chars().nth(position).map(String::from).unwrap_or_default();
            Ok(Value::string(ch))
        }
        other => Err(RuntimeError::type_mismatch(format!(
            "cannot index into {}",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_division_by_zero_faults() {
        assert!(matches!(
            arithmetic(Op::Div, Value::Int(1), Value::Int(0)),
            Err(RuntimeError::DivisionByZero)
        ));
        assert!(matches!(
            arithmetic(Op::Div, Value::Float(1.0), Value::Int(0)),
            Ok(Value::Float(v)) if v.is_infinite()
        ));
    }

    #[test]
    fn overflow_is_reported() {
        assert!(matches!(
            arithmetic(Op::Mul, Value::Int(i64::MAX), Value::Int(2)),
            Err(RuntimeError::Overflow { op: "*" })
        ));
    }

    #[test]
    fn strings_concatenate_with_anything() {
        let value = arithmetic(Op::Add, Value::string("n = "), Value::Int(4)).expect("add");
        assert_eq!(value.to_string(), "n = 4");
    }

    #[test]
    fn indexing_checks_bounds() {
        let list = Value::list(vec![Value::Int(1)]);
        assert!(matches!(
            index_value(&list, &Value::Int(-1)),
            Err(RuntimeError::IndexOutOfBounds { index: -1, len: 1 })
        ));
        let text = Value::string("héllo");
        assert_eq!(index_value(&text, &Value::Int(1)).expect("char").to_string(), "é");
    }
}
