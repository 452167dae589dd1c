use crate::runtime::{
    error::{RuntimeError, RuntimeResult},
    value::Value,
};
use std::{fmt, time::Duration};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Variadic,
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(expected) => expected == count,
            Arity::Variadic => true,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(1) => write!(f, "1 argument"),
            Arity::Exact(n) => write!(f, "{n} arguments"),
            Arity::Variadic => write!(f, "any number of arguments"),
        }
    }
}

/// Built-in functions. Reachable unqualified when nothing else matches, or
/// as `core::name`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intrinsic {
    Print,
    Len,
    Str,
    Int,
    Float,
    Push,
    Sleep,
    Panic,
    TypeOf,
}

/// What the machine does after an intrinsic returns.
#[derive(Debug)]
pub enum Effect {
    Value(Value),
    /// Push unit, then suspend for the duration.
    Sleep(Duration),
}

impl Intrinsic {
    pub const NAMESPACE: &'static str = "core";

    pub const ALL: [Intrinsic; 9] = [
        Intrinsic::Print,
        Intrinsic::Len,
        Intrinsic::Str,
        Intrinsic::Int,
        Intrinsic::Float,
        Intrinsic::Push,
        Intrinsic::Sleep,
        Intrinsic::Panic,
        Intrinsic::TypeOf,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Intrinsic::Print => "print",
            Intrinsic::Len => "len",
            Intrinsic::Str => "str",
            Intrinsic::Int => "int",
            Intrinsic::Float => "float",
            Intrinsic::Push => "push",
            Intrinsic::Sleep => "sleep",
            Intrinsic::Panic => "panic",
            Intrinsic::TypeOf => "type_of",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|intrinsic| intrinsic.name() == name)
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    pub fn arity(self) -> Arity {
        match self {
            Intrinsic::Print => Arity::Variadic,
            Intrinsic::Push => Arity::Exact(2),
            _ => Arity::Exact(1),
        }
    }

    pub fn call(self, mut args: Vec<Value>, output: &mut Vec<String>) -> RuntimeResult<Effect> {
        if !self.arity().accepts(args.len()) {
            return Err(RuntimeError::ArityMismatch {
                name: self.name().to_string(),
                expected: match self.arity() {
                    Arity::Exact(n) => n,
                    Arity::Variadic => args.len(),
                },
                received: args.len(),
            });
        }

        let value = match self {
            Intrinsic::Print => {
                let line = args
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                tracing::trace!(target: "runtime", %line, "print");
                output.push(line);
                Value::Unit
            }
            Intrinsic::Len => match &args[0] {
                Value::Str(s) => Value::Int(s.chars().count() as i64),
                Value::List(items) => Value::Int(items.len() as i64),
                other => return Err(expected(self, "a string or list", other)),
            },
            Intrinsic::Str => Value::string(args[0].to_string()),
            Intrinsic::Int => to_int(&args[0])?,
            Intrinsic::Float => to_float(&args[0])?,
            Intrinsic::Push => {
                let item = args.pop().unwrap_or(Value::Unit);
                match &args[0] {
                    Value::List(items) => items.push(item)?,
                    other => return Err(expected(self, "a list", other)),
                }
                Value::Unit
            }
            Intrinsic::Sleep => match args[0] {
                Value::Int(ms) if ms >= 0 => {
                    return Ok(Effect::Sleep(Duration::from_millis(ms as u64)));
                }
                ref other => return Err(expected(self, "a non-negative int", other)),
            },
            Intrinsic::Panic => {
                return Err(RuntimeError::Panic {
                    message: args[0].to_string(),
                });
            }
            Intrinsic::TypeOf => Value::string(args[0].type_name()),
        };
        Ok(Effect::Value(value))
    }
}

fn expected(intrinsic: Intrinsic, what: &str, found: &Value) -> RuntimeError {
    RuntimeError::type_mismatch(format!(
        "`{}` expects {what}, found {}",
        intrinsic.name(),
        found.type_name()
    ))
}

fn to_int(value: &Value) -> RuntimeResult<Value> {
    match value {
        Value::Int(v) => Ok(Value::Int(*v)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Float(f) => {
            if f.is_finite() && *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                Ok(Value::Int(f.trunc() as i64))
            } else {
                Err(RuntimeError::Overflow { op: "int" })
            }
        }
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|err| RuntimeError::Conversion {
                value: value.repr(),
                target: "int",
                source: Box::new(err),
            }),
        other => Err(expected(Intrinsic::Int, "a number, bool or string", other)),
    }
}

fn to_float(value: &Value) -> RuntimeResult<Value> {
    match value {
        Value::Int(v) => Ok(Value::Float(*v as f64)),
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|err| RuntimeError::Conversion {
                value: value.repr(),
                target: "float",
                source: Box::new(err),
            }),
        other => Err(expected(Intrinsic::Float, "a number or string", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(intrinsic: Intrinsic, args: Vec<Value>) -> RuntimeResult<Effect> {
        intrinsic.call(args, &mut Vec::new())
    }

    #[test]
    fn ids_round_trip_through_names() {
        for intrinsic in Intrinsic::ALL {
            assert_eq!(Intrinsic::from_id(intrinsic.id()), Some(intrinsic));
            assert_eq!(Intrinsic::from_name(intrinsic.name()), Some(intrinsic));
        }
        assert_eq!(Intrinsic::from_id(200), None);
    }

    #[test]
    fn print_captures_output() {
        let mut output = Vec::new();
        Intrinsic::Print
            .call(vec![Value::string("x ="), Value::Int(3)], &mut output)
            .expect("print");
        assert_eq!(output, vec!["x = 3"]);
    }

    #[test]
    fn failed_conversion_keeps_the_parse_error() {
        let err = call(Intrinsic::Int, vec![Value::string("12a")]).unwrap_err();
        let RuntimeError::Conversion { source, .. } = &err else {
            panic!("expected conversion error, got {err:?}");
        };
        assert_eq!(source.to_string(), "invalid digit found in string");
    }

    #[test]
    fn sleep_suspends() {
        let effect = call(Intrinsic::Sleep, vec![Value::Int(5)]).expect("sleep");
        assert!(matches!(effect, Effect::Sleep(d) if d == Duration::from_millis(5)));
    }
}
