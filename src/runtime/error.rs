use std::fmt::Write as _;
use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("attempt to divide by zero")]
    DivisionByZero,
    #[error("integer overflow in `{op}`")]
    Overflow { op: &'static str },
    #[error("Type mismatch: {message}")]
    TypeMismatch { message: String },
    #[error("index {index} is out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },
    #[error("value of type {type_name} is not callable")]
    NotCallable { type_name: &'static str },
    #[error("Function `{name}` expected {expected} arguments but received {received}")]
    ArityMismatch {
        name: String,
        expected: usize,
        received: usize,
    },
    #[error("variable `{name}` is used before it was assigned")]
    UnassignedVariable { name: String },
    #[error("submission #{ordinal} has no state; it never ran")]
    MissingSubmission { ordinal: usize },
    #[error("a list cannot contain itself")]
    CyclicList,
    #[error("call depth exceeded {limit}")]
    StackOverflow { limit: usize },
    #[error("cannot convert {value} to {target}")]
    Conversion {
        value: String,
        target: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Runtime panic: {message}")]
    Panic { message: String },
    #[error("execution was cancelled")]
    Cancelled,
    #[error("execution timed out after {millis} ms")]
    TimedOut { millis: u64 },
    #[error("invalid program: {message}")]
    InvalidProgram { message: String },
}

impl RuntimeError {
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        RuntimeError::TypeMismatch {
            message: message.into(),
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        RuntimeError::InvalidProgram {
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceFrame {
    pub function: String,
    pub line: u32,
}

/// A fault raised while running accepted code, with the call stack at the
/// point it was raised (innermost first).
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RuntimeFault {
    #[source]
    pub error: RuntimeError,
    pub trace: Vec<TraceFrame>,
}

impl RuntimeFault {
    pub fn new(error: RuntimeError, trace: Vec<TraceFrame>) -> Self {
        Self { error, trace }
    }

    /// Multi-line text: the error, every nested cause, then the trace.
    pub fn render(&self) -> String {
        let mut out = format!("runtime error: {}", render_chain(&self.error));
        for frame in &self.trace {
            let _ = write!(out, "\n    at {} (line {})", frame.function, frame.line);
        }
        out
    }
}

/// `error` followed by each `caused by:` line of its source chain.
pub fn render_chain(error: &dyn std::error::Error) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let _ = write!(out, "\ncaused by: {cause}");
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_causes_and_trace() {
        let parse = "x1".parse::<i64>().unwrap_err();
        let fault = RuntimeFault::new(
            RuntimeError::Conversion {
                value: "\"x1\"".into(),
                target: "int",
                source: Box::new(parse),
            },
            vec![
                TraceFrame {
                    function: "Submission#2.parse".into(),
                    line: 3,
                },
                TraceFrame {
                    function: "Submission#2.<Main>".into(),
                    line: 1,
                },
            ],
        );
        assert_eq!(
            fault.render(),
            "runtime error: cannot convert \"x1\" to int\n\
             caused by: invalid digit found in string\n    \
             at Submission#2.parse (line 3)\n    \
             at Submission#2.<Main> (line 1)"
        );
    }
}
