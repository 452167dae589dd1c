use crate::{
    compilation::diagnostic::{join, Diagnostic},
    emit::EmitError,
    references::ReferenceError,
    runtime::{error::render_chain, RuntimeFault, Value},
    session::Phase,
};

#[derive(Debug)]
pub enum Outcome {
    Executed { value: Value },
    ReferencesFailed(ReferenceError),
    CompileFailed,
    EmitFailed(EmitError),
    ExecutionFailed(RuntimeFault),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Executed { .. } => "executed",
            Outcome::ReferencesFailed(_) => "references-failed",
            Outcome::CompileFailed => "compile-failed",
            Outcome::EmitFailed(_) => "emit-failed",
            Outcome::ExecutionFailed(_) => "execution-failed",
        }
    }
}

/// Everything one submission produced.
#[derive(Debug)]
pub struct SubmissionReport {
    /// Ordinal of the submission when it was accepted into the chain.
    pub submission: Option<u32>,
    pub outcome: Outcome,
    /// Every diagnostic of the attempt, in source order.
    pub diagnostics: Vec<Diagnostic>,
    pub output: Vec<String>,
    pub phases: Vec<Phase>,
}

impl SubmissionReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Executed { .. })
    }

    /// Accepted means the chain advanced, even if execution then faulted.
    pub fn is_accepted(&self) -> bool {
        self.submission.is_some()
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Executed { value } => Some(value),
            _ => None,
        }
    }

    pub fn fault(&self) -> Option<&RuntimeFault> {
        match &self.outcome {
            Outcome::ExecutionFailed(fault) => Some(fault),
            _ => None,
        }
    }

    /// Text describing why the submission did not run to completion.
    pub fn failure(&self) -> Option<String> {
        match &self.outcome {
            Outcome::Executed { .. } | Outcome::CompileFailed => None,
            Outcome::ReferencesFailed(error) => Some(render_chain(error)),
            Outcome::EmitFailed(error) => Some(format!("emit error: {}", render_chain(error))),
            Outcome::ExecutionFailed(fault) => Some(fault.render()),
        }
    }

    /// Diagnostics followed by failure text, newline separated. Empty for a
    /// clean success. The result value and printed output are not included.
    pub fn render(&self) -> String {
        let mut parts = Vec::new();
        if !self.diagnostics.is_empty() {
            parts.push(join(&self.diagnostics));
        }
        parts.extend(self.failure());
        parts.join("\n")
    }
}
