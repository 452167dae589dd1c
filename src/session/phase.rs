use std::fmt;

/// Lifecycle of one submission. A session rests in `Idle` between
/// submissions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    ReferencesLoading,
    ReferencesReady,
    Compiling,
    CompileFailed,
    Compiled,
    Executing,
    ExecutionFailed,
    ExecutionSucceeded,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::ReferencesLoading => "references-loading",
            Phase::ReferencesReady => "references-ready",
            Phase::Compiling => "compiling",
            Phase::CompileFailed => "compile-failed",
            Phase::Compiled => "compiled",
            Phase::Executing => "executing",
            Phase::ExecutionFailed => "execution-failed",
            Phase::ExecutionSucceeded => "execution-succeeded",
        }
    }

    /// Whether `next` may follow `self`.
    pub fn can_enter(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Idle, ReferencesLoading)
                | (Idle, Compiling)
                | (ReferencesLoading, ReferencesReady)
                | (ReferencesLoading, Idle)
                | (ReferencesReady, Compiling)
                | (Compiling, CompileFailed)
                | (Compiling, Compiled)
                | (Compiled, Executing)
                | (Executing, ExecutionFailed)
                | (Executing, ExecutionSucceeded)
                | (CompileFailed, Idle)
                | (ExecutionFailed, Idle)
                | (ExecutionSucceeded, Idle)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_return_to_idle() {
        assert!(Phase::CompileFailed.can_enter(Phase::Idle));
        assert!(Phase::ExecutionFailed.can_enter(Phase::Idle));
        assert!(!Phase::CompileFailed.can_enter(Phase::Executing));
        assert!(!Phase::Idle.can_enter(Phase::Executing));
    }
}
