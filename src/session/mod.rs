//! The submission pipeline: references, compile, emit and load, execute.

pub mod phase;
pub mod report;

pub use phase::Phase;
pub use report::{Outcome, SubmissionReport};

use crate::{
    compilation::{CompilationChain, CompilationUnit, CompileFailure},
    references::{Fetcher, ReferenceCache},
    runtime::{
        invoke, state::INITIAL_CAPACITY, CancelToken, InvokeOptions, SubmissionState, Value,
    },
};
use std::sync::Arc;

pub const DEFAULT_IMPLICIT_IMPORTS: [&str; 3] = ["math", "text", "list"];

#[derive(Clone, Debug)]
pub struct SessionOptions {
    /// Namespaces whose exports every submission may use unqualified.
    pub implicit_imports: Vec<String>,
    pub initial_state_capacity: usize,
    pub invoke: InvokeOptions,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            implicit_imports: DEFAULT_IMPLICIT_IMPORTS
                .iter()
                .map(|namespace| namespace.to_string())
                .collect(),
            initial_state_capacity: INITIAL_CAPACITY,
            invoke: InvokeOptions::default(),
        }
    }
}

/// One interactive session. Submissions are processed one at a time; the
/// reference cache may be shared with other sessions.
pub struct ScriptSession<F> {
    cache: Arc<ReferenceCache<F>>,
    chain: CompilationChain,
    state: SubmissionState,
    phase: Phase,
    options: SessionOptions,
    cancel: CancelToken,
}

impl<F: Fetcher> ScriptSession<F> {
    pub fn new(cache: Arc<ReferenceCache<F>>, options: SessionOptions) -> Self {
        Self {
            cache,
            chain: CompilationChain::new(options.implicit_imports.clone()),
            state: SubmissionState::with_capacity(options.initial_state_capacity),
            phase: Phase::Idle,
            options,
            cancel: CancelToken::new(),
        }
    }

    pub fn submission_index(&self) -> u32 {
        self.chain.submission_index()
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    pub fn current_unit(&self) -> Option<&Arc<CompilationUnit>> {
        self.chain.current()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn cache(&self) -> &Arc<ReferenceCache<F>> {
        &self.cache
    }

    /// Latest value of every session variable.
    pub fn variables(&self) -> Vec<(String, Value)> {
        self.state.variables()
    }

    /// Token that cancels the submission in flight. It is re-armed at the
    /// start of every submission.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Forgets every submission. The reference cache is kept.
    pub fn reset(&mut self) {
        self.chain = CompilationChain::new(self.options.implicit_imports.clone());
        self.state = SubmissionState::with_capacity(self.options.initial_state_capacity);
        self.phase = Phase::Idle;
        tracing::info!(target: "session", "session reset");
    }

    /// Runs one submission and returns its diagnostics and failure text,
    /// or an empty string for a clean success.
    pub async fn execute(&mut self, source: &str) -> String {
        self.submit(source).await.render()
    }

    pub async fn submit(&mut self, source: &str) -> SubmissionReport {
        self.cancel.reset();
        let mut phases = vec![self.phase];
        let report = self.run(source, &mut phases).await;
        self.enter(Phase::Idle, &mut phases);
        tracing::info!(
            target: "session",
            submission = report.submission,
            outcome = report.outcome.label(),
            diagnostics = report.diagnostics.len(),
            "submission finished"
        );
        SubmissionReport { phases, ..report }
    }

    async fn run(&mut self, source: &str, phases: &mut Vec<Phase>) -> SubmissionReport {
        let report = |outcome, diagnostics, submission| SubmissionReport {
            submission,
            outcome,
            diagnostics,
            output: Vec::new(),
            phases: Vec::new(),
        };

        let loading = !self.cache.is_loaded();
        if loading {
            self.enter(Phase::ReferencesLoading, phases);
        }
        let references = match self.cache.ensure_references(&self.cancel).await {
            Ok(references) => references,
            Err(error) => {
                tracing::warn!(target: "session", %error, "reference loading failed");
                return report(Outcome::ReferencesFailed(error), Vec::new(), None);
            }
        };
        if loading {
            self.enter(Phase::ReferencesReady, phases);
        }

        self.enter(Phase::Compiling, phases);
        let compiled = match self.chain.compile(source, &references) {
            Ok(compiled) => compiled,
            Err(failure) => {
                self.enter(Phase::CompileFailed, phases);
                return match failure {
                    CompileFailure::Rejected(diagnostics) => {
                        report(Outcome::CompileFailed, diagnostics, None)
                    }
                    CompileFailure::Emit { error, diagnostics } => {
                        report(Outcome::EmitFailed(error), diagnostics, None)
                    }
                };
            }
        };
        self.enter(Phase::Compiled, phases);

        let ordinal = self.chain.submission_index();
        self.state.ensure_len(ordinal as usize);
        self.enter(Phase::Executing, phases);
        let invocation = invoke(
            compiled.fragment.entry(),
            &mut self.state,
            &self.options.invoke,
            &self.cancel,
        )
        .await;

        let outcome = match invocation.outcome {
            Ok(value) => {
                self.enter(Phase::ExecutionSucceeded, phases);
                Outcome::Executed { value }
            }
            Err(fault) => {
                self.enter(Phase::ExecutionFailed, phases);
                Outcome::ExecutionFailed(fault)
            }
        };
        SubmissionReport {
            output: invocation.output,
            ..report(outcome, compiled.diagnostics, Some(ordinal))
        }
    }

    fn enter(&mut self, next: Phase, phases: &mut Vec<Phase>) {
        debug_assert!(
            self.phase.can_enter(next),
            "invalid transition {} -> {next}",
            self.phase
        );
        tracing::trace!(target: "session", from = %self.phase, to = %next, "phase");
        self.phase = next;
        phases.push(next);
    }
}
