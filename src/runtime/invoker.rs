use crate::emit::EntryPoint;
use crate::runtime::{
    cancel::CancelToken,
    error::{RuntimeError, RuntimeFault, RuntimeResult},
    state::SubmissionState,
    value::Value,
    vm::{Machine, Step, DEFAULT_MAX_CALL_DEPTH},
};
use std::time::Duration;

pub const DEFAULT_SLICE: usize = 4096;

#[derive(Clone, Debug)]
pub struct InvokeOptions {
    /// Wall-clock limit for one entry routine.
    pub timeout: Option<Duration>,
    /// Instructions run between cooperative yields.
    pub slice: usize,
    pub max_call_depth: usize,
}

impl Default for InvokeOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            slice: DEFAULT_SLICE,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

/// Result of running an entry routine. Output printed before a fault is kept.
#[derive(Debug)]
pub struct Invocation {
    pub outcome: Result<Value, RuntimeFault>,
    pub output: Vec<String>,
}

/// Runs the zero-argument entry routine against the session's state.
///
/// The routine initialises its own submission record first, so `state`
/// must already be large enough for it.
pub async fn invoke(
    entry: &EntryPoint,
    state: &mut SubmissionState,
    options: &InvokeOptions,
    cancel: &CancelToken,
) -> Invocation {
    let mut machine = Machine::new(entry, state, options.max_call_depth.max(1));
    if entry.callable().arity() != 0 {
        let error = RuntimeError::invalid(format!(
            "entry point `{}` takes {} parameters",
            entry.name(),
            entry.callable().arity()
        ));
        return Invocation {
            outcome: Err(machine.fault(error)),
            output: Vec::new(),
        };
    }

    tracing::debug!(target: "runtime", entry = entry.name(), "invoking entry point");
    let slice = options.slice.max(1);
    let result = match options.timeout {
        Some(limit) => {
            match tokio::time::timeout(limit, drive(&mut machine, slice, cancel)).await {
                Ok(result) => result,
                Err(_) => Err(RuntimeError::TimedOut {
                    millis: whole_millis(limit),
                }),
            }
        }
        None => drive(&mut machine, slice, cancel).await,
    };

    let outcome = result.map_err(|error| {
        tracing::debug!(target: "runtime", entry = entry.name(), %error, "entry point faulted");
        machine.fault(error)
    });
    Invocation {
        outcome,
        output: machine.take_output(),
    }
}

async fn drive(machine: &mut Machine<'_>, slice: usize, cancel: &CancelToken) -> RuntimeResult<Value> {
    loop {
        if cancel.is_cancelled() {
            return Err(RuntimeError::Cancelled);
        }
        match machine.run_slice(slice)? {
            Step::Done(value) => return Ok(value),
            Step::Yield => tokio::task::yield_now().await,
            Step::Sleep(duration) => {
                tokio::select! {
                    _ = tokio::time::sleep(duration) => {}
                    _ = cancel.cancelled() => return Err(RuntimeError::Cancelled),
                }
            }
        }
    }
}

/// Milliseconds in `limit`, saturating at `u64::MAX`.
fn whole_millis(limit: Duration) -> u64 {
    u64::try_from(limit.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compilation::CompilationChain, emit::ExecutableFragment, references::ReferenceSet};

    fn fragment(source: &str) -> ExecutableFragment {
        let mut chain = CompilationChain::new(Vec::new());
        chain
            .compile(source, &ReferenceSet::empty())
            .expect("compiles")
            .fragment
    }

    #[tokio::test]
    async fn returns_the_tail_value_and_output() {
        let fragment = fragment("print(\"a\");\nlet x = 2;\nx * 21");
        let mut state = SubmissionState::default();
        state.ensure_len(1);
        let invocation = invoke(
            fragment.entry(),
            &mut state,
            &InvokeOptions::default(),
            &CancelToken::new(),
        )
        .await;
        assert!(matches!(invocation.outcome, Ok(Value::Int(42))));
        assert_eq!(invocation.output, vec!["a"]);
    }

    #[tokio::test]
    async fn small_slices_still_finish() {
        let fragment = fragment("let mut i = 0;\nwhile i < 100 { i = i + 1; }\ni");
        let mut state = SubmissionState::default();
        state.ensure_len(1);
        let options = InvokeOptions {
            slice: 3,
            ..InvokeOptions::default()
        };
        let invocation = invoke(fragment.entry(), &mut state, &options, &CancelToken::new()).await;
        assert!(matches!(invocation.outcome, Ok(Value::Int(100))));
    }

    #[tokio::test]
    async fn a_cancelled_token_stops_before_running() {
        let fragment = fragment("print(\"never\");");
        let mut state = SubmissionState::default();
        state.ensure_len(1);
        let cancel = CancelToken::new();
        cancel.cancel();
        let invocation = invoke(fragment.entry(), &mut state, &InvokeOptions::default(), &cancel).await;
        let fault = invocation.outcome.expect_err("cancelled");
        assert!(matches!(fault.error, RuntimeError::Cancelled));
        assert!(invocation.output.is_empty());
    }

    #[tokio::test]
    async fn timeouts_report_their_limit() {
        let fragment = fragment("let mut i = 0;\nwhile true { i = i + 1; }");
        let mut state = SubmissionState::default();
        state.ensure_len(1);
        let options = InvokeOptions {
            timeout: Some(Duration::from_millis(20)),
            ..InvokeOptions::default()
        };
        let invocation = invoke(fragment.entry(), &mut state, &options, &CancelToken::new()).await;
        let fault = invocation.outcome.expect_err("timed out");
        assert!(matches!(fault.error, RuntimeError::TimedOut { millis: 20 }));
    }

    #[test]
    fn huge_limits_saturate() {
        assert_eq!(whole_millis(Duration::from_secs(3)), 3000);
        assert_eq!(whole_millis(Duration::MAX), u64::MAX);
    }
}
