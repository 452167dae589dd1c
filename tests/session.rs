use prime_repl::{
    references::{ReferenceCache, StdlibFetcher},
    runtime::{InvokeOptions, RuntimeError},
    session::{Outcome, Phase, ScriptSession, SessionOptions, SubmissionReport},
};
use std::{sync::Arc, time::Duration};

fn session() -> ScriptSession<StdlibFetcher> {
    session_with(SessionOptions::default())
}

fn session_with(options: SessionOptions) -> ScriptSession<StdlibFetcher> {
    let cache = ReferenceCache::new(StdlibFetcher, StdlibFetcher::locations());
    ScriptSession::new(Arc::new(cache), options)
}

fn value(report: &SubmissionReport) -> String {
    match report.value() {
        Some(value) => value.repr(),
        None => panic!("submission did not run: {}", report.render()),
    }
}

#[tokio::test]
async fn variables_persist_across_submissions() {
    let mut session = session();
    let first = session.submit("x = 5;").await;
    assert!(first.is_success(), "{}", first.render());
    assert!(first.render().contains("info[prime.implicitDeclaration]"));

    let second = session.submit("return x + 1;").await;
    assert_eq!(value(&second), "6");
    assert_eq!(second.render(), "");
    assert_eq!(session.submission_index(), 2);
}

#[tokio::test]
async fn clean_success_renders_empty() {
    let mut session = session();
    assert_eq!(session.execute("let a = 1;").await, "");
    assert_eq!(session.execute("let b = a * 2; b").await, "");
    let vars: Vec<_> = session
        .variables()
        .into_iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect();
    assert_eq!(vars, vec!["a=1", "b=2"]);
}

#[tokio::test]
async fn compile_failure_rolls_back_the_chain() {
    let mut session = session();
    session.submit("let a = 1;").await;
    let before = session.current_unit().cloned().expect("unit");

    let failed = session.submit("let b = ;\nlet a = 99;").await;
    assert!(matches!(failed.outcome, Outcome::CompileFailed));
    assert!(!failed.is_accepted());
    assert!(failed.render().contains("error[prime.syntax]"));
    assert_eq!(session.submission_index(), 1);
    assert!(Arc::ptr_eq(session.current_unit().expect("unit"), &before));

    let unknown = session.execute("b").await;
    assert!(unknown.contains("error[prime.unknownSymbol]"), "{unknown}");

    let next = session.submit("let b = a + 1; b").await;
    assert_eq!(value(&next), "2");
    assert_eq!(session.current_unit().expect("unit").name(), "Submission#2");
}

#[tokio::test]
async fn warnings_do_not_block() {
    let mut session = session();
    let report = session.submit("{ let unused = 1; }\n7").await;
    assert_eq!(value(&report), "7");
    assert!(report.render().contains("warning[prime.unusedVariable]"));
    assert_eq!(session.submission_index(), 1);
}

#[tokio::test]
async fn runtime_fault_keeps_the_submission() {
    let mut session = session();
    let report = session.submit("let z = 0;\n10 / z").await;
    let Outcome::ExecutionFailed(fault) = &report.outcome else {
        panic!("expected a fault, got {}", report.outcome.label());
    };
    assert!(matches!(fault.error, RuntimeError::DivisionByZero));
    assert!(report
        .render()
        .contains("runtime error: attempt to divide by zero\n    at Submission#1.<Main> (line 2)"));
    assert_eq!(session.submission_index(), 1);
    assert_eq!(session.phase(), Phase::Idle);

    let next = session.submit("z + 1").await;
    assert_eq!(value(&next), "1");
}

#[tokio::test]
async fn fault_trace_names_every_frame() {
    let mut session = session();
    session.submit("fn parse(s) {\n    int(s)\n}").await;
    let report = session.submit("let n = parse(\"12a\");").await;
    let text = report.render();
    assert!(
        text.contains("caused by: invalid digit found in string"),
        "{text}"
    );
    assert!(text.contains("at Submission#1.parse (line 2)"), "{text}");
    assert!(text.contains("at Submission#2.<Main> (line 1)"), "{text}");
}

#[tokio::test]
async fn emit_failure_is_reported_and_rolled_back() {
    let mut session = session();
    let args = vec!["1"; 300].join(", ");
    let report = session.submit(&format!("print({args});")).await;
    assert!(matches!(report.outcome, Outcome::EmitFailed(_)));
    assert!(report.render().starts_with("emit error:"));
    assert_eq!(session.submission_index(), 0);
    assert!(session.current_unit().is_none());
}

#[tokio::test]
async fn state_grows_by_doubling() {
    let mut session = session();
    let mut lengths = Vec::new();
    for i in 1..=6 {
        let report = session.submit(&format!("let v{i} = {i};")).await;
        assert!(report.is_success(), "{}", report.render());
        assert!(session.state().len() >= session.submission_index() as usize);
        lengths.push(session.state().len());
    }
    assert_eq!(lengths, vec![2, 2, 4, 4, 8, 8]);
}

#[tokio::test]
async fn phases_follow_the_lifecycle() {
    let mut session = session();
    let first = session.submit("1").await;
    assert_eq!(
        first.phases,
        vec![
            Phase::Idle,
            Phase::ReferencesLoading,
            Phase::ReferencesReady,
            Phase::Compiling,
            Phase::Compiled,
            Phase::Executing,
            Phase::ExecutionSucceeded,
            Phase::Idle,
        ]
    );

    let failed = session.submit("let = 1;").await;
    assert_eq!(
        failed.phases,
        vec![
            Phase::Idle,
            Phase::Compiling,
            Phase::CompileFailed,
            Phase::Idle
        ]
    );
}

#[tokio::test]
async fn functions_and_libraries_are_shared() {
    let mut session = session();
    session
        .submit("fn fact(n) { if n <= 1 { 1 } else { n * fact(n - 1) } }")
        .await;
    assert_eq!(value(&session.submit("fact(10)").await), "3628800");

    session.submit("fn square(x) { x * x }").await;
    assert_eq!(value(&session.submit("map([1, 2, 3], square)").await), "[1, 4, 9]");
    assert_eq!(value(&session.submit("sum(range(1, 5))").await), "10");
    assert_eq!(value(&session.submit("text::join([1, 2], \"-\")").await), "\"1-2\"");
    assert_eq!(value(&session.submit("gcd(12, 18) + abs(-1)").await), "7");
}

#[tokio::test]
async fn print_output_is_captured() {
    let mut session = session();
    let report = session.submit("print(\"hi\", 1 + 1);\nprint([\"a\"]);").await;
    assert_eq!(report.output, vec!["hi 2", "[\"a\"]"]);
    assert_eq!(report.render(), "");
}

#[tokio::test]
async fn timeout_stops_runaway_code() {
    let mut session = session_with(SessionOptions {
        invoke: InvokeOptions {
            timeout: Some(Duration::from_millis(50)),
            ..InvokeOptions::default()
        },
        ..SessionOptions::default()
    });
    let report = session.submit("let mut i = 0;\nwhile true { i = i + 1; }").await;
    let fault = report.fault().expect("timed out");
    assert!(matches!(fault.error, RuntimeError::TimedOut { millis: 50 }));

    assert_eq!(value(&session.submit("i > 0").await), "true");
}

#[tokio::test]
async fn cancellation_interrupts_sleep() {
    let mut session = session();
    session.submit("1").await;
    let token = session.cancel_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });
    let report = tokio::time::timeout(Duration::from_secs(5), session.submit("sleep(60000);"))
        .await
        .expect("cancelled well before the sleep ends");
    let fault = report.fault().expect("cancelled");
    assert!(matches!(fault.error, RuntimeError::Cancelled));

    assert_eq!(value(&session.submit("2").await), "2");
}

#[tokio::test]
async fn reset_forgets_submissions() {
    let mut session = session();
    session.submit("let a = 1;").await;
    session.reset();
    assert_eq!(session.submission_index(), 0);
    assert!(session.variables().is_empty());
    assert!(session.execute("a").await.contains("prime.unknownSymbol"));
}

#[tokio::test]
async fn self_containing_lists_are_rejected() {
    let mut session = session();
    let report = session.submit("let xs = [1];\npush(xs, xs);\nprint(xs);").await;
    let fault = report.fault().expect("push faults");
    assert!(matches!(fault.error, RuntimeError::CyclicList));
    assert!(report
        .render()
        .starts_with("runtime error: a list cannot contain itself"));
    assert!(report.output.is_empty());

    let report = session.submit("let ys = [xs];\nxs[0] = ys;").await;
    assert!(matches!(
        report.fault().map(|fault| &fault.error),
        Some(RuntimeError::CyclicList)
    ));

    assert_eq!(value(&session.submit("push(xs, [2]); xs").await), "[1, [2]]");
    assert_eq!(value(&session.submit("1 + 1").await), "2");
}

#[tokio::test]
async fn deep_lists_print_compare_and_drop() {
    let mut session = session();
    let build = "let mut xs = 0;\nlet mut ys = 0;\nlet mut i = 0;\n\
                 while i < 50000 { xs = [xs]; ys = [ys]; i = i + 1; }";
    assert!(session.submit(build).await.is_success());

    let report = session.submit("print(xs);\nxs == ys").await;
    assert_eq!(value(&report), "true");
    assert!(report.output[0].starts_with("[[[["));
    assert!(report.output[0].contains("[...]"));

    assert!(session.submit("xs = 0;\nys = 0;").await.is_success());
    assert_eq!(value(&session.submit("xs + ys + 1").await), "1");
}

#[tokio::test]
async fn oversized_input_is_diagnosed() {
    let mut session = session();
    session.submit("let a = 1;").await;
    let before = session.current_unit().cloned().expect("unit");

    let nested = format!("{}a{}", "(".repeat(2000), ")".repeat(2000));
    let report = session.submit(&nested).await;
    assert!(matches!(report.outcome, Outcome::CompileFailed));
    let text = report.render();
    assert!(text.contains("error[prime.syntax]"), "{text}");
    assert!(text.contains("Expression nested too deeply"), "{text}");

    let text = session.execute("let big = 99999999999999999999;").await;
    assert!(text.contains("error[prime.syntax]"), "{text}");
    assert!(text.contains("does not fit in 64 bits"), "{text}");

    let items = vec!["1"; 70_000].join(", ");
    let report = session.submit(&format!("let huge = [{items}];")).await;
    assert!(matches!(report.outcome, Outcome::EmitFailed(_)));
    assert!(report.render().starts_with("emit error:"));

    assert_eq!(session.submission_index(), 1);
    assert!(Arc::ptr_eq(&before, session.current_unit().expect("unit")));
    assert_eq!(value(&session.submit("a + 1").await), "2");
}
