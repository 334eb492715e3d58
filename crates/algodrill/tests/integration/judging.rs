use std::time::{Duration, Instant};

use algodrill::runner::report;
use algodrill::{ConsoleLevel, RunReport, TestCase};
use serde_json::json;

use super::{fixture_source, request, test_judge};

fn add_cases() -> Vec<TestCase> {
    vec![
        TestCase::new(vec![json!(1), json!(2)], json!(3)),
        TestCase::new(vec![json!(-1), json!(1)], json!(0)),
        TestCase::new(vec![json!(0.5), json!(0.25)], json!(0.75)),
    ]
}

#[tokio::test]
async fn test_add_passes() {
    let report = test_judge()
        .run(&request(fixture_source("add.ts"), add_cases()))
        .await;

    let outcomes = report.outcomes().expect("run should complete");
    assert_eq!(outcomes.len(), 3);
    assert!(report.all_passed());
    assert_eq!(outcomes[0].input, "[1,2]");
    assert_eq!(outcomes[0].expected, "3");
    assert_eq!(outcomes[0].actual, "3");
    assert_eq!(outcomes[0].error, None);
}

#[tokio::test]
async fn test_reruns_are_identical() {
    let judge = test_judge();
    let req = request(fixture_source("add.ts"), add_cases());
    let first = judge.run(&req).await;
    let second = judge.run(&req).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_syntax_error_is_compilation_failure() {
    let report = test_judge()
        .run(&request(
            fixture_source("syntax_error.ts"),
            vec![TestCase::new(vec![], json!(null))],
        ))
        .await;

    let RunReport::CompilationFailure { message } = &report else {
        panic!("expected compilation failure, got {report:?}");
    };
    assert!(!message.is_empty());
    assert!(report.outcomes().is_none());
    assert_eq!(report::to_wire(&report), json!({ "error": message }));
}

#[tokio::test]
async fn test_missing_entry_point() {
    let report = test_judge()
        .run(&request(
            fixture_source("no_function.ts"),
            vec![TestCase::new(vec![], json!(42))],
        ))
        .await;
    assert!(matches!(
        &report,
        RunReport::CompilationFailure { message } if message.contains("No entry point")
    ));
}

#[tokio::test]
async fn test_runtime_error_does_not_stop_later_cases() {
    let report = test_judge()
        .run(&request(
            fixture_source("div.ts"),
            vec![
                TestCase::new(vec![json!(1), json!(0)], json!(0)),
                TestCase::new(vec![json!(4), json!(2)], json!(2)),
            ],
        ))
        .await;

    let outcomes = report.outcomes().expect("run should complete");
    assert_eq!(outcomes.len(), 2);
    assert!(!outcomes[0].passed);
    assert_eq!(outcomes[0].actual, "Error");
    assert_eq!(outcomes[0].error.as_deref(), Some("bad"));
    assert!(outcomes[1].passed);
    assert_eq!(outcomes[1].actual, "2");
}

#[tokio::test]
async fn test_infinite_loop_times_out() {
    let deadline = Duration::from_millis(300);
    let started = Instant::now();
    let report = test_judge()
        .run_with_timeout(
            &request(
                fixture_source("infinite_loop.ts"),
                vec![TestCase::new(vec![], json!(1))],
            ),
            deadline,
        )
        .await;

    assert!(started.elapsed() < deadline + Duration::from_secs(2));
    let RunReport::TimeoutFailure { message } = &report else {
        panic!("expected timeout, got {report:?}");
    };
    assert!(message.starts_with("Time limit exceeded"));
}

#[tokio::test]
async fn test_void_return_is_scored_on_first_argument() {
    let report = test_judge()
        .run(&request(
            fixture_source("sort_in_place.ts"),
            vec![TestCase::new(vec![json!([3, 1, 2])], json!([1, 2, 3]))],
        ))
        .await;

    let outcomes = report.outcomes().expect("run should complete");
    assert!(outcomes[0].passed);
    assert_eq!(outcomes[0].actual, "[1,2,3]");
    // input is rendered as given, not as mutated
    assert_eq!(outcomes[0].input, "[[3,1,2]]");
}

#[tokio::test]
async fn test_mutation_does_not_leak_between_cases() {
    let case = TestCase::new(vec![json!([1, 2, 3])], json!(6));
    let report = test_judge()
        .run(&request(
            fixture_source("mutates_input.ts"),
            vec![case.clone(), case.clone(), case],
        ))
        .await;
    assert!(report.all_passed());
    assert!(report.outcomes().unwrap().iter().all(|o| o.input == "[[1,2,3]]"));
}

#[tokio::test]
async fn test_deep_recursion_is_a_case_error() {
    let report = test_judge()
        .run(&request(
            fixture_source("deep_recursion.ts"),
            vec![
                TestCase::new(vec![json!(10_000_000)], json!(10_000_000)),
                TestCase::new(vec![json!(100)], json!(100)),
            ],
        ))
        .await;

    let outcomes = report.outcomes().expect("run should complete");
    assert_eq!(outcomes[0].actual, "Error");
    assert_eq!(
        outcomes[0].error.as_deref(),
        Some("Maximum call stack size exceeded")
    );
    assert!(outcomes[1].passed);
}

#[tokio::test]
async fn test_console_output_is_attached() {
    let report = test_judge()
        .run(&request(
            fixture_source("logging.ts"),
            vec![TestCase::new(vec![json!({ "x": 3, "y": -4 })], json!(7))],
        ))
        .await;

    let RunReport::Completed { outcomes, console } = &report else {
        panic!("expected completed run, got {report:?}");
    };
    assert!(outcomes[0].passed);
    assert_eq!(console.len(), 1);
    assert_eq!(console[0].level, ConsoleLevel::Log);
    assert_eq!(console[0].text, "point { x: 3, y: -4 }");
}

#[tokio::test]
async fn test_parallel_slots_are_independent() {
    let judge = test_judge();
    let a = request(fixture_source("add.ts"), add_cases());
    let b = request(
        fixture_source("div.ts"),
        vec![TestCase::new(vec![json!(9), json!(3)], json!(3))],
    );
    let (ra, rb) = tokio::join!(judge.run_in_slot("add", &a), judge.run_in_slot("div", &b));
    assert!(ra.unwrap().all_passed());
    assert!(rb.unwrap().all_passed());
}

#[tokio::test]
async fn test_large_numbers_render_like_json_stringify() {
    let report = test_judge()
        .run(&request(
            "function big(): number[] { return [2 ** 60, 1e20, 2 ** 53 + 1, 0.1 + 0.2, 1e21]; }".to_string(),
            vec![TestCase::new(vec![], json!([1152921504606846976u64, 1e20, 9007199254740992u64, 0.3, 1e21]))],
        ))
        .await;

    let outcomes = report.outcomes().expect("run should complete");
    assert_eq!(
        outcomes[0].actual,
        "[1152921504606847000,100000000000000000000,9007199254740992,0.30000000000000004,1e+21]"
    );
    assert_eq!(
        outcomes[0].expected,
        "[1152921504606847000,100000000000000000000,9007199254740992,0.3,1e+21]"
    );
    assert!(!outcomes[0].passed);
}

#[tokio::test]
async fn test_deep_results_are_case_errors() {
    let report = test_judge()
        .run(&request(
            "function chain(n: number) { let head = null; for (let i = 0; i < n; i++) head = { next: head }; return head; }".to_string(),
            vec![
                TestCase::new(vec![json!(1_000_000)], json!(null)),
                TestCase::new(vec![json!(1)], json!({ "next": null })),
            ],
        ))
        .await;

    let outcomes = report.outcomes().expect("run should complete");
    assert_eq!(outcomes[0].actual, "Error");
    assert!(outcomes[1].passed);
}
