//! Integration tests for the interpreted strategy
//!
//! These run entirely in process and need no external toolchains.

use codebox::{ExecError, ExecutionRequest, ExecutionService, Language, Outcome, ServiceConfig};
use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn service_in(root: &std::path::Path) -> ExecutionService {
    let config = ServiceConfig {
        scratch_root: root.join("scratch"),
        ..ServiceConfig::default()
    };
    ExecutionService::new(config).unwrap()
}

fn scratch_entries(root: &std::path::Path) -> usize {
    fs::read_dir(root.join("scratch")).map(|d| d.count()).unwrap_or(0)
}

#[test]
fn test_print_hi_succeeds() {
    let temp = tempfile::tempdir().unwrap();
    let service = service_in(temp.path());

    let result = service.execute_source("print('hi')", "interpreted").unwrap();
    assert_eq!(result.outcome, Outcome::Success);
    assert!(result.combined_output.contains("hi"));
}

#[test]
fn test_script_alias_matches_interpreted() {
    let temp = tempfile::tempdir().unwrap();
    let service = service_in(temp.path());

    let a = service.execute_source("print(2 + 2)", "script").unwrap();
    let b = service.execute_source("print(2 + 2)", "interpreted").unwrap();
    assert_eq!(a.combined_output, b.combined_output);
    assert_eq!(a.outcome, Outcome::Success);
}

#[test]
fn test_runtime_error_preserves_prior_output() {
    let temp = tempfile::tempdir().unwrap();
    let service = service_in(temp.path());

    let result = service
        .execute_source("print('a')\nprint(5 / 0)", "script")
        .unwrap();
    assert_eq!(result.outcome, Outcome::RuntimeError);
    assert!(result.combined_output.starts_with("a\n"));
    assert!(result
        .combined_output
        .contains("Error: line 2: division by zero"));
}

#[test]
fn test_parse_error_is_classified_as_runtime_error() {
    let temp = tempfile::tempdir().unwrap();
    let service = service_in(temp.path());

    let result = service
        .execute_source("fn broken( { }", "script")
        .unwrap();
    assert_eq!(result.outcome, Outcome::RuntimeError);
    assert!(result.combined_output.starts_with("Error: "));
    assert!(result.combined_output.contains("syntax error"));
}

#[test]
fn test_deep_unary_chain_is_a_syntax_error() {
    let temp = tempfile::tempdir().unwrap();
    let service = service_in(temp.path());

    // A pathological operator chain must come back as a syntax error, not
    // take down the worker.
    let source = format!("x = {}1", "-".repeat(200_000));
    let result = service.execute_source(&source, "script").unwrap();
    assert_eq!(result.outcome, Outcome::RuntimeError);
    assert!(result.combined_output.contains("syntax error"));
    assert!(result.combined_output.contains("nesting too deep"));
}

#[test]
fn test_infinite_loop_is_bounded() {
    let temp = tempfile::tempdir().unwrap();
    let service = service_in(temp.path());

    let request = ExecutionRequest::new("while true { }", Language::Script)
        .with_time_budget(Duration::from_millis(150));
    let result = service.execute(request);

    assert_eq!(result.outcome, Outcome::Timeout);
    assert_eq!(
        result.combined_output,
        "Error: Code execution timeout (took too long)"
    );
}

#[test]
fn test_stdin_feeds_input_builtin() {
    let temp = tempfile::tempdir().unwrap();
    let service = service_in(temp.path());

    let request = ExecutionRequest::new(
        "name = input()\nprint('hello', name)\nprint(input())",
        Language::Script,
    )
    .with_stdin("world\nbye");
    let result = service.execute(request);

    assert_eq!(result.outcome, Outcome::Success);
    assert_eq!(result.combined_output, "hello world\nbye\n");
}

#[test]
fn test_language_surface_end_to_end() {
    let temp = tempfile::tempdir().unwrap();
    let service = service_in(temp.path());

    let source = r#"
fn fib(n) {
    if n < 2 { return n }
    return fib(n - 1) + fib(n - 2)
}

values = []
for i in range(8) {
    push(values, fib(i))
}
print(values)
print('sum =', values[2] + values[-1])
"#;
    let result = service.execute_source(source, "script").unwrap();
    assert_eq!(result.outcome, Outcome::Success);
    assert_eq!(
        result.combined_output,
        "[0, 1, 1, 2, 3, 5, 8, 13]\nsum = 14\n"
    );
}

#[test]
fn test_concurrent_executions_have_isolated_output() {
    let temp = tempfile::tempdir().unwrap();
    let service = Arc::new(service_in(temp.path()));

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                let source = format!("for n in range(40) {{ print('job{i}', n) }}");
                service.execute_source(&source, "script").unwrap()
            })
        })
        .collect();

    for (i, worker) in workers.into_iter().enumerate() {
        let result = worker.join().unwrap();
        assert_eq!(result.outcome, Outcome::Success);
        // Every line belongs to this job, in order; no foreign output leaked in.
        for (n, line) in result.combined_output.lines().enumerate() {
            assert_eq!(line, format!("job{i} {n}"));
        }
    }
}

#[test]
fn test_state_does_not_leak_between_runs() {
    let temp = tempfile::tempdir().unwrap();
    let service = service_in(temp.path());

    let first = service.execute_source("secret = 42\nprint(secret)", "script").unwrap();
    assert_eq!(first.outcome, Outcome::Success);

    let second = service.execute_source("print(secret)", "script").unwrap();
    assert_eq!(second.outcome, Outcome::RuntimeError);
    assert!(second.combined_output.contains("undefined variable"));
}

#[test]
fn test_unknown_language_is_rejected_without_executing() {
    let temp = tempfile::tempdir().unwrap();
    let service = service_in(temp.path());

    let err = service.execute_source("print('x')", "ruby").unwrap_err();
    assert!(matches!(err, ExecError::UnsupportedLanguage(ref id) if id == "ruby"));
    assert_eq!(scratch_entries(temp.path()), 0);
}

#[test]
fn test_script_runs_leave_no_scratch_artifacts() {
    let temp = tempfile::tempdir().unwrap();
    let service = service_in(temp.path());

    for source in ["print(1)", "print(5 / 0)", "fn broken( {"] {
        service.execute_source(source, "script").unwrap();
    }
    assert_eq!(scratch_entries(temp.path()), 0);
}
