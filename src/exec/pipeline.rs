//! Parameterized compile/run pipeline
//!
//! One implementation of stage sequencing for every compiled language:
//! prepare and stage the source, run the compiler as a bounded stage, then
//! on success run the produced unit as a second bounded stage. The toolchain
//! argument supplies only data; sequencing, timeout handling, and
//! classification live here exactly once. Cleanup is owned by the `Scratch`
//! passed in, which reclaims staged files when it drops.

use crate::config::types::{
    ExecutionRequest, ExecutionResult, Outcome, Result, COMPILE_ERROR_PREFIX,
    RUNTIME_ERROR_PREFIX, TIMEOUT_MESSAGE,
};
use crate::exec::output::{OutputLimits, TRUNCATION_MARKER};
use crate::exec::process::{run_stage, StageResult};
use crate::lang::Toolchain;
use crate::scratch::Scratch;

/// Drive one submission through compile and run.
///
/// Compile failure short-circuits; the run stage is never reached and the
/// only artifacts left for cleanup are the staged source and whatever the
/// failed compile emitted. Errors returned here are infrastructure faults
/// (staging or spawn failures), not submission faults.
pub fn run_pipeline(
    toolchain: &dyn Toolchain,
    request: &ExecutionRequest,
    scratch: &mut Scratch,
    limits: &OutputLimits,
) -> Result<ExecutionResult> {
    let unit = toolchain.unit_name(&request.source_text);
    let prepared = toolchain.prepare_source(&request.source_text);
    let source_path = scratch.stage_source(&toolchain.source_file_name(&unit), &prepared)?;

    let products = toolchain.build_products(scratch, &unit);
    for (path, kind) in products {
        scratch.register(path, kind);
    }

    log::debug!(
        "run {}: staged {} unit '{}' at {}",
        scratch.run_id(),
        toolchain.language(),
        unit,
        source_path.display()
    );

    let compile = run_stage(
        &toolchain.compile_command(scratch, &unit),
        scratch.dir(),
        None,
        request.time_budget,
        limits,
    )?;

    if compile.timed_out {
        log::info!(
            "run {}: compile stage exceeded budget after {:?}",
            scratch.run_id(),
            compile.duration
        );
        return Ok(ExecutionResult::new(TIMEOUT_MESSAGE, Outcome::Timeout));
    }
    if !compile.succeeded() {
        return Ok(compile_failure(compile));
    }

    let run = run_stage(
        &toolchain.run_command(scratch, &unit),
        scratch.dir(),
        request.stdin_data.as_deref(),
        request.time_budget,
        limits,
    )?;

    if run.timed_out {
        log::info!(
            "run {}: run stage exceeded budget after {:?}",
            scratch.run_id(),
            run.duration
        );
        return Ok(ExecutionResult::new(TIMEOUT_MESSAGE, Outcome::Timeout));
    }

    Ok(classify_run(run))
}

fn compile_failure(stage: StageResult) -> ExecutionResult {
    // Compilers report on stderr; fall back to stdout for the odd one that
    // does not.
    let (mut diagnostic, truncated) = if stage.stderr.trim().is_empty() {
        (stage.stdout, stage.stdout_truncated)
    } else {
        (stage.stderr, stage.stderr_truncated)
    };
    if truncated {
        append_truncation_marker(&mut diagnostic);
    }
    ExecutionResult::new(
        format!("{COMPILE_ERROR_PREFIX}{diagnostic}"),
        Outcome::CompileError,
    )
}

/// Classify a completed run stage.
///
/// Exit 0 with a silent stderr is a success. Anything on stderr, or a
/// non-zero exit, marks the run as failed; stderr text is appended after
/// the captured stdout behind the runtime-error sentinel. A stream cut
/// short by its byte cap carries a trailing marker.
fn classify_run(stage: StageResult) -> ExecutionResult {
    let succeeded = stage.succeeded() && stage.stderr.is_empty();

    let mut combined = stage.stdout;
    if stage.stdout_truncated {
        append_truncation_marker(&mut combined);
    }
    if !stage.stderr.is_empty() {
        combined.push('\n');
        combined.push_str(RUNTIME_ERROR_PREFIX);
        combined.push_str(&stage.stderr);
        if stage.stderr_truncated {
            append_truncation_marker(&mut combined);
        }
    }

    let outcome = if succeeded {
        Outcome::Success
    } else {
        Outcome::RuntimeError
    };
    ExecutionResult::new(combined, outcome)
}

fn append_truncation_marker(text: &mut String) {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(TRUNCATION_MARKER);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn stage(stdout: &str, stderr: &str, exit_code: Option<i32>) -> StageResult {
        StageResult {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            stdout_truncated: false,
            stderr_truncated: false,
            exit_code,
            timed_out: false,
            duration: Duration::from_millis(5),
            pid: 1234,
        }
    }

    #[test]
    fn test_clean_exit_is_success() {
        let result = classify_run(stage("42\n", "", Some(0)));
        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(result.combined_output, "42\n");
    }

    #[test]
    fn test_nonzero_exit_is_runtime_error() {
        let result = classify_run(stage("", "boom\n", Some(1)));
        assert_eq!(result.outcome, Outcome::RuntimeError);
        assert!(result.combined_output.contains("Error: boom"));
    }

    #[test]
    fn test_stderr_with_clean_exit_is_runtime_error() {
        let result = classify_run(stage("partial\n", "warning: bad\n", Some(0)));
        assert_eq!(result.outcome, Outcome::RuntimeError);
        assert!(result.combined_output.starts_with("partial\n"));
        assert!(result.combined_output.contains("Error: warning: bad"));
    }

    #[test]
    fn test_compile_failure_carries_sentinel_prefix() {
        let result = compile_failure(stage("", "main.cpp:1: error: expected ';'\n", Some(1)));
        assert_eq!(result.outcome, Outcome::CompileError);
        assert!(result
            .combined_output
            .starts_with("Compilation error: main.cpp:1"));
    }

    #[test]
    fn test_compile_failure_falls_back_to_stdout() {
        let result = compile_failure(stage("error printed on stdout\n", "  ", Some(2)));
        assert!(result.combined_output.contains("error printed on stdout"));
    }

    #[test]
    fn test_truncated_stdout_carries_marker() {
        let mut cut = stage("partial output", "", Some(0));
        cut.stdout_truncated = true;
        let result = classify_run(cut);
        assert_eq!(result.outcome, Outcome::Success);
        assert!(result.combined_output.starts_with("partial output"));
        assert!(result.combined_output.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_truncated_stderr_carries_marker() {
        let mut cut = stage("", "stack trace cut\n", Some(1));
        cut.stderr_truncated = true;
        let result = classify_run(cut);
        assert_eq!(result.outcome, Outcome::RuntimeError);
        assert!(result.combined_output.contains("Error: stack trace cut"));
        assert!(result.combined_output.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_truncated_compile_diagnostic_carries_marker() {
        let mut cut = stage("", "error: diagnostic flood", Some(1));
        cut.stderr_truncated = true;
        let result = compile_failure(cut);
        assert_eq!(result.outcome, Outcome::CompileError);
        assert!(result.combined_output.starts_with("Compilation error: "));
        assert!(result.combined_output.ends_with(TRUNCATION_MARKER));
    }
}
