//! Interpreted-execution strategy
//!
//! Script source runs in process on a dedicated worker thread. The worker
//! shares a cancel token with the caller: the evaluator polls it between
//! statements, and the caller waits on a bounded channel with the same
//! budget. Whichever side notices the deadline first, the caller returns a
//! timeout immediately and the worker stops at its next poll instead of
//! being left to run forever.

use crate::config::types::{
    ExecutionRequest, ExecutionResult, Outcome, RUNTIME_ERROR_PREFIX, TIMEOUT_MESSAGE,
};
use crate::interp::{run_script, CancelToken, InterpLimits, ScriptErrorKind, ScriptRun};
use crossbeam_channel::RecvTimeoutError;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Extra wait past the budget so a worker that noticed the deadline itself
/// can deliver its result instead of being abandoned
const JOIN_SLACK: Duration = Duration::from_millis(100);

/// Worker stack size. The parser's nesting bound and the evaluator's call
/// depth bound cap recursion, and this leaves that worst case ample room.
const WORKER_STACK_BYTES: usize = 16 * 1024 * 1024;

/// Execute the request's source through the embedded interpreter.
pub fn execute_script(request: &ExecutionRequest, limits: &InterpLimits) -> ExecutionResult {
    let cancel = Arc::new(CancelToken::with_budget(request.time_budget));
    let (result_tx, result_rx) = crossbeam_channel::bounded::<ScriptRun>(1);

    let source = request.source_text.clone();
    let stdin_data = request.stdin_data.clone();
    let worker_cancel = Arc::clone(&cancel);
    let worker_limits = limits.clone();

    let spawned = thread::Builder::new()
        .name("script-worker".to_string())
        .stack_size(WORKER_STACK_BYTES)
        .spawn(move || {
            let run = run_script(
                &source,
                stdin_data.as_deref(),
                &worker_cancel,
                &worker_limits,
            );
            let _ = result_tx.send(run);
        });

    let worker = match spawned {
        Ok(handle) => handle,
        Err(e) => {
            return ExecutionResult::internal_error(format!("failed to spawn script worker: {e}"))
        }
    };

    match result_rx.recv_timeout(request.time_budget + JOIN_SLACK) {
        Ok(run) => {
            let _ = worker.join();
            package_run(run)
        }
        Err(RecvTimeoutError::Timeout) => {
            // The worker is stuck inside a single long operation. Flag the
            // token and leave the thread to exit at its next poll; internal
            // collection limits keep every operation finite.
            cancel.cancel();
            log::info!("script evaluation exceeded its {:?} budget", request.time_budget);
            ExecutionResult::new(TIMEOUT_MESSAGE, Outcome::Timeout)
        }
        Err(RecvTimeoutError::Disconnected) => {
            let _ = worker.join();
            ExecutionResult::internal_error("script worker terminated unexpectedly")
        }
    }
}

/// Fold a finished script run into the result envelope.
fn package_run(run: ScriptRun) -> ExecutionResult {
    match run.error {
        None => ExecutionResult::new(run.output, Outcome::Success),
        Some(error) if error.kind == ScriptErrorKind::Timeout => {
            ExecutionResult::new(TIMEOUT_MESSAGE, Outcome::Timeout)
        }
        Some(error) => {
            // Output printed before the failure is preserved ahead of the
            // diagnostic.
            let mut combined = run.output;
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(RUNTIME_ERROR_PREFIX);
            combined.push_str(&error.to_string());
            ExecutionResult::new(combined, Outcome::RuntimeError)
        }
    }
}
