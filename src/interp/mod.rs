//! Embedded script interpreter
//!
//! A small dynamically typed language executed entirely in process: no
//! subprocess, no scratch files. Source goes through [`lexer`] and [`parser`]
//! into an AST that [`eval`] walks directly. Each run gets a fresh global
//! scope and its own output sink, and polls a [`CancelToken`] so a hosting
//! thread can stop a runaway script at the deadline.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod value;

pub use eval::{Interpreter, InterpLimits};
pub use value::Value;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// What stage of a script run an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptErrorKind {
    Parse,
    Runtime,
    Timeout,
}

/// Error raised while parsing or evaluating a script
#[derive(Debug, Clone)]
pub struct ScriptError {
    pub kind: ScriptErrorKind,
    /// 1-based source line, 0 when the error has no source position
    pub line: usize,
    pub message: String,
}

impl ScriptError {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        ScriptError {
            kind: ScriptErrorKind::Parse,
            line,
            message: message.into(),
        }
    }

    pub fn runtime(line: usize, message: impl Into<String>) -> Self {
        ScriptError {
            kind: ScriptErrorKind::Runtime,
            line,
            message: message.into(),
        }
    }

    pub fn timeout() -> Self {
        ScriptError {
            kind: ScriptErrorKind::Timeout,
            line: 0,
            message: "evaluation deadline exceeded".to_string(),
        }
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ScriptErrorKind::Parse => write!(f, "syntax error at line {}: {}", self.line, self.message),
            ScriptErrorKind::Runtime if self.line > 0 => {
                write!(f, "line {}: {}", self.line, self.message)
            }
            _ => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ScriptError {}

/// Deadline plus a manual kill switch, shared with the evaluating thread.
///
/// The evaluator polls [`expired`](CancelToken::expired) on statement and
/// loop boundaries, so a script stops within one statement of the deadline
/// or of a [`cancel`](CancelToken::cancel) call from another thread.
#[derive(Debug)]
pub struct CancelToken {
    started: Instant,
    budget: Duration,
    cancelled: AtomicBool,
}

impl CancelToken {
    pub fn with_budget(budget: Duration) -> Self {
        CancelToken {
            started: Instant::now(),
            budget,
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn expired(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed) || self.started.elapsed() >= self.budget
    }
}

/// Outcome of one script run: whatever was printed, plus the error that
/// stopped the run early, if any.
#[derive(Debug)]
pub struct ScriptRun {
    pub output: String,
    pub error: Option<ScriptError>,
}

/// Parse and evaluate `source` against a fresh scope.
///
/// Output printed before a runtime error or timeout is preserved in
/// [`ScriptRun::output`]. Parse errors produce no output.
pub fn run_script(
    source: &str,
    stdin_data: Option<&str>,
    cancel: &CancelToken,
    limits: &InterpLimits,
) -> ScriptRun {
    let mut output = String::new();

    let program = match parser::Parser::parse(source) {
        Ok(program) => program,
        Err(error) => {
            return ScriptRun {
                output,
                error: Some(error),
            }
        }
    };

    let mut interp = Interpreter::new(&mut output, stdin_data, cancel, limits);
    let error = interp.run(&program).err();

    ScriptRun { output, error }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_has_no_output() {
        let cancel = CancelToken::with_budget(Duration::from_secs(5));
        let run = run_script("this is not ( valid", None, &cancel, &InterpLimits::default());
        assert_eq!(run.output, "");
        let err = run.error.expect("expected parse error");
        assert_eq!(err.kind, ScriptErrorKind::Parse);
    }

    #[test]
    fn test_runs_are_isolated() {
        let cancel = CancelToken::with_budget(Duration::from_secs(5));
        let limits = InterpLimits::default();

        let first = run_script("x = 41\nprint(x)", None, &cancel, &limits);
        assert_eq!(first.output, "41\n");

        // A later run must not see the earlier run's globals.
        let second = run_script("print(x)", None, &cancel, &limits);
        let err = second.error.expect("expected undefined variable");
        assert!(err.message.contains("undefined variable"));
    }

    #[test]
    fn test_error_rendering() {
        assert_eq!(
            ScriptError::parse(2, "unexpected token").to_string(),
            "syntax error at line 2: unexpected token"
        );
        assert_eq!(
            ScriptError::runtime(3, "division by zero").to_string(),
            "line 3: division by zero"
        );
        assert_eq!(
            ScriptError::timeout().to_string(),
            "evaluation deadline exceeded"
        );
    }

    #[test]
    fn test_cancel_token_budget() {
        let token = CancelToken::with_budget(Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(30));
        assert!(token.expired());

        let fresh = CancelToken::with_budget(Duration::from_secs(60));
        assert!(!fresh.expired());
        fresh.cancel();
        assert!(fresh.expired());
    }
}
