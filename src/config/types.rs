//! Shared type definitions and closed enums for the execution service.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::exec::output::OutputLimits;

/// Execution service error types
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("process error: {0}")]
    Process(String),

    #[error("scratch error: {0}")]
    Scratch(String),

    #[error("interpreter error: {0}")]
    Interp(String),
}

pub type Result<T> = std::result::Result<T, ExecError>;

/// Wall-clock budget applied to each stage when the request does not override it.
pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_secs(10);

/// Sentinel text kept for backward display compatibility. The structured
/// [`Outcome`] is the primary signal; callers that still pattern-match on the
/// output string see the same prefixes the service has always produced.
pub const COMPILE_ERROR_PREFIX: &str = "Compilation error: ";
pub const RUNTIME_ERROR_PREFIX: &str = "Error: ";
pub const TIMEOUT_MESSAGE: &str = "Error: Code execution timeout (took too long)";

/// Language families served by the execution strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Embedded script language, evaluated in-process
    Script,
    /// JVM language, compiled with javac and run with java
    Jvm,
    /// Native language, compiled with g++
    Native,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Script => "script",
            Language::Jvm => "jvm",
            Language::Native => "native",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a completed execution attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Ran to completion with exit code 0 and a clean error stream
    #[serde(rename = "OK")]
    Success,
    /// External compiler reported failure
    #[serde(rename = "CE")]
    CompileError,
    /// Program raised, exited non-zero, or wrote to its error stream
    #[serde(rename = "RE")]
    RuntimeError,
    /// A stage exceeded its wall-clock budget
    #[serde(rename = "TLE")]
    Timeout,
    /// Service-side fault: missing tool, filesystem failure, worker panic
    #[serde(rename = "IE")]
    InternalError,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Outcome::Success => "OK",
            Outcome::CompileError => "CE",
            Outcome::RuntimeError => "RE",
            Outcome::Timeout => "TLE",
            Outcome::InternalError => "IE",
        };
        f.write_str(code)
    }
}

/// One execution request. Immutable once built; owned by the dispatcher for
/// the lifetime of the call.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// User-submitted source text
    pub source_text: String,
    /// Resolved language family
    pub language: Language,
    /// Wall-clock budget for each stage (compile and run are bounded
    /// independently at this value)
    pub time_budget: Duration,
    /// Data fed to the program's standard input; `None` means empty input
    pub stdin_data: Option<String>,
}

impl ExecutionRequest {
    pub fn new(source_text: impl Into<String>, language: Language) -> Self {
        ExecutionRequest {
            source_text: source_text.into(),
            language,
            time_budget: DEFAULT_TIME_BUDGET,
            stdin_data: None,
        }
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    pub fn with_stdin(mut self, data: impl Into<String>) -> Self {
        self.stdin_data = Some(data.into());
        self
    }
}

/// Result envelope returned for every accepted request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Captured output, including any sentinel-prefixed diagnostic text
    pub combined_output: String,
    /// Primary classification of the attempt
    pub outcome: Outcome,
}

impl ExecutionResult {
    pub fn new(combined_output: impl Into<String>, outcome: Outcome) -> Self {
        ExecutionResult {
            combined_output: combined_output.into(),
            outcome,
        }
    }

    /// Envelope for a service-side fault, rendered with the legacy prefix.
    pub fn internal_error(diagnostic: impl fmt::Display) -> Self {
        ExecutionResult {
            combined_output: format!("{}{}", RUNTIME_ERROR_PREFIX, diagnostic),
            outcome: Outcome::InternalError,
        }
    }
}

/// Service-wide configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Root directory holding per-request scratch directories
    pub scratch_root: PathBuf,
    /// Stage budget applied when a request does not carry its own
    pub default_time_budget: Duration,
    /// Maximum executions in flight at once; excess callers block
    pub max_concurrency: usize,
    /// Byte caps for captured child output
    pub output_limits: OutputLimits,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            scratch_root: default_scratch_root(),
            default_time_budget: DEFAULT_TIME_BUDGET,
            max_concurrency: default_concurrency(),
            output_limits: OutputLimits::default(),
        }
    }
}

/// Scratch root under the system temp dir, namespaced per euid so multi-user
/// hosts do not contend over one directory tree.
pub fn default_scratch_root() -> PathBuf {
    let euid = unsafe { libc::geteuid() };
    std::env::temp_dir().join(format!("codebox-uid-{}", euid))
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
