//! Request dispatch
//!
//! The service facade: resolves the requested language, applies the
//! admission gate, selects a strategy, and normalizes every outcome into
//! one result envelope. Once a language has been accepted, nothing escapes
//! to the caller as an error; infrastructure faults surface inside the
//! envelope as internal errors.

use crate::config::types::{
    ExecError, ExecutionRequest, ExecutionResult, Language, Result, ServiceConfig,
};
use crate::exec::pipeline::run_pipeline;
use crate::interp::InterpLimits;
use crate::lang::{self, script};
use crate::scratch::ScratchRoot;
use crossbeam_channel::{Receiver, Sender};
use uuid::Uuid;

/// Executes submissions against the configured strategies.
///
/// One instance serves concurrent callers; per-request state lives in the
/// request's scratch directory or the script worker, never in the service.
pub struct ExecutionService {
    config: ServiceConfig,
    scratch_root: ScratchRoot,
    ticket_tx: Sender<()>,
    ticket_rx: Receiver<()>,
}

/// Admission slot, returned to the pool on drop
struct Ticket<'a> {
    slots: &'a Sender<()>,
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        let _ = self.slots.send(());
    }
}

impl ExecutionService {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let scratch_root = ScratchRoot::new(config.scratch_root.clone())?;

        let slots = config.max_concurrency.max(1);
        let (ticket_tx, ticket_rx) = crossbeam_channel::bounded(slots);
        for _ in 0..slots {
            ticket_tx.send(()).map_err(|_| {
                ExecError::Process("failed to initialize admission gate".to_string())
            })?;
        }

        log::info!(
            "execution service ready: scratch root {}, {} admission slots",
            scratch_root.path().display(),
            slots
        );
        Ok(ExecutionService {
            config,
            scratch_root,
            ticket_tx,
            ticket_rx,
        })
    }

    /// Service with the default configuration
    pub fn with_defaults() -> Result<Self> {
        Self::new(ServiceConfig::default())
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Resolve a language id and execute, with the service's default budget.
    ///
    /// The only error is an unknown language id; every accepted submission
    /// produces a result envelope.
    pub fn execute_source(&self, source: &str, language_id: &str) -> Result<ExecutionResult> {
        let language = lang::resolve_language(language_id)?;
        let request = ExecutionRequest::new(source, language)
            .with_time_budget(self.config.default_time_budget);
        Ok(self.execute(request))
    }

    /// Execute one request. Infallible: strategy faults are folded into the
    /// envelope as internal errors.
    pub fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
        let _ticket = self.admit();

        match request.language {
            Language::Script => self.execute_script(&request),
            language => self.execute_compiled(language, &request),
        }
    }

    fn execute_script(&self, request: &ExecutionRequest) -> ExecutionResult {
        let run_id = Uuid::new_v4();
        log::info!("run {run_id}: script execution started");

        let limits = InterpLimits {
            max_output_bytes: self.config.output_limits.stdout_limit,
            ..InterpLimits::default()
        };
        let result = script::execute_script(request, &limits);

        log::info!("run {run_id}: script finished with {}", result.outcome);
        result
    }

    fn execute_compiled(&self, language: Language, request: &ExecutionRequest) -> ExecutionResult {
        match self.run_compiled(language, request) {
            Ok(result) => result,
            Err(e) => {
                log::error!("{language} execution failed internally: {e}");
                ExecutionResult::internal_error(e.to_string())
            }
        }
    }

    fn run_compiled(&self, language: Language, request: &ExecutionRequest) -> Result<ExecutionResult> {
        let toolchain = match lang::toolchain_for(language) {
            Some(toolchain) => toolchain,
            None => {
                return Err(ExecError::Process(format!(
                    "language {language} has no compiled toolchain"
                )))
            }
        };

        // Scratch drops at the end of this scope, reclaiming artifacts on
        // success and error paths alike.
        let mut scratch = self.scratch_root.create_scratch()?;
        log::info!(
            "run {}: {} execution started",
            scratch.run_id(),
            toolchain.language()
        );

        let result = run_pipeline(toolchain, request, &mut scratch, &self.config.output_limits)?;

        log::info!(
            "run {}: {} finished with {}",
            scratch.run_id(),
            toolchain.language(),
            result.outcome
        );
        Ok(result)
    }

    fn admit(&self) -> Ticket<'_> {
        // Cannot disconnect while the service owns the sender half.
        let _ = self.ticket_rx.recv();
        Ticket {
            slots: &self.ticket_tx,
        }
    }
}
