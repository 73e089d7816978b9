//! codebox: an on-demand code execution service
//!
//! Takes user-submitted source text plus a declared language, compiles when
//! the language needs it, runs under a wall-clock budget, captures output,
//! and reports a classified outcome. One submission cannot corrupt the
//! server's working state or hang the service indefinitely.
//!
//! # Architecture
//!
//! ## Dispatch ([`dispatch`])
//! - [`dispatch::ExecutionService`]: language resolution, admission gate,
//!   strategy selection, and the top-level failure boundary
//!
//! ## Language Strategies ([`lang`])
//! - [`lang::script`]: in-process execution on a cancellable worker thread
//! - [`lang::jvm`]: javac/java toolchain data, unit-name derivation, wrapping
//! - [`lang::native`]: g++ toolchain data with fixed unit naming
//!
//! ## Execution Stages ([`exec`])
//! - [`exec::pipeline`]: the single compile/run sequencer both compiled
//!   languages drive
//! - [`exec::process`]: budget-enforced subprocesses with process-group
//!   termination
//! - [`exec::output`]: capped concurrent output collection
//!
//! ## Script Interpreter ([`interp`])
//! - [`interp::lexer`] / [`interp::parser`] / [`interp::eval`]: the embedded
//!   dynamically typed language, deadline-aware and sink-scoped
//!
//! ## Scratch Artifacts ([`scratch`])
//! - [`scratch::Scratch`]: per-request directories released on every exit
//!   path; no artifact outlives its request
//!
//! ## Configuration ([`config`])
//! - [`config::types`]: shared type definitions and closed enums
//!
//! # Security model
//!
//! **This crate provides no OS-level sandboxing.** Compiled submissions run
//! as ordinary child processes with the full privileges of the service:
//! they can read and write the filesystem, open network connections, and
//! inspect the environment. The script language exposes no such builtins,
//! but that is containment by omission, not isolation. What IS enforced:
//! wall-clock budgets with process-group kill, output byte caps, scratch
//! cleanup, and an admission limit. Running untrusted code from multiple
//! tenants requires wrapping each execution in external isolation
//! (containers, VMs, or a syscall-filtering sandbox).

// Configuration & shared types
pub mod config;

// Request dispatch
pub mod dispatch;

// Bounded execution stages
pub mod exec;

// Embedded script interpreter
pub mod interp;

// Language strategies
pub mod lang;

// Per-request scratch artifacts
pub mod scratch;

// CLI entrypoint wiring for the codebox binary
pub mod cli;

// Re-export commonly used types for convenience
pub use config::types::*;
pub use dispatch::ExecutionService;
pub use lang::resolve_language;
