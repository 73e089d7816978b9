//! Bounded execution stages
//!
//! Subprocess plumbing shared by the compiled strategies: capped output
//! collection, budget-enforced child processes with group termination, and
//! the single compile/run pipeline both toolchains drive.

pub mod output;
pub mod pipeline;
pub mod process;
