//! Automatic compute task processor.
//!
//! Core components:
//! - `simulator` — stochastic execution model behind a seedable trait
//! - `recovery` — startup reconciliation of stranded `running` tasks
//! - `executor` — per-task state machine (claim → simulate → resolve)
//! - `scheduler` — periodic discovery loop with parallel dispatch
//! - `stats` — status, queue, and history views for the API layer

pub mod executor;
pub mod recovery;
pub mod scheduler;
pub mod simulator;
pub mod stats;

pub use recovery::recover_stranded_tasks;
pub use scheduler::TaskProcessor;
pub use simulator::{ExecutionModel, Outcome, StochasticModel};
pub use stats::{ExecutionHistory, ProcessorStats, QueueSnapshot};
