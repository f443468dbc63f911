//! Computing agent.
//!
//! Pulls tasks from the orchestrator, computes them with bounded
//! parallelism and posts the results back.

pub mod components;
pub mod executor;
pub mod service;

pub use components::{DispatcherClient, TaskSource};
pub use executor::{compute, execute};
pub use service::{WorkerAgent, WorkerAgentBuilder};
