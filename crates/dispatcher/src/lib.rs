//! Expression scheduling.
//!
//! [`ExpressionService`] owns the lifecycle of every submitted expression:
//! it compiles the text, cuts the tree into tasks for agents, folds reported
//! results back into the tree and reclaims tasks whose agents went quiet.

pub mod locks;
pub mod reclaim;
pub mod service;

pub use locks::ExpressionLocks;
pub use reclaim::ReclaimTimers;
pub use service::ExpressionService;
