//! Data model shared by every crate in the workspace.
//!
//! - [`Expression`] is a submitted arithmetic request and its lifecycle
//!   record (`processing`, `solved`, `error: <reason>`).
//! - [`Task`] is one binary operation cut out of an expression tree and
//!   handed to an agent.
//! - [`Operator`] is the closed set of supported operations.
//! - [`protocol`] holds the wire messages of the task distribution protocol.
//!
//! Status enums render to the exact text stored in the database and sent
//! over HTTP, so the same `Display`/`FromStr` pair serves both.

pub mod expression;
pub mod operator;
pub mod protocol;
pub mod task;

pub use expression::*;
pub use operator::*;
pub use protocol::*;
pub use task::*;
