//! HTTP surface of the orchestrator.
//!
//! Public routes:
//! - `POST /api/v1/calculate` submits an expression
//! - `GET /api/v1/expressions` lists expressions
//! - `GET /api/v1/expressions/{id}` returns one expression
//!
//! Agent routes:
//! - `GET /internal/task` hands out a pending task
//! - `POST /internal/task` accepts a task result
//!
//! Errors are rendered as `{"error": "...", "code": "..."}`.

pub mod error;
pub mod handlers;
pub mod routes;

pub use error::{ApiError, ApiResult};
pub use routes::{create_app, create_routes, AppState};
