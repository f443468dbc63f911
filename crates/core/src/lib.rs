pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use errors::*;
pub use logging::init_logging;
pub use models::{
    Expression, ExpressionStatus, ExpressionView, Operator, Task, TaskAssignment,
    TaskResultReport, TaskStatus,
};
pub use traits::{ExpressionRepository, TaskRepository};
