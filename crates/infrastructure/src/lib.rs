pub mod database;
pub mod observability;

pub use database::{
    create_repositories, InMemoryStore, Repositories, SqliteExpressionRepository,
    SqliteTaskRepository,
};
pub use observability::{init_metrics, MetricsCollector};
