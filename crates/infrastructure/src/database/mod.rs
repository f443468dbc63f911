//! Storage backends for the expression and task store.
//!
//! `database.url = "memory"` selects [`InMemoryStore`]; any `sqlite:` url
//! selects the SQLite repositories sharing one pool.

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use calc_core::config::DatabaseConfig;
use calc_core::{ExpressionRepository, SchedulerResult, TaskRepository};
use tracing::info;

pub use memory::InMemoryStore;
pub use sqlite::{DatabaseManager, SqliteExpressionRepository, SqliteTaskRepository};

/// Repository handles shared by the dispatcher and the HTTP layer.
#[derive(Clone)]
pub struct Repositories {
    pub expressions: Arc<dyn ExpressionRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    database: Option<Arc<DatabaseManager>>,
}

impl Repositories {
    /// Closes the SQLite pool, if any. Later store calls fail.
    pub async fn close(&self) {
        if let Some(database) = &self.database {
            database.close().await;
            info!("SQLite store closed");
        }
    }
}

/// Builds the repositories selected by `config.url`.
pub async fn create_repositories(config: &DatabaseConfig) -> SchedulerResult<Repositories> {
    if config.is_in_memory() {
        info!("using in-memory store");
        let store = Arc::new(InMemoryStore::new());
        return Ok(Repositories {
            expressions: store.clone(),
            tasks: store,
            database: None,
        });
    }

    let manager = DatabaseManager::new(&config.url, config.max_connections).await?;
    manager.run_migrations().await?;
    info!(url = %config.url, "using SQLite store");

    Ok(Repositories {
        expressions: Arc::new(SqliteExpressionRepository::new(manager.pool().clone())),
        tasks: Arc::new(SqliteTaskRepository::new(manager.pool().clone())),
        database: Some(Arc::new(manager)),
    })
}
