pub mod sqlite_expression_repository;
pub mod sqlite_task_repository;

pub use sqlite_expression_repository::SqliteExpressionRepository;
pub use sqlite_task_repository::SqliteTaskRepository;

use std::str::FromStr;

use calc_core::SchedulerResult;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::debug;

/// Owns the SQLite pool shared by both repositories.
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// Opens (and creates if missing) the database at `url`.
    ///
    /// An in-memory database lives only as long as its connection, so
    /// `sqlite::memory:` urls get a single connection that is never recycled.
    pub async fn new(url: &str, max_connections: u32) -> SchedulerResult<Self> {
        debug!(url, "opening SQLite database");

        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let mut connect_options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        if !in_memory {
            connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
        }

        let mut pool_options = SqlitePoolOptions::new();
        pool_options = if in_memory {
            pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options.max_connections(max_connections)
        };

        let pool = pool_options.connect_with(connect_options).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> SchedulerResult<()> {
        debug!("running SQLite migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS expressions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'processing',
                result REAL NOT NULL DEFAULT 0,
                tree BLOB,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                expression_id INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                arg1 REAL NOT NULL,
                arg2 REAL NOT NULL,
                operation TEXT NOT NULL,
                operation_time_ms INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        for index_sql in [
            "CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status)",
            "CREATE INDEX IF NOT EXISTS idx_tasks_expression_id ON tasks(expression_id)",
        ] {
            sqlx::query(index_sql).execute(&self.pool).await?;
        }

        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_database_keeps_schema() {
        let manager = DatabaseManager::new("sqlite::memory:", 5).await.unwrap();
        manager.run_migrations().await.unwrap();
        // second run is a no-op
        manager.run_migrations().await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks")
            .fetch_one(manager.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_file_database_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calc.db");
        let url = format!("sqlite://{}", path.display());

        let manager = DatabaseManager::new(&url, 2).await.unwrap();
        manager.run_migrations().await.unwrap();
        manager.close().await;

        assert!(path.exists());
    }
}
