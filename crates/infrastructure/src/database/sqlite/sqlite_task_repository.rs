use async_trait::async_trait;
use calc_core::{Operator, SchedulerError, SchedulerResult, Task, TaskRepository, TaskStatus};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

const SELECT_COLUMNS: &str = "id, expression_id, status, arg1, arg2, operation, operation_time_ms";

pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_task(row: &SqliteRow) -> SchedulerResult<Task> {
        let status: String = row.try_get("status")?;
        let operation: String = row.try_get("operation")?;
        let operation_time_ms: i64 = row.try_get("operation_time_ms")?;

        Ok(Task {
            id: row.try_get("id")?,
            expression_id: row.try_get("expression_id")?,
            status: status
                .parse::<TaskStatus>()
                .map_err(SchedulerError::database_error)?,
            arg1: row.try_get("arg1")?,
            arg2: row.try_get("arg2")?,
            operation: operation
                .parse::<Operator>()
                .map_err(SchedulerError::database_error)?,
            operation_time_ms: operation_time_ms.max(0) as u64,
        })
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    #[instrument(skip(self, task), fields(expression_id = %task.expression_id))]
    async fn create(&self, task: &Task) -> SchedulerResult<Task> {
        let sql = format!(
            "INSERT INTO tasks (expression_id, status, arg1, arg2, operation, operation_time_ms)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {SELECT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(task.expression_id)
            .bind(task.status.as_str())
            .bind(task.arg1)
            .bind(task.arg2)
            .bind(task.operation.to_string())
            .bind(task.operation_time_ms as i64)
            .fetch_one(&self.pool)
            .await?;

        let created = Self::row_to_task(&row)?;
        debug!(task_id = created.id, "stored task");
        Ok(created)
    }

    #[instrument(skip(self), fields(task_id = %id))]
    async fn get_by_id(&self, id: i64) -> SchedulerResult<Option<Task>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM tasks WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_task).transpose()
    }

    #[instrument(skip(self), fields(task_id = %id, status = %status))]
    async fn update_status(&self, id: i64, status: TaskStatus) -> SchedulerResult<()> {
        let outcome = sqlx::query("UPDATE tasks SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if outcome.rows_affected() == 0 {
            return Err(SchedulerError::task_not_found(id));
        }
        Ok(())
    }

    /// A single UPDATE statement, so concurrent claimers are serialized by
    /// SQLite's write lock.
    #[instrument(skip(self))]
    async fn claim_pending(&self) -> SchedulerResult<Option<Task>> {
        let sql = format!(
            "UPDATE tasks SET status = 'in progress'
             WHERE id = (SELECT id FROM tasks WHERE status = 'pending' ORDER BY id LIMIT 1)
             RETURNING {SELECT_COLUMNS}"
        );
        let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;

        let task = row.as_ref().map(Self::row_to_task).transpose()?;
        if let Some(task) = &task {
            debug!(task_id = task.id, "claimed task");
        }
        Ok(task)
    }

    #[instrument(skip(self), fields(task_id = %id))]
    async fn reclaim_if_in_progress(&self, id: i64) -> SchedulerResult<bool> {
        let outcome =
            sqlx::query("UPDATE tasks SET status = 'pending' WHERE id = ? AND status = 'in progress'")
                .bind(id)
                .execute(&self.pool)
                .await?;

        Ok(outcome.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn list_by_expression_id(&self, expression_id: i64) -> SchedulerResult<Vec<Task>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM tasks WHERE expression_id = ? ORDER BY id");
        let rows = sqlx::query(&sql)
            .bind(expression_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_task).collect()
    }

    #[instrument(skip(self))]
    async fn delete_by_expression_id(&self, expression_id: i64) -> SchedulerResult<u64> {
        let outcome = sqlx::query("DELETE FROM tasks WHERE expression_id = ?")
            .bind(expression_id)
            .execute(&self.pool)
            .await?;

        Ok(outcome.rows_affected())
    }
}
