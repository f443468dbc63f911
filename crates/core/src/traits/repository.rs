//! Store contract for expressions and tasks.
//!
//! Both traits are implemented by every backend (in-memory tables and
//! SQLite). The backing medium is an implementation detail; callers only see
//! these operations.
//!
//! ## Guarantees
//!
//! - ids are unique and strictly increasing per collection
//! - every read-modify-write is atomic with respect to other callers
//! - [`TaskRepository::claim_pending`] is exclusive: two concurrent callers
//!   never receive the same task
//! - the tree blob is stored and returned byte-for-byte

use async_trait::async_trait;

use crate::models::{Expression, ExpressionStatus, Task, TaskStatus};
use crate::SchedulerResult;

#[async_trait]
pub trait ExpressionRepository: Send + Sync {
    /// Inserts a new expression and returns it with its assigned id.
    async fn create(&self, expression: &Expression) -> SchedulerResult<Expression>;

    async fn get_by_id(&self, id: i64) -> SchedulerResult<Option<Expression>>;

    /// All expressions ordered by id.
    async fn list(&self) -> SchedulerResult<Vec<Expression>>;

    /// Sets status and result. Fails with `ExpressionNotFound` for unknown ids.
    async fn update_status(
        &self,
        id: i64,
        status: &ExpressionStatus,
        result: f64,
    ) -> SchedulerResult<()>;

    /// Replaces the stored tree blob; `None` discards it.
    async fn save_tree(&self, id: i64, tree: Option<&[u8]>) -> SchedulerResult<()>;

    /// Fails when the backing store cannot serve requests.
    async fn health_check(&self) -> SchedulerResult<()> {
        Ok(())
    }
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Inserts a new task and returns it with its assigned id.
    async fn create(&self, task: &Task) -> SchedulerResult<Task>;

    async fn get_by_id(&self, id: i64) -> SchedulerResult<Option<Task>>;

    /// Fails with `TaskNotFound` for unknown ids.
    async fn update_status(&self, id: i64, status: TaskStatus) -> SchedulerResult<()>;

    /// Atomically moves the oldest pending task to in-progress and returns it.
    async fn claim_pending(&self) -> SchedulerResult<Option<Task>>;

    /// Moves the task back to pending only if it is still in progress.
    /// Returns whether the transition happened.
    async fn reclaim_if_in_progress(&self, id: i64) -> SchedulerResult<bool>;

    async fn list_by_expression_id(&self, expression_id: i64) -> SchedulerResult<Vec<Task>>;

    /// Removes every task of an expression, returning how many were removed.
    async fn delete_by_expression_id(&self, expression_id: i64) -> SchedulerResult<u64>;
}
