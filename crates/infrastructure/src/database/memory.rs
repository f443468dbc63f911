use std::collections::BTreeMap;

use async_trait::async_trait;
use calc_core::{
    Expression, ExpressionRepository, ExpressionStatus, SchedulerError, SchedulerResult, Task,
    TaskRepository, TaskStatus,
};
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Default)]
struct Tables {
    expressions: BTreeMap<i64, Expression>,
    tasks: BTreeMap<i64, Task>,
    last_expression_id: i64,
    last_task_id: i64,
}

/// Process-local store for both collections.
///
/// Every operation runs under one lock, so a claim is exclusive and ids are
/// never reused. Keys are ordered, which gives id-ordered listings and an
/// oldest-first claim for free.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExpressionRepository for InMemoryStore {
    async fn create(&self, expression: &Expression) -> SchedulerResult<Expression> {
        let mut tables = self.tables.lock().await;
        tables.last_expression_id += 1;

        let mut stored = expression.clone();
        stored.id = tables.last_expression_id;
        tables.expressions.insert(stored.id, stored.clone());

        debug!(expression_id = stored.id, "stored expression");
        Ok(stored)
    }

    async fn get_by_id(&self, id: i64) -> SchedulerResult<Option<Expression>> {
        Ok(self.tables.lock().await.expressions.get(&id).cloned())
    }

    async fn list(&self) -> SchedulerResult<Vec<Expression>> {
        Ok(self
            .tables
            .lock()
            .await
            .expressions
            .values()
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        id: i64,
        status: &ExpressionStatus,
        result: f64,
    ) -> SchedulerResult<()> {
        let mut tables = self.tables.lock().await;
        let expression = tables
            .expressions
            .get_mut(&id)
            .ok_or_else(|| SchedulerError::expression_not_found(id))?;

        expression.status = status.clone();
        expression.result = result;
        expression.updated_at = Utc::now();
        Ok(())
    }

    async fn save_tree(&self, id: i64, tree: Option<&[u8]>) -> SchedulerResult<()> {
        let mut tables = self.tables.lock().await;
        let expression = tables
            .expressions
            .get_mut(&id)
            .ok_or_else(|| SchedulerError::expression_not_found(id))?;

        expression.tree = tree.map(<[u8]>::to_vec);
        expression.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for InMemoryStore {
    async fn create(&self, task: &Task) -> SchedulerResult<Task> {
        let mut tables = self.tables.lock().await;
        tables.last_task_id += 1;

        let mut stored = task.clone();
        stored.id = tables.last_task_id;
        tables.tasks.insert(stored.id, stored.clone());

        debug!(task_id = stored.id, expression_id = stored.expression_id, "stored task");
        Ok(stored)
    }

    async fn get_by_id(&self, id: i64) -> SchedulerResult<Option<Task>> {
        Ok(self.tables.lock().await.tasks.get(&id).cloned())
    }

    async fn update_status(&self, id: i64, status: TaskStatus) -> SchedulerResult<()> {
        let mut tables = self.tables.lock().await;
        let task = tables
            .tasks
            .get_mut(&id)
            .ok_or_else(|| SchedulerError::task_not_found(id))?;
        task.status = status;
        Ok(())
    }

    async fn claim_pending(&self) -> SchedulerResult<Option<Task>> {
        let mut tables = self.tables.lock().await;
        let claimed = tables
            .tasks
            .values_mut()
            .find(|task| task.status == TaskStatus::Pending)
            .map(|task| {
                task.status = TaskStatus::InProgress;
                task.clone()
            });
        Ok(claimed)
    }

    async fn reclaim_if_in_progress(&self, id: i64) -> SchedulerResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables.tasks.get_mut(&id) {
            Some(task) if task.status == TaskStatus::InProgress => {
                task.status = TaskStatus::Pending;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_by_expression_id(&self, expression_id: i64) -> SchedulerResult<Vec<Task>> {
        Ok(self
            .tables
            .lock()
            .await
            .tasks
            .values()
            .filter(|task| task.expression_id == expression_id)
            .cloned()
            .collect())
    }

    async fn delete_by_expression_id(&self, expression_id: i64) -> SchedulerResult<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.tasks.len();
        tables
            .tasks
            .retain(|_, task| task.expression_id != expression_id);
        Ok((before - tables.tasks.len()) as u64)
    }
}
