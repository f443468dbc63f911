use std::sync::Arc;

use calc_core::config::{DispatcherConfig, OperationTimesConfig};
use calc_core::{
    Expression, ExpressionRepository, ExpressionStatus, Operator, SchedulerError,
    SchedulerResult, Task, TaskRepository, TaskStatus,
};
use calc_domain::{build_tree, format_postfix, to_postfix, NodePath, Tree};
use calc_infrastructure::MetricsCollector;
use tracing::{debug, info, instrument, warn};

use crate::locks::ExpressionLocks;
use crate::reclaim::ReclaimTimers;

/// What happened to a spare node handed to task creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpareNode {
    Scheduled(i64),
    DivisionByZero,
}

/// Orchestrator core: expression lifecycle and task distribution.
///
/// Safe to share behind an `Arc` and call from any number of request
/// handlers at once.
pub struct ExpressionService {
    expressions: Arc<dyn ExpressionRepository>,
    tasks: Arc<dyn TaskRepository>,
    operation_times: OperationTimesConfig,
    locks: ExpressionLocks,
    reclaim: ReclaimTimers,
    metrics: MetricsCollector,
}

impl ExpressionService {
    pub fn new(
        expressions: Arc<dyn ExpressionRepository>,
        tasks: Arc<dyn TaskRepository>,
        config: &DispatcherConfig,
        metrics: MetricsCollector,
    ) -> Self {
        let reclaim = ReclaimTimers::new(tasks.clone(), config.reclaim_grace(), metrics.clone());
        Self {
            expressions,
            tasks,
            operation_times: config.operation_times.clone(),
            locks: ExpressionLocks::new(),
            reclaim,
            metrics,
        }
    }

    /// Compiles and registers an expression, scheduling every operation that
    /// can run right away. Returns the new expression id.
    ///
    /// Syntax errors are returned before anything is stored.
    #[instrument(skip(self))]
    pub async fn process_expression(&self, text: &str) -> SchedulerResult<i64> {
        let postfix = match to_postfix(text) {
            Ok(postfix) => postfix,
            Err(e) => {
                self.metrics.record_expression_rejected();
                debug!(error = %e, "expression rejected");
                return Err(e.into());
            }
        };
        let mut tree = build_tree(&postfix)?;

        let expression = self.expressions.create(&Expression::new(text)).await?;
        let expression_id = expression.id;
        self.metrics.record_expression_submitted();
        info!(
            expression_id,
            postfix = %format_postfix(&postfix),
            nodes = tree.node_count(),
            "expression accepted"
        );

        // agents may claim a task before this call returns
        let _guard = self.locks.lock(expression_id).await;

        if let Err(e) = self.schedule_expression(&mut tree, expression_id).await {
            warn_stuck(expression_id, &e);
            return Err(e);
        }
        Ok(expression_id)
    }

    /// Schedules every spare node of a freshly stored expression and saves
    /// its tree. The caller holds the expression lock.
    async fn schedule_expression(&self, tree: &mut Tree, expression_id: i64) -> SchedulerResult<()> {
        if let Some(value) = tree.result() {
            return self.finish(expression_id, value).await;
        }

        for path in tree.find_spare_nodes() {
            if self.create_task_for_spare_node(tree, &path, expression_id).await?
                == SpareNode::DivisionByZero
            {
                return Ok(());
            }
        }

        let blob = tree.to_blob()?;
        self.expressions
            .save_tree(expression_id, Some(blob.as_slice()))
            .await
    }

    /// Turns a spare node into a pending task, or fails the expression when
    /// the node divides by zero. The caller holds the expression lock.
    async fn create_task_for_spare_node(
        &self,
        tree: &mut Tree,
        path: &NodePath,
        expression_id: i64,
    ) -> SchedulerResult<SpareNode> {
        let (operation, arg1, arg2) = tree
            .node(path)
            .and_then(|node| node.operands())
            .ok_or_else(|| SchedulerError::TreeInvariant(format!("node at {path:?} is not spare")))?;

        if operation == Operator::Div && arg2 == 0.0 {
            self.fail_division_by_zero(expression_id).await?;
            return Ok(SpareNode::DivisionByZero);
        }

        let task = Task::new(
            expression_id,
            operation,
            arg1,
            arg2,
            self.operation_times.for_operator(operation),
        );
        let task = self.tasks.create(&task).await?;

        let node = tree
            .node_mut(path)
            .ok_or_else(|| SchedulerError::TreeInvariant(format!("node at {path:?} vanished")))?;
        node.task_id = Some(task.id);

        self.metrics.record_task_created();
        debug!(
            expression_id,
            task_id = task.id,
            operation = %operation,
            arg1,
            arg2,
            "task created"
        );
        Ok(SpareNode::Scheduled(task.id))
    }

    async fn fail_division_by_zero(&self, expression_id: i64) -> SchedulerResult<()> {
        self.expressions
            .update_status(expression_id, &ExpressionStatus::division_by_zero(), 0.0)
            .await?;

        for task in self.tasks.list_by_expression_id(expression_id).await? {
            self.reclaim.cancel(task.id).await;
        }
        let removed = self.tasks.delete_by_expression_id(expression_id).await?;
        self.expressions.save_tree(expression_id, None).await?;
        self.locks.release(expression_id).await;

        self.metrics.record_expression_failed();
        warn!(expression_id, removed_tasks = removed, "division by zero");
        Ok(())
    }

    async fn finish(&self, expression_id: i64, value: f64) -> SchedulerResult<()> {
        self.expressions
            .update_status(expression_id, &ExpressionStatus::Solved, value)
            .await?;
        self.expressions.save_tree(expression_id, None).await?;
        self.locks.release(expression_id).await;

        self.metrics.record_expression_solved();
        info!(expression_id, result = value, "expression solved");
        Ok(())
    }

    /// Hands out the oldest pending task and starts its reclaim deadline.
    pub async fn get_pending_task(&self) -> SchedulerResult<Option<Task>> {
        let Some(task) = self.tasks.claim_pending().await? else {
            return Ok(None);
        };

        self.reclaim.arm(&task).await;
        self.metrics.record_task_dispatched();
        debug!(task_id = task.id, expression_id = task.expression_id, "task dispatched");
        Ok(Some(task))
    }

    /// Folds an agent's result into its expression.
    ///
    /// Reports for tasks that are already done are accepted and ignored, so
    /// an agent whose task was reclaimed and reissued cannot apply the same
    /// operation twice.
    #[instrument(skip(self))]
    pub async fn process_incoming_task(&self, task_id: i64, result: f64) -> SchedulerResult<()> {
        let task = self
            .tasks
            .get_by_id(task_id)
            .await?
            .ok_or_else(|| SchedulerError::task_not_found(task_id))?;
        if task.is_done() {
            self.record_stale(task_id);
            return Ok(());
        }

        let expression_id = task.expression_id;
        let _guard = self.locks.lock(expression_id).await;

        // a concurrent duplicate may have won the lock first
        match self.tasks.get_by_id(task_id).await? {
            Some(task) if !task.is_done() => {}
            Some(_) => {
                self.record_stale(task_id);
                return Ok(());
            }
            None => return Err(SchedulerError::task_not_found(task_id)),
        }

        self.tasks.update_status(task_id, TaskStatus::Done).await?;
        self.reclaim.cancel(task_id).await;
        self.metrics.record_task_completed();

        if let Err(e) = self.fold_result(task_id, expression_id, result).await {
            warn_stuck(expression_id, &e);
            return Err(e);
        }
        Ok(())
    }

    /// Writes a completed task's value into the tree and schedules its
    /// parent. The caller holds the expression lock.
    async fn fold_result(&self, task_id: i64, expression_id: i64, result: f64) -> SchedulerResult<()> {
        let expression = self
            .expressions
            .get_by_id(expression_id)
            .await?
            .ok_or_else(|| SchedulerError::expression_not_found(expression_id))?;
        if expression.status.is_terminal() {
            debug!(expression_id, status = %expression.status, "expression already finished");
            return Ok(());
        }

        let blob = expression.tree.as_deref().ok_or_else(|| {
            SchedulerError::TreeInvariant(format!("expression {expression_id} has no tree"))
        })?;
        let mut tree = Tree::from_blob(blob)?;

        let location = tree.find_parent_and_node_by_task_id(task_id).ok_or_else(|| {
            SchedulerError::TreeInvariant(format!(
                "task {task_id} not found in tree of expression {expression_id}"
            ))
        })?;
        tree.node_mut(&location.node)
            .ok_or_else(|| SchedulerError::TreeInvariant("located node vanished".to_string()))?
            .replace_with_value(result);

        let Some(parent) = location.parent else {
            return self.finish(expression_id, result).await;
        };

        if tree.node(&parent).is_some_and(|node| node.is_spare()) {
            match self
                .create_task_for_spare_node(&mut tree, &parent, expression_id)
                .await?
            {
                SpareNode::Scheduled(next_task_id) => {
                    debug!(expression_id, next_task_id, "parent operation scheduled")
                }
                SpareNode::DivisionByZero => return Ok(()),
            }
        }

        let blob = tree.to_blob()?;
        self.expressions
            .save_tree(expression_id, Some(blob.as_slice()))
            .await
    }

    fn record_stale(&self, task_id: i64) {
        self.metrics.record_stale_report();
        debug!(task_id, "duplicate result ignored");
    }

    pub async fn get_expressions(&self) -> SchedulerResult<Vec<Expression>> {
        self.expressions.list().await
    }

    pub async fn get_expression_by_id(&self, id: i64) -> SchedulerResult<Expression> {
        self.expressions
            .get_by_id(id)
            .await?
            .ok_or_else(|| SchedulerError::expression_not_found(id))
    }

    pub async fn health_check(&self) -> SchedulerResult<()> {
        self.expressions.health_check().await
    }

    /// Number of claimed tasks currently waiting on a reclaim deadline.
    pub async fn active_reclaim_timers(&self) -> usize {
        self.reclaim.active().await
    }
}

/// A failure after the first store write leaves the expression in
/// `processing` with no way forward.
fn warn_stuck(expression_id: i64, error: &SchedulerError) {
    warn!(
        expression_id,
        error = %error,
        storage_failure = error.is_storage_failure(),
        "expression left in processing after a failed update"
    );
}
