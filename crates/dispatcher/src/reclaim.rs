use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use calc_core::{Task, TaskRepository};
use calc_infrastructure::MetricsCollector;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

struct Timer {
    generation: u64,
    handle: AbortHandle,
}

#[derive(Default)]
struct TimerTable {
    timers: HashMap<i64, Timer>,
    next_generation: u64,
}

/// Deadline per claimed task.
///
/// When a claimed task is not reported within its operation time plus a
/// grace period, it goes back to `pending` (unless it is no longer
/// `in progress`) and becomes claimable again.
pub struct ReclaimTimers {
    tasks: Arc<dyn TaskRepository>,
    grace: Duration,
    table: Arc<Mutex<TimerTable>>,
    metrics: MetricsCollector,
}

impl ReclaimTimers {
    pub fn new(tasks: Arc<dyn TaskRepository>, grace: Duration, metrics: MetricsCollector) -> Self {
        Self {
            tasks,
            grace,
            table: Arc::new(Mutex::new(TimerTable::default())),
            metrics,
        }
    }

    /// Starts the deadline for a freshly claimed task, replacing any timer
    /// already running for the same id.
    pub async fn arm(&self, task: &Task) {
        let task_id = task.id;
        let deadline = task.operation_time() + self.grace;

        // the table lock is held across spawn so the timer cannot remove its
        // entry before it is inserted
        let mut table = self.table.lock().await;
        table.next_generation += 1;
        let generation = table.next_generation;

        let tasks = self.tasks.clone();
        let shared = self.table.clone();
        let metrics = self.metrics.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(deadline).await;

            match tasks.reclaim_if_in_progress(task_id).await {
                Ok(true) => {
                    info!(task_id, deadline_ms = deadline.as_millis() as u64, "task reclaimed");
                    metrics.record_task_reclaimed();
                }
                Ok(false) => debug!(task_id, "reclaim skipped, task no longer in progress"),
                Err(e) => warn!(task_id, error = %e, "failed to reclaim task"),
            }

            let mut table = shared.lock().await;
            if table
                .timers
                .get(&task_id)
                .is_some_and(|timer| timer.generation == generation)
            {
                table.timers.remove(&task_id);
            }
            metrics.set_reclaim_timers(table.timers.len());
        })
        .abort_handle();

        if let Some(previous) = table.timers.insert(task_id, Timer { generation, handle }) {
            debug!(task_id, "replacing reclaim timer");
            previous.handle.abort();
        }
        self.metrics.set_reclaim_timers(table.timers.len());
    }

    /// Stops the timer of a task. Returns whether one was running.
    pub async fn cancel(&self, task_id: i64) -> bool {
        let mut table = self.table.lock().await;
        let cancelled = match table.timers.remove(&task_id) {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        };
        self.metrics.set_reclaim_timers(table.timers.len());
        cancelled
    }

    pub async fn active(&self) -> usize {
        self.table.lock().await.timers.len()
    }
}

#[cfg(test)]
mod tests {
    use calc_core::{Operator, TaskStatus};
    use calc_infrastructure::InMemoryStore;

    use super::*;

    async fn claimed_task(store: &Arc<InMemoryStore>, operation_ms: u64) -> Task {
        let task = Task::new(1, Operator::Add, 1.0, 1.0, Duration::from_millis(operation_ms));
        TaskRepository::create(store.as_ref(), &task).await.unwrap();
        store.claim_pending().await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_expired_timer_reclaims_task() {
        let store = Arc::new(InMemoryStore::new());
        let timers = ReclaimTimers::new(
            store.clone(),
            Duration::from_millis(10),
            MetricsCollector::new(),
        );

        let task = claimed_task(&store, 10).await;
        timers.arm(&task).await;
        assert_eq!(timers.active().await, 1);

        tokio::time::sleep(Duration::from_millis(150)).await;

        let reloaded = TaskRepository::get_by_id(store.as_ref(), task.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.status, TaskStatus::Pending);
        assert_eq!(timers.active().await, 0);
    }

    #[tokio::test]
    async fn test_cancelled_timer_leaves_task_alone() {
        let store = Arc::new(InMemoryStore::new());
        let timers = ReclaimTimers::new(
            store.clone(),
            Duration::from_millis(10),
            MetricsCollector::new(),
        );

        let task = claimed_task(&store, 10).await;
        timers.arm(&task).await;
        assert!(timers.cancel(task.id).await);
        assert!(!timers.cancel(task.id).await);

        tokio::time::sleep(Duration::from_millis(100)).await;

        let reloaded = TaskRepository::get_by_id(store.as_ref(), task.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.status, TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn test_rearm_replaces_timer() {
        let store = Arc::new(InMemoryStore::new());
        let timers = ReclaimTimers::new(
            store.clone(),
            Duration::from_millis(0),
            MetricsCollector::new(),
        );

        let task = claimed_task(&store, 5_000).await;
        timers.arm(&task).await;
        timers.arm(&task).await;
        assert_eq!(timers.active().await, 1);
    }
}
