use async_trait::async_trait;
use calc_core::{SchedulerResult, TaskAssignment, TaskResultReport};

/// Where an agent gets work from and sends results to.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// `Ok(None)` means there is currently nothing to do.
    async fn fetch_task(&self) -> SchedulerResult<Option<TaskAssignment>>;

    async fn submit_result(&self, report: TaskResultReport) -> SchedulerResult<()>;
}
