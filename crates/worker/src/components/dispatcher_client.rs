use std::time::Duration;

use async_trait::async_trait;
use calc_core::{SchedulerError, SchedulerResult, TaskAssignment, TaskResultReport};
use reqwest::StatusCode;
use tracing::debug;

use super::TaskSource;

const TASK_PATH: &str = "/internal/task";

/// HTTP client for the orchestrator's internal task endpoints.
pub struct DispatcherClient {
    task_url: String,
    agent_id: String,
    http_client: reqwest::Client,
}

impl DispatcherClient {
    pub fn new(dispatcher_url: &str, agent_id: String, timeout: Duration) -> SchedulerResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SchedulerError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            task_url: format!("{}{TASK_PATH}", dispatcher_url.trim_end_matches('/')),
            agent_id,
            http_client,
        })
    }

    pub fn task_url(&self) -> &str {
        &self.task_url
    }
}

#[async_trait]
impl TaskSource for DispatcherClient {
    async fn fetch_task(&self) -> SchedulerResult<Option<TaskAssignment>> {
        let response = self
            .http_client
            .get(&self.task_url)
            .send()
            .await
            .map_err(|e| SchedulerError::Network(format!("fetch failed: {e}")))?;

        match response.status() {
            StatusCode::OK => {
                let task = response
                    .json::<TaskAssignment>()
                    .await
                    .map_err(|e| SchedulerError::Serialization(format!("bad task payload: {e}")))?;
                debug!(agent_id = %self.agent_id, task_id = task.id, "task received");
                Ok(Some(task))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(SchedulerError::Network(format!(
                "fetch failed: HTTP {status}"
            ))),
        }
    }

    async fn submit_result(&self, report: TaskResultReport) -> SchedulerResult<()> {
        let response = self
            .http_client
            .post(&self.task_url)
            .json(&report)
            .send()
            .await
            .map_err(|e| SchedulerError::Network(format!("report failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SchedulerError::Network(format!(
                "report for task {} failed: HTTP {status} - {body}",
                report.id
            )));
        }

        debug!(agent_id = %self.agent_id, task_id = report.id, "result delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_url_normalized() {
        let client = DispatcherClient::new(
            "http://localhost:8080/",
            "agent-1".to_string(),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(client.task_url(), "http://localhost:8080/internal/task");
    }

    #[tokio::test]
    async fn test_unreachable_orchestrator_is_network_error() {
        let client = DispatcherClient::new(
            "http://127.0.0.1:1",
            "agent-1".to_string(),
            Duration::from_millis(200),
        )
        .unwrap();

        let err = client.fetch_task().await.unwrap_err();
        assert!(matches!(err, SchedulerError::Network(_)));
        assert!(err.is_retryable());
    }
}
