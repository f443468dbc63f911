use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::Operator;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    pub enabled: bool,
    pub operation_times: OperationTimesConfig,
    /// Added to a task's operation time before an unanswered claim is reclaimed.
    pub reclaim_grace_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            operation_times: OperationTimesConfig::default(),
            reclaim_grace_ms: 1000,
        }
    }
}

impl DispatcherConfig {
    pub fn reclaim_grace(&self) -> Duration {
        Duration::from_millis(self.reclaim_grace_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.reclaim_grace_ms == 0 {
            return Err(anyhow::anyhow!("reclaim_grace_ms must be greater than 0"));
        }
        Ok(())
    }
}

/// Simulated compute cost per operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationTimesConfig {
    pub addition_ms: u64,
    pub subtraction_ms: u64,
    pub multiplication_ms: u64,
    pub division_ms: u64,
}

impl Default for OperationTimesConfig {
    fn default() -> Self {
        Self {
            addition_ms: 1000,
            subtraction_ms: 1000,
            multiplication_ms: 1000,
            division_ms: 1000,
        }
    }
}

impl OperationTimesConfig {
    pub fn uniform(ms: u64) -> Self {
        Self {
            addition_ms: ms,
            subtraction_ms: ms,
            multiplication_ms: ms,
            division_ms: ms,
        }
    }

    pub fn for_operator(&self, operator: Operator) -> Duration {
        let ms = match operator {
            Operator::Add => self.addition_ms,
            Operator::Sub => self.subtraction_ms,
            Operator::Mul => self.multiplication_ms,
            Operator::Div => self.division_ms,
        };
        Duration::from_millis(ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub enabled: bool,
    /// Name used in logs; empty means derive from the host name.
    pub agent_id: String,
    /// Number of concurrent workers in the agent pool.
    pub computing_power: usize,
    /// Base url of the orchestrator, e.g. `http://localhost:8080`.
    pub dispatcher_url: String,
    pub poll_backoff_ms: u64,
    /// Upper bound of the random delay added to each backoff.
    pub poll_jitter_ms: u64,
    pub request_timeout_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            agent_id: String::new(),
            computing_power: 5,
            dispatcher_url: "http://localhost:8080".to_string(),
            poll_backoff_ms: 1000,
            poll_jitter_ms: 0,
            request_timeout_seconds: 10,
        }
    }
}

impl WorkerConfig {
    pub fn poll_backoff(&self) -> Duration {
        Duration::from_millis(self.poll_backoff_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.computing_power == 0 {
            return Err(anyhow::anyhow!("computing_power must be greater than 0"));
        }

        if !self.dispatcher_url.starts_with("http://") && !self.dispatcher_url.starts_with("https://")
        {
            return Err(anyhow::anyhow!(
                "dispatcher_url must be an http(s) url: {}",
                self.dispatcher_url
            ));
        }

        if self.poll_backoff_ms == 0 {
            return Err(anyhow::anyhow!("poll_backoff_ms must be greater than 0"));
        }

        if self.request_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("request_timeout_seconds must be greater than 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_time_per_operator() {
        let times = OperationTimesConfig {
            addition_ms: 1,
            subtraction_ms: 2,
            multiplication_ms: 3,
            division_ms: 4,
        };
        assert_eq!(times.for_operator(Operator::Add), Duration::from_millis(1));
        assert_eq!(times.for_operator(Operator::Sub), Duration::from_millis(2));
        assert_eq!(times.for_operator(Operator::Mul), Duration::from_millis(3));
        assert_eq!(times.for_operator(Operator::Div), Duration::from_millis(4));
    }

    #[test]
    fn test_worker_validation() {
        let mut worker = WorkerConfig::default();
        assert!(worker.validate().is_ok());

        worker.computing_power = 0;
        assert!(worker.validate().is_err());

        worker.computing_power = 2;
        worker.dispatcher_url = "localhost:8080".to_string();
        assert!(worker.validate().is_err());
    }
}
