use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::Operator;

/// One atomic binary operation dispatched to agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub expression_id: i64,
    pub status: TaskStatus,
    pub arg1: f64,
    pub arg2: f64,
    pub operation: Operator,
    pub operation_time_ms: u64,
}

impl Task {
    pub fn new(
        expression_id: i64,
        operation: Operator,
        arg1: f64,
        arg2: f64,
        operation_time: Duration,
    ) -> Self {
        Self {
            id: 0,
            expression_id,
            status: TaskStatus::Pending,
            arg1,
            arg2,
            operation,
            operation_time_ms: operation_time.as_millis() as u64,
        }
    }

    pub fn operation_time(&self) -> Duration {
        Duration::from_millis(self.operation_time_ms)
    }

    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }
}

/// Task lifecycle: `pending -> in progress -> done`, with reclaim
/// moving `in progress` back to `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "done")]
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in progress",
            TaskStatus::Done => "done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            _ => Err(format!("invalid task status: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_is_pending() {
        let task = Task::new(3, Operator::Mul, 2.0, 4.0, Duration::from_millis(1500));
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.expression_id, 3);
        assert_eq!(task.operation_time_ms, 1500);
        assert_eq!(task.operation_time(), Duration::from_millis(1500));
        assert!(!task.is_done());
    }

    #[test]
    fn test_status_text() {
        for status in [TaskStatus::Pending, TaskStatus::InProgress, TaskStatus::Done] {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"in progress\""
        );
        assert!("running".parse::<TaskStatus>().is_err());
    }
}
