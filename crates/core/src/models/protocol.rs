//! Messages exchanged between the orchestrator and compute agents.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Operator, Task};

/// Body of a successful fetch-task response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAssignment {
    pub id: i64,
    pub arg1: f64,
    pub arg2: f64,
    pub operation: Operator,
    pub operation_time_ms: u64,
}

impl TaskAssignment {
    pub fn operation_time(&self) -> Duration {
        Duration::from_millis(self.operation_time_ms)
    }
}

impl From<&Task> for TaskAssignment {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            arg1: task.arg1,
            arg2: task.arg2,
            operation: task.operation,
            operation_time_ms: task.operation_time_ms,
        }
    }
}

/// Body of a submit-result request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaskResultReport {
    pub id: i64,
    pub result: f64,
}
