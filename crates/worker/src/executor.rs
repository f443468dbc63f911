use std::time::Instant;

use calc_core::TaskAssignment;
use tracing::{debug, warn};

/// Applies the task's operator. Division by zero yields `0`.
pub fn compute(task: &TaskAssignment) -> f64 {
    match task.operation.apply(task.arg1, task.arg2) {
        Some(value) => value,
        None => {
            warn!(task_id = task.id, arg1 = task.arg1, "division by zero, reporting 0");
            0.0
        }
    }
}

/// Waits out the declared operation time, then computes.
pub async fn execute(task: &TaskAssignment) -> f64 {
    let started = Instant::now();
    tokio::time::sleep(task.operation_time()).await;
    let result = compute(task);
    debug!(
        task_id = task.id,
        operation = %task.operation,
        result,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "task computed"
    );
    result
}

#[cfg(test)]
mod tests {
    use calc_core::Operator;

    use super::*;

    fn assignment(operation: Operator, arg1: f64, arg2: f64, operation_time_ms: u64) -> TaskAssignment {
        TaskAssignment {
            id: 1,
            arg1,
            arg2,
            operation,
            operation_time_ms,
        }
    }

    #[test]
    fn test_compute_all_operators() {
        assert_eq!(compute(&assignment(Operator::Add, 2.0, 3.0, 0)), 5.0);
        assert_eq!(compute(&assignment(Operator::Sub, 2.0, 3.0, 0)), -1.0);
        assert_eq!(compute(&assignment(Operator::Mul, 2.0, 3.0, 0)), 6.0);
        assert_eq!(compute(&assignment(Operator::Div, 3.0, 2.0, 0)), 1.5);
    }

    #[test]
    fn test_division_by_zero_yields_zero() {
        assert_eq!(compute(&assignment(Operator::Div, 3.0, 0.0, 0)), 0.0);
    }

    #[tokio::test]
    async fn test_execute_waits_operation_time() {
        let started = Instant::now();
        let result = execute(&assignment(Operator::Mul, 4.0, 2.5, 30)).await;
        assert_eq!(result, 10.0);
        assert!(started.elapsed().as_millis() >= 30);
    }
}
