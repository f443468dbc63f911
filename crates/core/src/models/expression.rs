use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Expression record as kept by the store.
///
/// `tree` holds the serialized operation tree and is present only while the
/// expression is still being processed.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub id: i64,
    pub source: String,
    pub status: ExpressionStatus,
    pub result: f64,
    pub tree: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Expression {
    pub fn new(source: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            source: source.into(),
            status: ExpressionStatus::Processing,
            result: 0.0,
            tree: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_processing(&self) -> bool {
        self.status == ExpressionStatus::Processing
    }

    pub fn view(&self) -> ExpressionView {
        ExpressionView {
            id: self.id,
            status: self.status.clone(),
            result: self.result,
        }
    }
}

/// Expression lifecycle state.
///
/// Text form: `processing`, `solved`, `error: <reason>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ExpressionStatus {
    Processing,
    Solved,
    Error(String),
}

impl ExpressionStatus {
    pub const DIVISION_BY_ZERO: &'static str = "division by zero";

    pub fn division_by_zero() -> Self {
        ExpressionStatus::Error(Self::DIVISION_BY_ZERO.to_string())
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExpressionStatus::Processing)
    }
}

impl fmt::Display for ExpressionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionStatus::Processing => write!(f, "processing"),
            ExpressionStatus::Solved => write!(f, "solved"),
            ExpressionStatus::Error(reason) => write!(f, "error: {reason}"),
        }
    }
}

impl FromStr for ExpressionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(ExpressionStatus::Processing),
            "solved" => Ok(ExpressionStatus::Solved),
            _ => s
                .strip_prefix("error: ")
                .map(|reason| ExpressionStatus::Error(reason.to_string()))
                .ok_or_else(|| format!("invalid expression status: {s}")),
        }
    }
}

impl From<ExpressionStatus> for String {
    fn from(status: ExpressionStatus) -> Self {
        status.to_string()
    }
}

impl TryFrom<String> for ExpressionStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, String> {
        value.parse()
    }
}

/// Read-only projection returned to submitters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionView {
    pub id: i64,
    pub status: ExpressionStatus,
    pub result: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_forms() {
        assert_eq!(ExpressionStatus::Processing.to_string(), "processing");
        assert_eq!(ExpressionStatus::Solved.to_string(), "solved");
        assert_eq!(
            ExpressionStatus::division_by_zero().to_string(),
            "error: division by zero"
        );
        assert_eq!(
            "error: division by zero".parse::<ExpressionStatus>().unwrap(),
            ExpressionStatus::division_by_zero()
        );
        assert!("done".parse::<ExpressionStatus>().is_err());
    }

    #[test]
    fn test_view_serializes_status_as_text() {
        let mut expression = Expression::new("2+2");
        expression.id = 7;
        expression.status = ExpressionStatus::Solved;
        expression.result = 4.0;

        let json = serde_json::to_value(expression.view()).unwrap();
        assert_eq!(json, serde_json::json!({"id": 7, "status": "solved", "result": 4.0}));
    }

    #[test]
    fn test_status_deserializes_from_text() {
        let status: ExpressionStatus =
            serde_json::from_value(serde_json::json!("error: division by zero")).unwrap();
        assert_eq!(status, ExpressionStatus::division_by_zero());
        assert_eq!(
            ExpressionStatus::try_from("solved".to_string()).unwrap(),
            ExpressionStatus::Solved
        );
        assert!(serde_json::from_value::<ExpressionStatus>(serde_json::json!("done")).is_err());
    }

    #[test]
    fn test_new_expression_is_processing() {
        let expression = Expression::new("1+1");
        assert!(expression.is_processing());
        assert!(!expression.status.is_terminal());
        assert!(expression.tree.is_none());
    }
}
