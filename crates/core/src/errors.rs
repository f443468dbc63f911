use thiserror::Error;

/// Syntax errors reported by the expression compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("invalid expression")]
    InvalidExpression,
    #[error("mismatched bracket")]
    MismatchedBracket,
    #[error("invalid operator placement")]
    InvalidOperatorPlacement,
    #[error("invalid symbols in expression")]
    InvalidSymbol,
}

impl CompileError {
    /// Stable machine-readable code used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::InvalidExpression => "INVALID_EXPRESSION",
            CompileError::MismatchedBracket => "MISMATCHED_BRACKET",
            CompileError::InvalidOperatorPlacement => "INVALID_OPERATOR_PLACEMENT",
            CompileError::InvalidSymbol => "INVALID_SYMBOL",
        }
    }
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("validation error: {0}")]
    Validation(#[from] CompileError),

    #[error("expression not found: {id}")]
    ExpressionNotFound { id: i64 },

    #[error("task not found: {id}")]
    TaskNotFound { id: i64 },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("database operation error: {0}")]
    DatabaseOperation(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("tree invariant violated: {0}")]
    TreeInvariant(String),

    #[error("network error: {0}")]
    Network(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

impl SchedulerError {
    pub fn database_error<S: Into<String>>(msg: S) -> Self {
        Self::DatabaseOperation(msg.into())
    }

    pub fn expression_not_found(id: i64) -> Self {
        Self::ExpressionNotFound { id }
    }

    pub fn task_not_found(id: i64) -> Self {
        Self::TaskNotFound { id }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SchedulerError::ExpressionNotFound { .. } | SchedulerError::TaskNotFound { .. }
        )
    }

    /// Storage and infrastructure failures, as opposed to caller mistakes.
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            SchedulerError::Database(_)
                | SchedulerError::DatabaseOperation(_)
                | SchedulerError::Serialization(_)
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SchedulerError::Database(_)
                | SchedulerError::DatabaseOperation(_)
                | SchedulerError::Network(_)
        )
    }

    pub fn user_message(&self) -> String {
        match self {
            SchedulerError::Validation(kind) => kind.to_string(),
            SchedulerError::ExpressionNotFound { .. } => "expression not found".to_string(),
            SchedulerError::TaskNotFound { .. } => "task not found".to_string(),
            _ => "internal server error".to_string(),
        }
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        SchedulerError::Serialization(err.to_string())
    }
}
