use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use calc_core::SchedulerError;
use serde_json::json;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("malformed request: {0}")]
    BadRequest(String),

    #[error("invalid request body: {0}")]
    UnprocessableEntity(String),

    #[error("no task")]
    NoTask,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, String, &'static str) {
        match self {
            ApiError::Scheduler(SchedulerError::Validation(e)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, e.to_string(), e.code())
            }
            ApiError::Scheduler(e @ SchedulerError::ExpressionNotFound { .. }) => {
                (StatusCode::NOT_FOUND, e.user_message(), "EXPRESSION_NOT_FOUND")
            }
            ApiError::Scheduler(e @ SchedulerError::TaskNotFound { .. }) => {
                (StatusCode::NOT_FOUND, e.user_message(), "TASK_NOT_FOUND")
            }
            ApiError::Scheduler(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                e.user_message(),
                "INTERNAL_ERROR",
            ),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string(), "BAD_REQUEST"),
            ApiError::UnprocessableEntity(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                self.to_string(),
                "INVALID_BODY",
            ),
            ApiError::NoTask => (StatusCode::NOT_FOUND, self.to_string(), "NO_TASK"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, code) = self.parts();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        (status, Json(json!({ "error": message, "code": code }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use calc_core::CompileError;

    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ApiError::from(SchedulerError::Validation(CompileError::MismatchedBracket)),
                StatusCode::UNPROCESSABLE_ENTITY,
                "MISMATCHED_BRACKET",
            ),
            (
                ApiError::from(SchedulerError::expression_not_found(1)),
                StatusCode::NOT_FOUND,
                "EXPRESSION_NOT_FOUND",
            ),
            (
                ApiError::from(SchedulerError::task_not_found(1)),
                StatusCode::NOT_FOUND,
                "TASK_NOT_FOUND",
            ),
            (
                ApiError::from(SchedulerError::DatabaseOperation("disk full".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
            (ApiError::NoTask, StatusCode::NOT_FOUND, "NO_TASK"),
        ];

        for (error, status, code) in cases {
            let (actual_status, _, actual_code) = error.parts();
            assert_eq!(actual_status, status);
            assert_eq!(actual_code, code);
        }
    }

    #[test]
    fn test_storage_details_not_exposed() {
        let (_, message, _) =
            ApiError::from(SchedulerError::DatabaseOperation("disk full".to_string())).parts();
        assert_eq!(message, "internal server error");
    }
}
