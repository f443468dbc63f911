use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use calc_core::{TaskAssignment, TaskResultReport};

use crate::error::{ApiError, ApiResult};
use crate::routes::AppState;

/// `GET /internal/task`
pub async fn fetch_task(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let task = state
        .service
        .get_pending_task()
        .await?
        .ok_or(ApiError::NoTask)?;

    Ok(Json(TaskAssignment::from(&task)))
}

/// `POST /internal/task`
pub async fn submit_result(
    State(state): State<AppState>,
    body: Result<Json<TaskResultReport>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(report) = body.map_err(|e| ApiError::UnprocessableEntity(e.body_text()))?;

    state
        .service
        .process_incoming_task(report.id, report.result)
        .await?;

    Ok(StatusCode::OK)
}
