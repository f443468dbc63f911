use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use calc_core::ExpressionView;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct CalculateRequest {
    pub expression: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CalculateResponse {
    pub id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExpressionListResponse {
    pub expressions: Vec<ExpressionView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExpressionResponse {
    pub expression: ExpressionView,
}

/// `POST /api/v1/calculate`
pub async fn calculate(
    State(state): State<AppState>,
    body: Result<Json<CalculateRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let id = state.service.process_expression(&request.expression).await?;
    info!(expression_id = id, "expression submitted");

    Ok((StatusCode::CREATED, Json(CalculateResponse { id })))
}

/// `GET /api/v1/expressions`
pub async fn list_expressions(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let expressions = state
        .service
        .get_expressions()
        .await?
        .iter()
        .map(|expression| expression.view())
        .collect();

    Ok(Json(ExpressionListResponse { expressions }))
}

/// `GET /api/v1/expressions/{id}`
pub async fn get_expression(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = id.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let expression = state.service.get_expression_by_id(id).await?;

    Ok(Json(ExpressionResponse {
        expression: expression.view(),
    }))
}
