use std::sync::Arc;

use axum::{routing::get, routing::post, Router};
use calc_core::config::ApiConfig;
use calc_dispatcher::ExpressionService;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{
    expressions::{calculate, get_expression, list_expressions},
    health::health_check,
    tasks::{fetch_task, submit_result},
};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ExpressionService>,
}

impl AppState {
    pub fn new(service: Arc<ExpressionService>) -> Self {
        Self { service }
    }
}

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/calculate", post(calculate))
        .route("/api/v1/expressions", get(list_expressions))
        .route("/api/v1/expressions/{id}", get(get_expression))
        .route("/internal/task", get(fetch_task).post(submit_result))
        .with_state(state)
}

/// Routes plus request tracing and, when enabled, permissive CORS.
pub fn create_app(state: AppState, config: &ApiConfig) -> Router {
    let router = create_routes(state).layer(TraceLayer::new_for_http());
    if config.cors_enabled {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
