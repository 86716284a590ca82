pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::services::{
    assessment_service::AssessmentService, pg_store::PgAssessmentStore, store::AssessmentStore,
};
use axum::{
    routing::{get, patch, post},
    Router,
};
use chrono::FixedOffset;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub assessment_service: AssessmentService,
}

impl AppState {
    pub fn new(pool: PgPool) -> error::Result<Self> {
        let config = crate::config::get_config();
        let store = Arc::new(PgAssessmentStore::new(pool));
        Ok(Self::with_store(store, config.display_offset()?))
    }

    pub fn with_store(store: Arc<dyn AssessmentStore>, display_offset: FixedOffset) -> Self {
        Self {
            assessment_service: AssessmentService::new(store, display_offset),
        }
    }
}

/// Full HTTP surface: `/health` plus the bearer-protected, rate-limited `/assessments` API.
pub fn build_router(app_state: AppState, rps: u32) -> Router {
    let assessments_api = Router::new()
        .route("/assessments", get(routes::assessments::list_assessments))
        .route("/assessments/stats", get(routes::assessments::get_status_counts))
        .route("/assessments/:id", get(routes::assessments::get_assessment))
        .route(
            "/assessments/:id/activity",
            get(routes::assessments::get_assessment_activity),
        )
        .route(
            "/assessments/:id/evaluate",
            post(routes::assessments::evaluate_question),
        )
        .route(
            "/assessments/:id/feedback",
            post(routes::assessments::submit_feedback),
        )
        .route(
            "/assessments/:id/return",
            patch(routes::assessments::return_assessment),
        )
        .route(
            "/assessments/:id/status",
            patch(routes::assessments::update_status),
        )
        .layer(axum::middleware::from_fn_with_state(
            middleware::rate_limit::new_rps_state(rps),
            middleware::rate_limit::rps_middleware,
        ))
        .layer(axum::middleware::from_fn(
            middleware::auth::require_bearer_auth,
        ));

    Router::new()
        .route("/health", get(routes::health::health))
        .merge(assessments_api)
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
