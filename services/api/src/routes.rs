use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde_json::json;
use sipu_exams::exams::{
    exam_router, AssignmentRepository, CandidateRoster, CapacityCatalog,
    ExamAdministrationService, ExamSessionRepository,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;

pub(crate) fn with_exam_routes<S, R, C, A>(
    service: Arc<ExamAdministrationService<S, R, C, A>>,
) -> axum::Router
where
    S: ExamSessionRepository + 'static,
    R: CandidateRoster + 'static,
    C: CapacityCatalog + 'static,
    A: AssignmentRepository + 'static,
{
    exam_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
