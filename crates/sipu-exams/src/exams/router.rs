use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::allocator::AllocationError;
use super::domain::{AssignmentId, CandidateId, ExamId, ExamSessionRequest, SiteId};
use super::grading::{GradeSubmission, GradingError};
use super::repository::{
    AssignmentRepository, CandidateRoster, CapacityCatalog, ExamSessionRepository,
    RepositoryError,
};
use super::service::{ExamAdministrationService, ExamServiceError};
use super::store::AssignmentStoreError;

type SharedService<S, R, C, A> = Arc<ExamAdministrationService<S, R, C, A>>;

/// Router builder exposing exam administration endpoints.
pub fn exam_router<S, R, C, A>(service: SharedService<S, R, C, A>) -> Router
where
    S: ExamSessionRepository + 'static,
    R: CandidateRoster + 'static,
    C: CapacityCatalog + 'static,
    A: AssignmentRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/exams",
            post(create_exam_handler::<S, R, C, A>).get(list_exams_handler::<S, R, C, A>),
        )
        .route("/api/v1/exams/:exam_id", get(exam_handler::<S, R, C, A>))
        .route(
            "/api/v1/exams/:exam_id/close",
            post(close_exam_handler::<S, R, C, A>),
        )
        .route(
            "/api/v1/exams/:exam_id/distribution",
            post(distribute_handler::<S, R, C, A>),
        )
        .route(
            "/api/v1/exams/:exam_id/assignments",
            get(exam_assignments_handler::<S, R, C, A>),
        )
        .route(
            "/api/v1/exams/:exam_id/results",
            get(exam_results_handler::<S, R, C, A>),
        )
        .route(
            "/api/v1/candidates/:candidate_id/assignment",
            get(candidate_assignment_handler::<S, R, C, A>),
        )
        .route(
            "/api/v1/assignments/:assignment_id/grade",
            put(grade_handler::<S, R, C, A>),
        )
        .route(
            "/api/v1/laboratories",
            get(laboratories_handler::<S, R, C, A>),
        )
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LaboratoryFilter {
    #[serde(default)]
    site_id: Option<String>,
}

pub(crate) async fn create_exam_handler<S, R, C, A>(
    State(service): State<SharedService<S, R, C, A>>,
    axum::Json(request): axum::Json<ExamSessionRequest>,
) -> Response
where
    S: ExamSessionRepository + 'static,
    R: CandidateRoster + 'static,
    C: CapacityCatalog + 'static,
    A: AssignmentRepository + 'static,
{
    match service.create_exam_session(request) {
        Ok(session) => (StatusCode::CREATED, axum::Json(session)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_exams_handler<S, R, C, A>(
    State(service): State<SharedService<S, R, C, A>>,
) -> Response
where
    S: ExamSessionRepository + 'static,
    R: CandidateRoster + 'static,
    C: CapacityCatalog + 'static,
    A: AssignmentRepository + 'static,
{
    match service.exam_sessions() {
        Ok(sessions) => (StatusCode::OK, axum::Json(sessions)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn exam_handler<S, R, C, A>(
    State(service): State<SharedService<S, R, C, A>>,
    Path(exam_id): Path<String>,
) -> Response
where
    S: ExamSessionRepository + 'static,
    R: CandidateRoster + 'static,
    C: CapacityCatalog + 'static,
    A: AssignmentRepository + 'static,
{
    match service.exam_session(&ExamId(exam_id)) {
        Ok(session) => (StatusCode::OK, axum::Json(session)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn close_exam_handler<S, R, C, A>(
    State(service): State<SharedService<S, R, C, A>>,
    Path(exam_id): Path<String>,
) -> Response
where
    S: ExamSessionRepository + 'static,
    R: CandidateRoster + 'static,
    C: CapacityCatalog + 'static,
    A: AssignmentRepository + 'static,
{
    match service.close_exam_session(&ExamId(exam_id)) {
        Ok(session) => (StatusCode::OK, axum::Json(session)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn distribute_handler<S, R, C, A>(
    State(service): State<SharedService<S, R, C, A>>,
    Path(exam_id): Path<String>,
) -> Response
where
    S: ExamSessionRepository + 'static,
    R: CandidateRoster + 'static,
    C: CapacityCatalog + 'static,
    A: AssignmentRepository + 'static,
{
    match service.distribute_seats(&ExamId(exam_id)) {
        Ok(summary) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn exam_assignments_handler<S, R, C, A>(
    State(service): State<SharedService<S, R, C, A>>,
    Path(exam_id): Path<String>,
) -> Response
where
    S: ExamSessionRepository + 'static,
    R: CandidateRoster + 'static,
    C: CapacityCatalog + 'static,
    A: AssignmentRepository + 'static,
{
    match service.assignments_for_exam(&ExamId(exam_id)) {
        Ok(assignments) => (StatusCode::OK, axum::Json(assignments)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn exam_results_handler<S, R, C, A>(
    State(service): State<SharedService<S, R, C, A>>,
    Path(exam_id): Path<String>,
) -> Response
where
    S: ExamSessionRepository + 'static,
    R: CandidateRoster + 'static,
    C: CapacityCatalog + 'static,
    A: AssignmentRepository + 'static,
{
    match service.exam_results(&ExamId(exam_id)) {
        Ok(results) => (StatusCode::OK, axum::Json(results)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn candidate_assignment_handler<S, R, C, A>(
    State(service): State<SharedService<S, R, C, A>>,
    Path(candidate_id): Path<String>,
) -> Response
where
    S: ExamSessionRepository + 'static,
    R: CandidateRoster + 'static,
    C: CapacityCatalog + 'static,
    A: AssignmentRepository + 'static,
{
    let id = CandidateId(candidate_id);
    match service.assignment_for_candidate(&id) {
        Ok(Some(assignment)) => (StatusCode::OK, axum::Json(assignment)).into_response(),
        Ok(None) => {
            let payload = json!({
                "candidate_id": id.0,
                "error": "candidate has no seat assignment",
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn grade_handler<S, R, C, A>(
    State(service): State<SharedService<S, R, C, A>>,
    Path(assignment_id): Path<u64>,
    axum::Json(submission): axum::Json<GradeSubmission>,
) -> Response
where
    S: ExamSessionRepository + 'static,
    R: CandidateRoster + 'static,
    C: CapacityCatalog + 'static,
    A: AssignmentRepository + 'static,
{
    match service.record_grade(AssignmentId(assignment_id), &submission) {
        Ok(assignment) => (StatusCode::OK, axum::Json(assignment)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn laboratories_handler<S, R, C, A>(
    State(service): State<SharedService<S, R, C, A>>,
    Query(filter): Query<LaboratoryFilter>,
) -> Response
where
    S: ExamSessionRepository + 'static,
    R: CandidateRoster + 'static,
    C: CapacityCatalog + 'static,
    A: AssignmentRepository + 'static,
{
    let site_id = filter.site_id.map(SiteId);
    match service.laboratories(site_id.as_ref()) {
        Ok(laboratories) => (StatusCode::OK, axum::Json(laboratories)).into_response(),
        Err(error) => error_response(error),
    }
}

pub fn status_for(error: &ExamServiceError) -> StatusCode {
    match error {
        ExamServiceError::ExamNotFound(_)
        | ExamServiceError::Grading(GradingError::AssignmentNotFound(_)) => StatusCode::NOT_FOUND,
        ExamServiceError::ExamClosed(_)
        | ExamServiceError::Allocation(AllocationError::InsufficientCapacity { .. })
        | ExamServiceError::Grading(GradingError::ConcurrentModification(_)) => {
            StatusCode::CONFLICT
        }
        ExamServiceError::InvalidSchedule { .. }
        | ExamServiceError::NoEligibleCandidates(_)
        | ExamServiceError::Grading(GradingError::InvalidGrade(_)) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ExamServiceError::Allocation(AllocationError::NoLaboratoriesConfigured) => {
            StatusCode::PRECONDITION_FAILED
        }
        ExamServiceError::Repository(RepositoryError::Unavailable(_))
        | ExamServiceError::Store(AssignmentStoreError::Storage(RepositoryError::Unavailable(_)))
        | ExamServiceError::Grading(GradingError::Repository(RepositoryError::Unavailable(_))) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn error_response(error: ExamServiceError) -> Response {
    let status = status_for(&error);
    let payload = match &error {
        ExamServiceError::Allocation(AllocationError::InsufficientCapacity {
            required,
            available,
        }) => json!({
            "error": error.to_string(),
            "required": required,
            "available": available,
        }),
        _ => json!({ "error": error.to_string() }),
    };
    (status, axum::Json(payload)).into_response()
}
