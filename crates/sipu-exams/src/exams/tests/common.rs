use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::response::Response;
use chrono::{NaiveDate, NaiveTime};
use serde_json::Value;

use crate::exams::domain::{
    AssignmentId, Candidate, CandidateId, EnrollmentState, ExamId, ExamSessionRequest,
    Laboratory, LaboratoryId, SeatAssignment, SeatPlacement, Shift, SiteId,
};
use crate::exams::memory::{
    InMemoryAssignments, InMemoryCatalog, InMemoryExamSessions, InMemoryRoster,
};
use crate::exams::repository::{AssignmentRepository, RepositoryError};
use crate::exams::service::ExamAdministrationService;

pub(super) const PERIOD: &str = "2025-1";
pub(super) const PROGRAM: &str = "is";

pub(super) fn laboratory(id: &str, site: &str, capacity: u32) -> Laboratory {
    Laboratory {
        id: LaboratoryId(id.to_string()),
        site_id: SiteId(site.to_string()),
        name: format!("Laboratorio {id}"),
        capacity,
    }
}

/// Three laboratories with capacities [2, 2, 1].
pub(super) fn scenario_laboratories() -> Vec<Laboratory> {
    vec![
        laboratory("lab-1", "principal", 2),
        laboratory("lab-2", "principal", 2),
        laboratory("lab-3", "norte", 1),
    ]
}

pub(super) fn candidate(index: usize) -> Candidate {
    Candidate {
        id: CandidateId(format!("c{index}@sipu.edu")),
        name: format!("Candidate {index}"),
        national_id: format!("{:010}", index),
        period: PERIOD.to_string(),
        program: PROGRAM.to_string(),
        shift: Shift::Morning,
        state: EnrollmentState::Enrolled,
    }
}

pub(super) fn candidates(count: usize) -> Vec<Candidate> {
    (1..=count).map(candidate).collect()
}

pub(super) fn candidate_id(index: usize) -> CandidateId {
    CandidateId(format!("c{index}@sipu.edu"))
}

pub(super) fn lab_id(id: &str) -> LaboratoryId {
    LaboratoryId(id.to_string())
}

pub(super) fn session_request() -> ExamSessionRequest {
    ExamSessionRequest {
        period: PERIOD.to_string(),
        program: PROGRAM.to_string(),
        shift: Shift::Morning,
        date: NaiveDate::from_ymd_opt(2025, 3, 15).expect("valid date"),
        start_time: NaiveTime::from_hms_opt(8, 0, 0).expect("valid time"),
        end_time: NaiveTime::from_hms_opt(10, 0, 0).expect("valid time"),
    }
}

pub(super) fn placement(candidate: usize, laboratory: &str, seat_number: u32) -> SeatPlacement {
    SeatPlacement {
        candidate_id: candidate_id(candidate),
        laboratory_id: lab_id(laboratory),
        site_id: SiteId("principal".to_string()),
        seat_number,
    }
}

pub(super) type MemoryService = ExamAdministrationService<
    InMemoryExamSessions,
    InMemoryRoster,
    InMemoryCatalog,
    InMemoryAssignments,
>;

pub(super) struct Harness {
    pub(super) service: MemoryService,
    pub(super) roster: Arc<InMemoryRoster>,
    pub(super) catalog: Arc<InMemoryCatalog>,
    pub(super) assignments: Arc<InMemoryAssignments>,
}

pub(super) fn harness(candidate_count: usize, laboratories: Vec<Laboratory>) -> Harness {
    let sessions = Arc::new(InMemoryExamSessions::default());
    let roster = Arc::new(InMemoryRoster::with_candidates(candidates(candidate_count)));
    let catalog = Arc::new(InMemoryCatalog::with_laboratories(laboratories));
    let assignments = Arc::new(InMemoryAssignments::default());
    let service = ExamAdministrationService::new(
        sessions,
        roster.clone(),
        catalog.clone(),
        assignments.clone(),
    );
    Harness {
        service,
        roster,
        catalog,
        assignments,
    }
}

pub(super) fn created_exam(harness: &Harness) -> ExamId {
    harness
        .service
        .create_exam_session(session_request())
        .expect("session created")
        .id
}

pub(super) fn seat_map(assignments: &[SeatAssignment]) -> Vec<(CandidateId, LaboratoryId, u32)> {
    assignments
        .iter()
        .map(|assignment| {
            (
                assignment.candidate_id.clone(),
                assignment.laboratory_id.clone(),
                assignment.seat_number,
            )
        })
        .collect()
}

/// Delegates to an in-memory store while injecting failures on demand.
#[derive(Default)]
pub(super) struct FlakyAssignments {
    pub(super) inner: InMemoryAssignments,
    /// Inserts allowed before every further insert fails; `usize::MAX` disables.
    pub(super) inserts_before_failure: AtomicUsize,
    pub(super) fail_activation: AtomicBool,
    pub(super) fail_purge: AtomicBool,
    /// Number of compare-and-swap calls that report a stale revision before succeeding.
    pub(super) stale_writes: AtomicUsize,
    /// Activates the next generation of the row's exam right before the next
    /// compare-and-swap, as a redistribution landing mid-grade would.
    pub(super) supersede_before_write: AtomicBool,
}

impl FlakyAssignments {
    pub(super) fn healthy() -> Self {
        let flaky = Self::default();
        flaky
            .inserts_before_failure
            .store(usize::MAX, Ordering::SeqCst);
        flaky
    }

    fn offline() -> RepositoryError {
        RepositoryError::Unavailable("database offline".to_string())
    }
}

impl AssignmentRepository for FlakyAssignments {
    fn next_assignment_id(&self) -> Result<AssignmentId, RepositoryError> {
        self.inner.next_assignment_id()
    }

    fn insert(&self, assignment: SeatAssignment) -> Result<(), RepositoryError> {
        let remaining = self.inserts_before_failure.load(Ordering::SeqCst);
        if remaining == 0 {
            return Err(Self::offline());
        }
        if remaining != usize::MAX {
            self.inserts_before_failure
                .store(remaining - 1, Ordering::SeqCst);
        }
        self.inner.insert(assignment)
    }

    fn compare_and_swap(
        &self,
        assignment: SeatAssignment,
        expected_revision: u64,
    ) -> Result<SeatAssignment, RepositoryError> {
        if self.supersede_before_write.swap(false, Ordering::SeqCst) {
            self.inner
                .activate_generation(&assignment.exam_id, assignment.generation + 1)?;
        }
        let stale = self.stale_writes.load(Ordering::SeqCst);
        if stale > 0 {
            self.stale_writes.store(stale - 1, Ordering::SeqCst);
            return Err(RepositoryError::StaleRevision {
                expected: expected_revision,
                actual: expected_revision + 1,
            });
        }
        self.inner.compare_and_swap(assignment, expected_revision)
    }

    fn fetch(&self, id: AssignmentId) -> Result<Option<SeatAssignment>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn for_exam(&self, exam_id: &ExamId) -> Result<Vec<SeatAssignment>, RepositoryError> {
        self.inner.for_exam(exam_id)
    }

    fn for_candidate(
        &self,
        candidate_id: &CandidateId,
    ) -> Result<Vec<SeatAssignment>, RepositoryError> {
        self.inner.for_candidate(candidate_id)
    }

    fn active_generation(&self, exam_id: &ExamId) -> Result<Option<u64>, RepositoryError> {
        self.inner.active_generation(exam_id)
    }

    fn activate_generation(
        &self,
        exam_id: &ExamId,
        generation: u64,
    ) -> Result<(), RepositoryError> {
        if self.fail_activation.load(Ordering::SeqCst) {
            return Err(Self::offline());
        }
        self.inner.activate_generation(exam_id, generation)
    }

    fn delete_generation(
        &self,
        exam_id: &ExamId,
        generation: u64,
    ) -> Result<usize, RepositoryError> {
        self.inner.delete_generation(exam_id, generation)
    }

    fn delete_other_generations(
        &self,
        exam_id: &ExamId,
        keep: u64,
    ) -> Result<usize, RepositoryError> {
        if self.fail_purge.load(Ordering::SeqCst) {
            return Err(Self::offline());
        }
        self.inner.delete_other_generations(exam_id, keep)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
