use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveTime;
use serde::Serialize;
use tracing::info;

use super::allocator::{AllocationError, SeatAllocator};
use super::domain::{
    AssignmentId, CandidateId, ExamId, ExamSession, ExamSessionRequest, ExamSessionStatus,
    Laboratory, LaboratoryId, SeatAssignment, SiteId,
};
use super::grading::{GradeSubmission, GradingError, GradingService};
use super::repository::{
    AssignmentRepository, CandidateRoster, CapacityCatalog, ExamSessionRepository,
    RepositoryError,
};
use super::store::{AssignmentStore, AssignmentStoreError};

/// Facade exposing exam administration to the route layer.
pub struct ExamAdministrationService<S, R, C, A> {
    sessions: Arc<S>,
    roster: Arc<R>,
    catalog: Arc<C>,
    allocator: SeatAllocator,
    store: AssignmentStore<A>,
    grading: GradingService<A>,
}

/// Seat usage of one laboratory after a distribution run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaboratoryLoad {
    pub laboratory_id: LaboratoryId,
    pub site_id: SiteId,
    pub capacity: u32,
    pub seats_used: u32,
}

/// Operator-facing outcome of `distribute_seats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistributionSummary {
    pub exam_id: ExamId,
    pub candidates_assigned: usize,
    pub seats_available: u64,
    pub previous_assignments_discarded: usize,
    pub laboratories: Vec<LaboratoryLoad>,
}

/// Attendance and score overview for an exam session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamResults {
    pub exam_id: ExamId,
    pub total: usize,
    pub graded: usize,
    pub attended: usize,
    pub absent: usize,
    pub pending: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highest_score: Option<u16>,
}

impl ExamResults {
    fn from_assignments(exam_id: ExamId, assignments: &[SeatAssignment]) -> Self {
        let graded: Vec<&SeatAssignment> = assignments
            .iter()
            .filter(|assignment| assignment.is_graded())
            .collect();
        let scores: Vec<u16> = graded
            .iter()
            .filter_map(|assignment| assignment.usable_score())
            .collect();
        let attended = graded
            .iter()
            .filter(|assignment| assignment.grade.as_ref().is_some_and(|grade| grade.attended))
            .count();

        let average_score = if scores.is_empty() {
            None
        } else {
            let sum: u64 = scores.iter().map(|score| u64::from(*score)).sum();
            Some(sum as f64 / scores.len() as f64)
        };

        Self {
            exam_id,
            total: assignments.len(),
            graded: graded.len(),
            attended,
            absent: graded.len() - attended,
            pending: assignments.len() - graded.len(),
            average_score,
            highest_score: scores.iter().copied().max(),
        }
    }
}

impl<S, R, C, A> ExamAdministrationService<S, R, C, A>
where
    S: ExamSessionRepository + 'static,
    R: CandidateRoster + 'static,
    C: CapacityCatalog + 'static,
    A: AssignmentRepository + 'static,
{
    pub fn new(sessions: Arc<S>, roster: Arc<R>, catalog: Arc<C>, assignments: Arc<A>) -> Self {
        Self {
            sessions,
            roster,
            catalog,
            allocator: SeatAllocator,
            store: AssignmentStore::new(assignments.clone()),
            grading: GradingService::new(assignments),
        }
    }

    /// Opens a new active exam session.
    pub fn create_exam_session(
        &self,
        request: ExamSessionRequest,
    ) -> Result<ExamSession, ExamServiceError> {
        if request.start_time >= request.end_time {
            return Err(ExamServiceError::InvalidSchedule {
                start_time: request.start_time,
                end_time: request.end_time,
            });
        }

        let session = ExamSession {
            id: self.sessions.next_exam_id()?,
            period: request.period,
            program: request.program,
            shift: request.shift,
            date: request.date,
            start_time: request.start_time,
            end_time: request.end_time,
            status: ExamSessionStatus::Active,
        };

        let stored = self.sessions.insert(session)?;
        info!(exam_id = %stored.id, period = %stored.period, program = %stored.program, "exam session created");
        Ok(stored)
    }

    pub fn exam_session(&self, exam_id: &ExamId) -> Result<ExamSession, ExamServiceError> {
        self.sessions
            .fetch(exam_id)?
            .ok_or_else(|| ExamServiceError::ExamNotFound(exam_id.clone()))
    }

    pub fn exam_sessions(&self) -> Result<Vec<ExamSession>, ExamServiceError> {
        Ok(self.sessions.list()?)
    }

    /// Closes a session; closed sessions keep their assignments but can no longer be
    /// redistributed.
    pub fn close_exam_session(&self, exam_id: &ExamId) -> Result<ExamSession, ExamServiceError> {
        let mut session = self.exam_session(exam_id)?;
        if session.status == ExamSessionStatus::Closed {
            return Ok(session);
        }
        session.status = ExamSessionStatus::Closed;
        self.sessions.update(session.clone())?;
        info!(%exam_id, "exam session closed");
        Ok(session)
    }

    /// Allocates every eligible candidate a seat and replaces the stored set.
    pub fn distribute_seats(
        &self,
        exam_id: &ExamId,
    ) -> Result<DistributionSummary, ExamServiceError> {
        let session = self.exam_session(exam_id)?;
        if !session.is_active() {
            return Err(ExamServiceError::ExamClosed(exam_id.clone()));
        }

        let candidates = self.roster.eligible_candidates(&session)?;
        if candidates.is_empty() {
            return Err(ExamServiceError::NoEligibleCandidates(exam_id.clone()));
        }

        let laboratories = self.catalog.laboratories()?;
        let placements = self.allocator.allocate(&candidates, &laboratories)?;
        let outcome = self.store.replace_assignments(exam_id, placements)?;
        let assignments = self.store.assignments_for_exam(exam_id)?;

        let summary = DistributionSummary {
            exam_id: exam_id.clone(),
            candidates_assigned: outcome.inserted,
            seats_available: super::allocator::total_capacity(&laboratories),
            previous_assignments_discarded: outcome.discarded,
            laboratories: laboratory_loads(&laboratories, &assignments),
        };

        info!(
            %exam_id,
            assigned = summary.candidates_assigned,
            discarded = summary.previous_assignments_discarded,
            generation = outcome.generation,
            "seats distributed"
        );
        Ok(summary)
    }

    pub fn assignments_for_exam(
        &self,
        exam_id: &ExamId,
    ) -> Result<Vec<SeatAssignment>, ExamServiceError> {
        self.exam_session(exam_id)?;
        Ok(self.store.assignments_for_exam(exam_id)?)
    }

    pub fn assignment_for_candidate(
        &self,
        candidate_id: &CandidateId,
    ) -> Result<Option<SeatAssignment>, ExamServiceError> {
        Ok(self.store.assignment_for_candidate(candidate_id)?)
    }

    pub fn record_grade(
        &self,
        assignment_id: AssignmentId,
        submission: &GradeSubmission,
    ) -> Result<SeatAssignment, ExamServiceError> {
        let stored = self.grading.record_grade(assignment_id, submission)?;
        info!(%assignment_id, exam_id = %stored.exam_id, attended = submission.attended, "grade recorded");
        Ok(stored)
    }

    pub fn exam_results(&self, exam_id: &ExamId) -> Result<ExamResults, ExamServiceError> {
        let assignments = self.assignments_for_exam(exam_id)?;
        Ok(ExamResults::from_assignments(exam_id.clone(), &assignments))
    }

    pub fn laboratories(&self, site_id: Option<&SiteId>) -> Result<Vec<Laboratory>, ExamServiceError> {
        let laboratories = match site_id {
            Some(site_id) => self.catalog.laboratories_for_site(site_id)?,
            None => self.catalog.laboratories()?,
        };
        Ok(laboratories)
    }
}

fn laboratory_loads(
    laboratories: &[Laboratory],
    assignments: &[SeatAssignment],
) -> Vec<LaboratoryLoad> {
    let mut used: BTreeMap<&LaboratoryId, u32> = BTreeMap::new();
    for assignment in assignments {
        *used.entry(&assignment.laboratory_id).or_default() += 1;
    }

    let mut loads: Vec<LaboratoryLoad> = laboratories
        .iter()
        .map(|laboratory| LaboratoryLoad {
            laboratory_id: laboratory.id.clone(),
            site_id: laboratory.site_id.clone(),
            capacity: laboratory.capacity,
            seats_used: used.get(&laboratory.id).copied().unwrap_or(0),
        })
        .collect();
    loads.sort_by(|left, right| left.laboratory_id.cmp(&right.laboratory_id));
    loads
}

/// Error raised by the exam administration facade.
#[derive(Debug, thiserror::Error)]
pub enum ExamServiceError {
    #[error("exam session {0} not found")]
    ExamNotFound(ExamId),
    #[error("exam session {0} is closed")]
    ExamClosed(ExamId),
    #[error("exam session must start before it ends ({start_time} >= {end_time})")]
    InvalidSchedule {
        start_time: NaiveTime,
        end_time: NaiveTime,
    },
    #[error("no eligible candidates to distribute for exam session {0}")]
    NoEligibleCandidates(ExamId),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error(transparent)]
    Store(#[from] AssignmentStoreError),
    #[error(transparent)]
    Grading(#[from] GradingError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
