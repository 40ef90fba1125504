use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{AssignmentId, AssignmentStatus, Grade, SeatAssignment, MAX_SCORE, MIN_SCORE};
use super::repository::{AssignmentRepository, RepositoryError};
use super::store::active_assignment;

const MAX_GRADE_ATTEMPTS: usize = 3;

/// Grade as submitted by an operator, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeSubmission {
    pub attended: bool,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub remarks: String,
}

impl GradeSubmission {
    /// Turns the submission into a storable grade. Scores of absent candidates are
    /// dropped without validation.
    pub fn validate(&self, graded_at: DateTime<Utc>) -> Result<Grade, InvalidGrade> {
        let score = if self.attended {
            let raw = self.score.ok_or(InvalidGrade::MissingScore)?;
            let score = u16::try_from(raw)
                .ok()
                .filter(|score| (MIN_SCORE..=MAX_SCORE).contains(score))
                .ok_or(InvalidGrade::ScoreOutOfRange { score: raw })?;
            Some(score)
        } else {
            None
        };

        Ok(Grade {
            attended: self.attended,
            score,
            remarks: self.remarks.trim().to_string(),
            graded_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidGrade {
    #[error("a score is required when the candidate attended")]
    MissingScore,
    #[error("score {score} is outside the 1..=1000 range")]
    ScoreOutOfRange { score: i64 },
}

/// Records attendance and scores against seat assignments.
pub struct GradingService<A> {
    repository: Arc<A>,
}

impl<A> GradingService<A>
where
    A: AssignmentRepository + 'static,
{
    pub fn new(repository: Arc<A>) -> Self {
        Self { repository }
    }

    /// Validates and stores a grade, overwriting any previous one.
    pub fn record_grade(
        &self,
        assignment_id: AssignmentId,
        submission: &GradeSubmission,
    ) -> Result<SeatAssignment, GradingError> {
        let grade = submission.validate(Utc::now())?;

        for attempt in 1..=MAX_GRADE_ATTEMPTS {
            let mut assignment = active_assignment(self.repository.as_ref(), assignment_id)?
                .ok_or(GradingError::AssignmentNotFound(assignment_id))?;
            let expected_revision = assignment.revision;

            assignment.status = AssignmentStatus::Graded;
            assignment.grade = Some(grade.clone());

            match self
                .repository
                .compare_and_swap(assignment, expected_revision)
            {
                Ok(stored) => return Ok(stored),
                Err(RepositoryError::StaleRevision { .. }) => {
                    debug!(%assignment_id, attempt, "grade write raced, retrying");
                }
                Err(RepositoryError::NotFound | RepositoryError::Superseded) => {
                    return Err(GradingError::AssignmentNotFound(assignment_id));
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(GradingError::ConcurrentModification(assignment_id))
    }
}

/// Error raised by the grading service.
#[derive(Debug, thiserror::Error)]
pub enum GradingError {
    #[error("invalid grade: {0}")]
    InvalidGrade(#[from] InvalidGrade),
    #[error("assignment {0} not found")]
    AssignmentNotFound(AssignmentId),
    #[error("assignment {0} kept changing while grading; retry")]
    ConcurrentModification(AssignmentId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
