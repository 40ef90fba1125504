use super::domain::{
    AssignmentId, Candidate, CandidateId, ExamId, ExamSession, Laboratory, SeatAssignment, SiteId,
};

/// Storage abstraction for exam session records.
pub trait ExamSessionRepository: Send + Sync {
    fn next_exam_id(&self) -> Result<ExamId, RepositoryError>;
    fn insert(&self, session: ExamSession) -> Result<ExamSession, RepositoryError>;
    fn update(&self, session: ExamSession) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ExamId) -> Result<Option<ExamSession>, RepositoryError>;
    fn list(&self) -> Result<Vec<ExamSession>, RepositoryError>;
}

/// Read-only selection of the candidates who may sit a session.
pub trait CandidateRoster: Send + Sync {
    /// Ordering is unspecified; callers impose their own.
    fn eligible_candidates(&self, session: &ExamSession) -> Result<Vec<Candidate>, RepositoryError>;
}

/// Read-only view over the laboratory catalog.
pub trait CapacityCatalog: Send + Sync {
    /// Every laboratory, sorted by id.
    fn laboratories(&self) -> Result<Vec<Laboratory>, RepositoryError>;

    fn laboratories_for_site(&self, site_id: &SiteId) -> Result<Vec<Laboratory>, RepositoryError> {
        Ok(self
            .laboratories()?
            .into_iter()
            .filter(|laboratory| &laboratory.site_id == site_id)
            .collect())
    }
}

/// Storage primitives behind the assignment store and grading service.
///
/// Rows of an exam are partitioned by `generation`; readers only trust the
/// generation recorded through [`AssignmentRepository::activate_generation`].
pub trait AssignmentRepository: Send + Sync {
    fn next_assignment_id(&self) -> Result<AssignmentId, RepositoryError>;
    fn insert(&self, assignment: SeatAssignment) -> Result<(), RepositoryError>;
    /// Writes `assignment` only if the stored revision still equals `expected_revision`
    /// and the stored row is still in its exam's active generation. Both checks and the
    /// write are one atomic step. The stored copy receives `expected_revision + 1`.
    fn compare_and_swap(
        &self,
        assignment: SeatAssignment,
        expected_revision: u64,
    ) -> Result<SeatAssignment, RepositoryError>;
    fn fetch(&self, id: AssignmentId) -> Result<Option<SeatAssignment>, RepositoryError>;
    /// All rows of the exam regardless of generation.
    fn for_exam(&self, exam_id: &ExamId) -> Result<Vec<SeatAssignment>, RepositoryError>;
    /// All rows of the candidate regardless of generation.
    fn for_candidate(
        &self,
        candidate_id: &CandidateId,
    ) -> Result<Vec<SeatAssignment>, RepositoryError>;
    fn active_generation(&self, exam_id: &ExamId) -> Result<Option<u64>, RepositoryError>;
    fn activate_generation(&self, exam_id: &ExamId, generation: u64)
        -> Result<(), RepositoryError>;
    fn delete_generation(&self, exam_id: &ExamId, generation: u64)
        -> Result<usize, RepositoryError>;
    /// Removes every row of the exam outside `keep`, returning the number removed.
    fn delete_other_generations(
        &self,
        exam_id: &ExamId,
        keep: u64,
    ) -> Result<usize, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("record belongs to a superseded assignment set")]
    Superseded,
    #[error("record changed concurrently (expected revision {expected}, found {actual})")]
    StaleRevision { expected: u64, actual: u64 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
