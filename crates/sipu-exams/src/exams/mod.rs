//! Exam seat allocation and grading.
//!
//! Candidates eligible for an exam session are placed into laboratory seats by a
//! deterministic allocator; the resulting set is swapped into storage as a whole and
//! later graded assignment by assignment.

pub mod allocator;
pub mod domain;
pub mod grading;
pub mod import;
pub mod memory;
pub mod repository;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use allocator::{AllocationError, SeatAllocator};
pub use domain::{
    AssignmentId, AssignmentStatus, Candidate, CandidateId, EnrollmentState, ExamId,
    ExamSession, ExamSessionRequest, ExamSessionStatus, Grade, Laboratory, LaboratoryId,
    SeatAssignment, SeatPlacement, Shift, SiteId, MAX_SCORE, MIN_SCORE,
};
pub use grading::{GradeSubmission, GradingError, GradingService, InvalidGrade};
pub use import::{CatalogImportError, CatalogImporter};
pub use memory::{InMemoryAssignments, InMemoryCatalog, InMemoryExamSessions, InMemoryRoster};
pub use repository::{
    AssignmentRepository, CandidateRoster, CapacityCatalog, ExamSessionRepository,
    RepositoryError,
};
pub use router::exam_router;
pub use service::{
    DistributionSummary, ExamAdministrationService, ExamResults, ExamServiceError,
    LaboratoryLoad,
};
pub use store::{select_current_assignment, AssignmentStore, AssignmentStoreError, ReplaceOutcome};

/// Facade wired to the in-memory collaborators.
pub type InMemoryExamService =
    ExamAdministrationService<InMemoryExamSessions, InMemoryRoster, InMemoryCatalog, InMemoryAssignments>;
