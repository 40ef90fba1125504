//! In-memory collaborators used by the API service, the demo and the tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{
    AssignmentId, Candidate, CandidateId, ExamId, ExamSession, Laboratory, LaboratoryId,
    SeatAssignment,
};
use super::repository::{
    AssignmentRepository, CandidateRoster, CapacityCatalog, ExamSessionRepository,
    RepositoryError,
};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("in-memory store lock poisoned".to_string()))
}

#[derive(Default)]
struct SessionState {
    sequence: u64,
    sessions: BTreeMap<ExamId, ExamSession>,
}

#[derive(Default, Clone)]
pub struct InMemoryExamSessions {
    state: Arc<Mutex<SessionState>>,
}

impl ExamSessionRepository for InMemoryExamSessions {
    fn next_exam_id(&self) -> Result<ExamId, RepositoryError> {
        let mut guard = lock(&self.state)?;
        guard.sequence += 1;
        Ok(ExamId(format!("exam-{:06}", guard.sequence)))
    }

    fn insert(&self, session: ExamSession) -> Result<ExamSession, RepositoryError> {
        let mut guard = lock(&self.state)?;
        if guard.sessions.contains_key(&session.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    fn update(&self, session: ExamSession) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.state)?;
        match guard.sessions.get_mut(&session.id) {
            Some(slot) => {
                *slot = session;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &ExamId) -> Result<Option<ExamSession>, RepositoryError> {
        Ok(lock(&self.state)?.sessions.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<ExamSession>, RepositoryError> {
        Ok(lock(&self.state)?.sessions.values().cloned().collect())
    }
}

/// Candidate pool keyed by e-mail; re-registering a candidate replaces the record.
#[derive(Default, Clone)]
pub struct InMemoryRoster {
    candidates: Arc<Mutex<HashMap<CandidateId, Candidate>>>,
}

impl InMemoryRoster {
    pub fn with_candidates<I>(candidates: I) -> Self
    where
        I: IntoIterator<Item = Candidate>,
    {
        let roster = Self::default();
        if let Ok(mut guard) = roster.candidates.lock() {
            guard.extend(
                candidates
                    .into_iter()
                    .map(|candidate| (candidate.id.clone(), candidate)),
            );
        }
        roster
    }

    pub fn upsert(&self, candidate: Candidate) -> Result<(), RepositoryError> {
        lock(&self.candidates)?.insert(candidate.id.clone(), candidate);
        Ok(())
    }

    pub fn remove(&self, id: &CandidateId) -> Result<Option<Candidate>, RepositoryError> {
        Ok(lock(&self.candidates)?.remove(id))
    }
}

impl CandidateRoster for InMemoryRoster {
    fn eligible_candidates(
        &self,
        session: &ExamSession,
    ) -> Result<Vec<Candidate>, RepositoryError> {
        Ok(lock(&self.candidates)?
            .values()
            .filter(|candidate| candidate.is_eligible_for(session))
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryCatalog {
    laboratories: Arc<Mutex<BTreeMap<LaboratoryId, Laboratory>>>,
}

impl InMemoryCatalog {
    pub fn with_laboratories<I>(laboratories: I) -> Self
    where
        I: IntoIterator<Item = Laboratory>,
    {
        let catalog = Self::default();
        if let Ok(mut guard) = catalog.laboratories.lock() {
            guard.extend(
                laboratories
                    .into_iter()
                    .map(|laboratory| (laboratory.id.clone(), laboratory)),
            );
        }
        catalog
    }

    pub fn upsert(&self, laboratory: Laboratory) -> Result<(), RepositoryError> {
        lock(&self.laboratories)?.insert(laboratory.id.clone(), laboratory);
        Ok(())
    }
}

impl CapacityCatalog for InMemoryCatalog {
    fn laboratories(&self) -> Result<Vec<Laboratory>, RepositoryError> {
        Ok(lock(&self.laboratories)?.values().cloned().collect())
    }
}

#[derive(Default)]
struct AssignmentState {
    sequence: u64,
    rows: BTreeMap<AssignmentId, SeatAssignment>,
    active: HashMap<ExamId, u64>,
}

#[derive(Default, Clone)]
pub struct InMemoryAssignments {
    state: Arc<Mutex<AssignmentState>>,
}

impl InMemoryAssignments {
    /// Every stored row, including staged or superseded generations.
    pub fn row_count(&self) -> usize {
        self.state.lock().map(|guard| guard.rows.len()).unwrap_or(0)
    }
}

impl AssignmentRepository for InMemoryAssignments {
    fn next_assignment_id(&self) -> Result<AssignmentId, RepositoryError> {
        let mut guard = lock(&self.state)?;
        guard.sequence += 1;
        Ok(AssignmentId(guard.sequence))
    }

    fn insert(&self, assignment: SeatAssignment) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.state)?;
        if guard.rows.contains_key(&assignment.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.rows.insert(assignment.id, assignment);
        Ok(())
    }

    fn compare_and_swap(
        &self,
        mut assignment: SeatAssignment,
        expected_revision: u64,
    ) -> Result<SeatAssignment, RepositoryError> {
        let mut guard = lock(&self.state)?;
        let state = &mut *guard;
        let slot = state
            .rows
            .get_mut(&assignment.id)
            .ok_or(RepositoryError::NotFound)?;
        if state.active.get(&slot.exam_id) != Some(&slot.generation) {
            return Err(RepositoryError::Superseded);
        }
        if slot.revision != expected_revision {
            return Err(RepositoryError::StaleRevision {
                expected: expected_revision,
                actual: slot.revision,
            });
        }
        assignment.revision = expected_revision + 1;
        *slot = assignment.clone();
        Ok(assignment)
    }

    fn fetch(&self, id: AssignmentId) -> Result<Option<SeatAssignment>, RepositoryError> {
        Ok(lock(&self.state)?.rows.get(&id).cloned())
    }

    fn for_exam(&self, exam_id: &ExamId) -> Result<Vec<SeatAssignment>, RepositoryError> {
        Ok(lock(&self.state)?
            .rows
            .values()
            .filter(|row| &row.exam_id == exam_id)
            .cloned()
            .collect())
    }

    fn for_candidate(
        &self,
        candidate_id: &CandidateId,
    ) -> Result<Vec<SeatAssignment>, RepositoryError> {
        Ok(lock(&self.state)?
            .rows
            .values()
            .filter(|row| &row.candidate_id == candidate_id)
            .cloned()
            .collect())
    }

    fn active_generation(&self, exam_id: &ExamId) -> Result<Option<u64>, RepositoryError> {
        Ok(lock(&self.state)?.active.get(exam_id).copied())
    }

    fn activate_generation(
        &self,
        exam_id: &ExamId,
        generation: u64,
    ) -> Result<(), RepositoryError> {
        lock(&self.state)?.active.insert(exam_id.clone(), generation);
        Ok(())
    }

    fn delete_generation(
        &self,
        exam_id: &ExamId,
        generation: u64,
    ) -> Result<usize, RepositoryError> {
        let mut guard = lock(&self.state)?;
        let before = guard.rows.len();
        guard
            .rows
            .retain(|_, row| !(&row.exam_id == exam_id && row.generation == generation));
        Ok(before - guard.rows.len())
    }

    fn delete_other_generations(
        &self,
        exam_id: &ExamId,
        keep: u64,
    ) -> Result<usize, RepositoryError> {
        let mut guard = lock(&self.state)?;
        let before = guard.rows.len();
        guard
            .rows
            .retain(|_, row| &row.exam_id != exam_id || row.generation == keep);
        Ok(before - guard.rows.len())
    }
}
