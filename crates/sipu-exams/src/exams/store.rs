use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, warn};

use super::domain::{
    AssignmentId, CandidateId, ExamId, LaboratoryId, SeatAssignment, SeatPlacement,
};
use super::repository::{AssignmentRepository, RepositoryError};

/// Persists whole assignment sets per exam and answers lookups over the active set.
pub struct AssignmentStore<A> {
    repository: Arc<A>,
    exam_locks: Mutex<HashMap<ExamId, Arc<Mutex<()>>>>,
}

/// Result of a successful replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplaceOutcome {
    pub inserted: usize,
    pub discarded: usize,
    pub generation: u64,
}

impl<A> AssignmentStore<A>
where
    A: AssignmentRepository + 'static,
{
    pub fn new(repository: Arc<A>) -> Self {
        Self {
            repository,
            exam_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Swaps the assignment set of `exam_id` for `placements`.
    ///
    /// New rows are staged under a fresh generation and only become visible once
    /// the exam's active generation is flipped; older generations are purged last.
    /// Calls for the same exam are serialized.
    pub fn replace_assignments(
        &self,
        exam_id: &ExamId,
        placements: Vec<SeatPlacement>,
    ) -> Result<ReplaceOutcome, AssignmentStoreError> {
        validate_placements(&placements)?;

        let lock = self.exam_lock(exam_id);
        let outcome = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.swap_generation(exam_id, placements)
        };
        self.release_exam_lock(exam_id, lock);
        outcome
    }

    fn swap_generation(
        &self,
        exam_id: &ExamId,
        placements: Vec<SeatPlacement>,
    ) -> Result<ReplaceOutcome, AssignmentStoreError> {
        let existing = self.repository.for_exam(exam_id)?;
        let active = self.repository.active_generation(exam_id)?;
        let generation = existing
            .iter()
            .map(|assignment| assignment.generation)
            .chain(active)
            .max()
            .unwrap_or(0)
            + 1;

        let inserted = placements.len();
        if let Err(error) = self.stage(exam_id, generation, placements) {
            self.discard_staged(exam_id, generation);
            return Err(error.into());
        }

        if let Err(error) = self.repository.activate_generation(exam_id, generation) {
            self.discard_staged(exam_id, generation);
            return Err(error.into());
        }

        let discarded = self
            .repository
            .delete_other_generations(exam_id, generation)
            .map_err(|error| {
                warn!(%exam_id, generation, %error, "new seat assignments active but superseded rows remain");
                error
            })?;

        debug!(%exam_id, generation, inserted, discarded, "seat assignments replaced");
        Ok(ReplaceOutcome {
            inserted,
            discarded,
            generation,
        })
    }

    /// Active assignments of an exam in insertion order.
    pub fn assignments_for_exam(
        &self,
        exam_id: &ExamId,
    ) -> Result<Vec<SeatAssignment>, AssignmentStoreError> {
        let Some(active) = self.repository.active_generation(exam_id)? else {
            return Ok(Vec::new());
        };

        let mut assignments: Vec<SeatAssignment> = self
            .repository
            .for_exam(exam_id)?
            .into_iter()
            .filter(|assignment| assignment.generation == active)
            .collect();
        assignments.sort_by_key(|assignment| assignment.id);
        Ok(assignments)
    }

    /// Active assignments of a candidate across every exam, in insertion order.
    pub fn assignments_for_candidate(
        &self,
        candidate_id: &CandidateId,
    ) -> Result<Vec<SeatAssignment>, AssignmentStoreError> {
        let mut generations: HashMap<ExamId, Option<u64>> = HashMap::new();
        let mut assignments = Vec::new();

        for assignment in self.repository.for_candidate(candidate_id)? {
            let active = match generations.get(&assignment.exam_id) {
                Some(active) => *active,
                None => {
                    let active = self.repository.active_generation(&assignment.exam_id)?;
                    generations.insert(assignment.exam_id.clone(), active);
                    active
                }
            };

            if active == Some(assignment.generation) {
                assignments.push(assignment);
            }
        }

        assignments.sort_by_key(|assignment| assignment.id);
        Ok(assignments)
    }

    /// The assignment that currently represents the candidate.
    pub fn assignment_for_candidate(
        &self,
        candidate_id: &CandidateId,
    ) -> Result<Option<SeatAssignment>, AssignmentStoreError> {
        let assignments = self.assignments_for_candidate(candidate_id)?;
        Ok(select_current_assignment(&assignments).cloned())
    }

    /// Fetches an assignment only if it belongs to its exam's active set.
    pub fn active_assignment(
        &self,
        id: AssignmentId,
    ) -> Result<Option<SeatAssignment>, AssignmentStoreError> {
        active_assignment(self.repository.as_ref(), id).map_err(Into::into)
    }

    fn stage(
        &self,
        exam_id: &ExamId,
        generation: u64,
        placements: Vec<SeatPlacement>,
    ) -> Result<(), RepositoryError> {
        for placement in placements {
            let id = self.repository.next_assignment_id()?;
            let assignment =
                SeatAssignment::from_placement(id, exam_id.clone(), generation, placement);
            self.repository.insert(assignment)?;
        }
        Ok(())
    }

    fn discard_staged(&self, exam_id: &ExamId, generation: u64) {
        if let Err(error) = self.repository.delete_generation(exam_id, generation) {
            warn!(%exam_id, generation, %error, "failed to discard staged seat assignments");
        }
    }

    fn exam_lock(&self, exam_id: &ExamId) -> Arc<Mutex<()>> {
        let mut locks = self
            .exam_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(exam_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops the exam's lock entry once no other caller holds or awaits it.
    fn release_exam_lock(&self, exam_id: &ExamId, lock: Arc<Mutex<()>>) {
        let mut locks = self
            .exam_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        drop(lock);
        if locks
            .get(exam_id)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(exam_id);
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked_exam_locks(&self) -> usize {
        self.exam_locks
            .lock()
            .map(|locks| locks.len())
            .unwrap_or(0)
    }
}

pub(crate) fn active_assignment<A>(
    repository: &A,
    id: AssignmentId,
) -> Result<Option<SeatAssignment>, RepositoryError>
where
    A: AssignmentRepository + ?Sized,
{
    let Some(assignment) = repository.fetch(id)? else {
        return Ok(None);
    };
    let active = repository.active_generation(&assignment.exam_id)?;
    Ok((active == Some(assignment.generation)).then_some(assignment))
}

/// Picks the assignment representing a candidate: the most recently graded one,
/// otherwise the most recently inserted one.
pub fn select_current_assignment(assignments: &[SeatAssignment]) -> Option<&SeatAssignment> {
    let most_recent_grade = assignments
        .iter()
        .filter(|assignment| assignment.is_graded())
        .max_by(|left, right| compare_graded(left, right));

    most_recent_grade.or_else(|| assignments.iter().max_by_key(|assignment| assignment.id))
}

fn compare_graded(left: &SeatAssignment, right: &SeatAssignment) -> Ordering {
    let left_at = left.grade.as_ref().map(|grade| grade.graded_at);
    let right_at = right.grade.as_ref().map(|grade| grade.graded_at);
    left_at.cmp(&right_at).then(left.id.cmp(&right.id))
}

fn validate_placements(placements: &[SeatPlacement]) -> Result<(), AssignmentStoreError> {
    let mut seats = HashSet::with_capacity(placements.len());
    let mut candidates = HashSet::with_capacity(placements.len());

    for placement in placements {
        if placement.seat_number == 0 {
            return Err(AssignmentStoreError::InvalidSeat {
                laboratory_id: placement.laboratory_id.clone(),
                seat_number: placement.seat_number,
            });
        }
        if !seats.insert((&placement.laboratory_id, placement.seat_number)) {
            return Err(AssignmentStoreError::DuplicateSeat {
                laboratory_id: placement.laboratory_id.clone(),
                seat_number: placement.seat_number,
            });
        }
        if !candidates.insert(&placement.candidate_id) {
            return Err(AssignmentStoreError::DuplicateCandidate(
                placement.candidate_id.clone(),
            ));
        }
    }

    Ok(())
}

/// Error raised by the assignment store.
#[derive(Debug, thiserror::Error)]
pub enum AssignmentStoreError {
    #[error("seat {seat_number} in laboratory {laboratory_id} is assigned twice")]
    DuplicateSeat {
        laboratory_id: LaboratoryId,
        seat_number: u32,
    },
    #[error("seat {seat_number} in laboratory {laboratory_id} is out of range")]
    InvalidSeat {
        laboratory_id: LaboratoryId,
        seat_number: u32,
    },
    #[error("candidate {0} is assigned more than one seat")]
    DuplicateCandidate(CandidateId),
    #[error("storage failure: {0}")]
    Storage(#[from] RepositoryError),
}
