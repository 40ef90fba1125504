//! Deterministic round-robin bin fill of candidates into laboratory seats.

use std::collections::HashSet;

use super::domain::{Candidate, CandidateId, Laboratory, LaboratoryId, SeatPlacement};

/// Failure modes of a single allocation run. None of them produce placements.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocationError {
    #[error("no laboratories are configured for allocation")]
    NoLaboratoriesConfigured,
    #[error("insufficient capacity: {required} seats required, {available} available")]
    InsufficientCapacity { required: u64, available: u64 },
    #[error("laboratory {0} is listed more than once")]
    DuplicateLaboratory(LaboratoryId),
    #[error("candidate {0} is listed more than once")]
    DuplicateCandidate(CandidateId),
    #[error(
        "laboratories exhausted after placing {placed} candidates with {remaining} remaining"
    )]
    LaboratoriesExhausted { placed: usize, remaining: usize },
}

/// Pure seat allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct SeatAllocator;

impl SeatAllocator {
    /// Assigns every candidate one seat, filling laboratories in id order and
    /// consuming candidates in id order. The returned placements follow the
    /// candidate consumption order.
    pub fn allocate(
        &self,
        candidates: &[Candidate],
        laboratories: &[Laboratory],
    ) -> Result<Vec<SeatPlacement>, AllocationError> {
        if laboratories.is_empty() {
            return Err(AllocationError::NoLaboratoriesConfigured);
        }

        let mut laboratories: Vec<&Laboratory> = laboratories.iter().collect();
        laboratories.sort_by(|left, right| left.id.cmp(&right.id));
        if let Some(pair) = laboratories.windows(2).find(|pair| pair[0].id == pair[1].id) {
            return Err(AllocationError::DuplicateLaboratory(pair[0].id.clone()));
        }

        let mut candidates: Vec<&Candidate> = candidates.iter().collect();
        candidates.sort_by(|left, right| left.id.cmp(&right.id));
        if let Some(pair) = candidates.windows(2).find(|pair| pair[0].id == pair[1].id) {
            return Err(AllocationError::DuplicateCandidate(pair[0].id.clone()));
        }

        let required = candidates.len() as u64;
        let available = total_capacity(laboratories.iter().copied());
        if available < required {
            return Err(AllocationError::InsufficientCapacity {
                required,
                available,
            });
        }

        let mut seats = laboratories.iter().flat_map(|laboratory| {
            (1..=laboratory.capacity).map(move |seat_number| (*laboratory, seat_number))
        });

        let mut placements = Vec::with_capacity(candidates.len());
        for (index, candidate) in candidates.iter().enumerate() {
            let Some((laboratory, seat_number)) = seats.next() else {
                return Err(AllocationError::LaboratoriesExhausted {
                    placed: index,
                    remaining: candidates.len() - index,
                });
            };

            placements.push(SeatPlacement {
                candidate_id: candidate.id.clone(),
                laboratory_id: laboratory.id.clone(),
                site_id: laboratory.site_id.clone(),
                seat_number,
            });
        }

        debug_assert!(placements_are_unique(&placements));
        Ok(placements)
    }
}

pub fn total_capacity<'a, I>(laboratories: I) -> u64
where
    I: IntoIterator<Item = &'a Laboratory>,
{
    laboratories
        .into_iter()
        .map(|laboratory| u64::from(laboratory.capacity))
        .sum()
}

/// True when no two placements share a (laboratory, seat) pair.
pub fn placements_are_unique(placements: &[SeatPlacement]) -> bool {
    let mut seen = HashSet::with_capacity(placements.len());
    placements
        .iter()
        .all(|placement| seen.insert((&placement.laboratory_id, placement.seat_number)))
}
