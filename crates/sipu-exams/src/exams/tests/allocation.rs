use super::common::*;
use crate::exams::allocator::{placements_are_unique, AllocationError, SeatAllocator};
use crate::exams::domain::Laboratory;
use std::collections::HashMap;

fn capacity_by_lab(laboratories: &[Laboratory]) -> HashMap<String, u32> {
    laboratories
        .iter()
        .map(|laboratory| (laboratory.id.0.clone(), laboratory.capacity))
        .collect()
}

#[test]
fn fills_laboratories_in_order_for_scenario_a() {
    let placements = SeatAllocator
        .allocate(&candidates(5), &scenario_laboratories())
        .expect("capacity is sufficient");

    let observed: Vec<(String, String, u32)> = placements
        .iter()
        .map(|placement| {
            (
                placement.candidate_id.0.clone(),
                placement.laboratory_id.0.clone(),
                placement.seat_number,
            )
        })
        .collect();

    assert_eq!(
        observed,
        vec![
            ("c1@sipu.edu".to_string(), "lab-1".to_string(), 1),
            ("c2@sipu.edu".to_string(), "lab-1".to_string(), 2),
            ("c3@sipu.edu".to_string(), "lab-2".to_string(), 1),
            ("c4@sipu.edu".to_string(), "lab-2".to_string(), 2),
            ("c5@sipu.edu".to_string(), "lab-3".to_string(), 1),
        ]
    );
    assert_eq!(placements[4].site_id.0, "norte");
}

#[test]
fn rejects_scenario_b_with_required_and_available() {
    let result = SeatAllocator.allocate(&candidates(6), &scenario_laboratories());
    assert_eq!(
        result,
        Err(AllocationError::InsufficientCapacity {
            required: 6,
            available: 5,
        })
    );
}

#[test]
fn ordering_does_not_depend_on_input_order() {
    let mut shuffled_candidates = candidates(5);
    shuffled_candidates.reverse();
    shuffled_candidates.swap(0, 2);
    let mut shuffled_laboratories = scenario_laboratories();
    shuffled_laboratories.reverse();

    let baseline = SeatAllocator
        .allocate(&candidates(5), &scenario_laboratories())
        .expect("baseline allocates");
    let shuffled = SeatAllocator
        .allocate(&shuffled_candidates, &shuffled_laboratories)
        .expect("shuffled allocates");

    assert_eq!(baseline, shuffled);
}

#[test]
fn succeeds_exactly_when_capacity_covers_candidates() {
    let layouts: Vec<Vec<Laboratory>> = vec![
        vec![laboratory("lab-a", "principal", 3)],
        vec![
            laboratory("lab-a", "principal", 1),
            laboratory("lab-b", "sur", 4),
        ],
        vec![
            laboratory("lab-a", "principal", 2),
            laboratory("lab-b", "sur", 2),
            laboratory("lab-c", "este", 3),
        ],
    ];

    for laboratories in &layouts {
        let capacity: usize = laboratories.iter().map(|lab| lab.capacity as usize).sum();
        let capacities = capacity_by_lab(laboratories);

        for count in 0..=capacity + 2 {
            let result = SeatAllocator.allocate(&candidates(count), laboratories);
            if count <= capacity {
                let placements = result.expect("allocation succeeds within capacity");
                assert_eq!(placements.len(), count);
                assert!(placements_are_unique(&placements));
                for placement in &placements {
                    let limit = capacities[&placement.laboratory_id.0];
                    assert!(
                        (1..=limit).contains(&placement.seat_number),
                        "seat {} outside 1..={} in {}",
                        placement.seat_number,
                        limit,
                        placement.laboratory_id
                    );
                }
            } else {
                assert!(matches!(
                    result,
                    Err(AllocationError::InsufficientCapacity { .. })
                ));
            }
        }
    }
}

#[test]
fn empty_catalog_is_a_precondition_failure() {
    assert_eq!(
        SeatAllocator.allocate(&candidates(1), &[]),
        Err(AllocationError::NoLaboratoriesConfigured)
    );
}

#[test]
fn empty_roster_yields_no_placements() {
    let placements = SeatAllocator
        .allocate(&[], &scenario_laboratories())
        .expect("nothing to place");
    assert!(placements.is_empty());
}

#[test]
fn zero_capacity_laboratories_are_skipped() {
    let laboratories = vec![
        laboratory("lab-1", "principal", 0),
        laboratory("lab-2", "principal", 2),
    ];
    let placements = SeatAllocator
        .allocate(&candidates(2), &laboratories)
        .expect("second laboratory fits both");
    assert!(placements
        .iter()
        .all(|placement| placement.laboratory_id == lab_id("lab-2")));
}

#[test]
fn duplicate_identifiers_are_rejected() {
    let mut roster = candidates(2);
    roster.push(candidate(1));
    assert_eq!(
        SeatAllocator.allocate(&roster, &scenario_laboratories()),
        Err(AllocationError::DuplicateCandidate(candidate_id(1)))
    );

    let mut laboratories = scenario_laboratories();
    laboratories.push(laboratory("lab-2", "sur", 10));
    assert_eq!(
        SeatAllocator.allocate(&candidates(2), &laboratories),
        Err(AllocationError::DuplicateLaboratory(lab_id("lab-2")))
    );
}
