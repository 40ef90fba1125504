use super::common::*;
use crate::exams::domain::{
    AssignmentId, AssignmentStatus, ExamId, Grade, SeatAssignment, SeatPlacement,
};
use crate::exams::memory::InMemoryAssignments;
use crate::exams::repository::AssignmentRepository;
use crate::exams::store::{select_current_assignment, AssignmentStore, AssignmentStoreError};
use chrono::{Duration, TimeZone, Utc};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

fn exam(id: &str) -> ExamId {
    ExamId(id.to_string())
}

fn scenario_a_placements() -> Vec<SeatPlacement> {
    vec![
        placement(1, "lab-1", 1),
        placement(2, "lab-1", 2),
        placement(3, "lab-2", 1),
        placement(4, "lab-2", 2),
        placement(5, "lab-3", 1),
    ]
}

fn assignment(id: u64, exam_id: &str, graded_minutes: Option<i64>) -> SeatAssignment {
    let mut assignment = SeatAssignment::from_placement(
        AssignmentId(id),
        exam(exam_id),
        1,
        placement(1, "lab-1", id as u32),
    );
    if let Some(minutes) = graded_minutes {
        let base = Utc
            .with_ymd_and_hms(2025, 3, 15, 12, 0, 0)
            .single()
            .expect("valid timestamp");
        assignment.status = AssignmentStatus::Graded;
        assignment.grade = Some(Grade {
            attended: true,
            score: Some(700),
            remarks: String::new(),
            graded_at: base + Duration::minutes(minutes),
        });
    }
    assignment
}

#[test]
fn replace_writes_rows_in_allocation_order() {
    let store = AssignmentStore::new(Arc::new(InMemoryAssignments::default()));
    let outcome = store
        .replace_assignments(&exam("exam-1"), scenario_a_placements())
        .expect("replace succeeds");

    assert_eq!(outcome.inserted, 5);
    assert_eq!(outcome.discarded, 0);
    assert_eq!(outcome.generation, 1);

    let stored = store
        .assignments_for_exam(&exam("exam-1"))
        .expect("lookup succeeds");
    let candidates: Vec<_> = stored
        .iter()
        .map(|assignment| assignment.candidate_id.clone())
        .collect();
    assert_eq!(candidates, (1..=5).map(candidate_id).collect::<Vec<_>>());
    assert!(stored
        .iter()
        .all(|assignment| assignment.status == AssignmentStatus::Pending));
}

#[test]
fn replace_discards_previous_set_entirely() {
    let repository = Arc::new(InMemoryAssignments::default());
    let store = AssignmentStore::new(repository.clone());
    store
        .replace_assignments(&exam("exam-1"), scenario_a_placements())
        .expect("first replace");

    let outcome = store
        .replace_assignments(&exam("exam-1"), scenario_a_placements()[..4].to_vec())
        .expect("second replace");

    assert_eq!(outcome.inserted, 4);
    assert_eq!(outcome.discarded, 5);
    assert_eq!(outcome.generation, 2);
    assert_eq!(repository.row_count(), 4);
    assert_eq!(
        store
            .assignments_for_exam(&exam("exam-1"))
            .expect("lookup")
            .len(),
        4
    );
}

#[test]
fn replace_leaves_other_exams_untouched() {
    let repository = Arc::new(InMemoryAssignments::default());
    let store = AssignmentStore::new(repository.clone());
    store
        .replace_assignments(&exam("exam-1"), scenario_a_placements())
        .expect("exam-1");
    store
        .replace_assignments(&exam("exam-2"), scenario_a_placements()[..2].to_vec())
        .expect("exam-2");
    store
        .replace_assignments(&exam("exam-1"), scenario_a_placements()[..1].to_vec())
        .expect("exam-1 again");

    assert_eq!(store.assignments_for_exam(&exam("exam-2")).expect("lookup").len(), 2);
    assert_eq!(store.assignments_for_exam(&exam("exam-1")).expect("lookup").len(), 1);
    assert_eq!(repository.row_count(), 3);
}

#[test]
fn duplicate_seats_are_rejected_before_writing() {
    let repository = Arc::new(InMemoryAssignments::default());
    let store = AssignmentStore::new(repository.clone());
    let placements = vec![placement(1, "lab-1", 1), placement(2, "lab-1", 1)];

    match store.replace_assignments(&exam("exam-1"), placements) {
        Err(AssignmentStoreError::DuplicateSeat { seat_number, .. }) => assert_eq!(seat_number, 1),
        other => panic!("expected duplicate seat, got {other:?}"),
    }
    assert_eq!(repository.row_count(), 0);

    match store.replace_assignments(
        &exam("exam-1"),
        vec![placement(1, "lab-1", 1), placement(1, "lab-1", 2)],
    ) {
        Err(AssignmentStoreError::DuplicateCandidate(id)) => assert_eq!(id, candidate_id(1)),
        other => panic!("expected duplicate candidate, got {other:?}"),
    }

    assert!(matches!(
        store.replace_assignments(&exam("exam-1"), vec![placement(1, "lab-1", 0)]),
        Err(AssignmentStoreError::InvalidSeat { .. })
    ));
}

#[test]
fn failed_insert_keeps_previous_set_visible() {
    let repository = Arc::new(FlakyAssignments::healthy());
    let store = AssignmentStore::new(repository.clone());
    store
        .replace_assignments(&exam("exam-1"), scenario_a_placements())
        .expect("initial replace");

    repository.inserts_before_failure.store(2, Ordering::SeqCst);
    let result = store.replace_assignments(&exam("exam-1"), scenario_a_placements()[..4].to_vec());
    assert!(matches!(result, Err(AssignmentStoreError::Storage(_))));

    let visible = store.assignments_for_exam(&exam("exam-1")).expect("lookup");
    assert_eq!(visible.len(), 5, "old generation stays active");
    assert_eq!(repository.inner.row_count(), 5, "staged rows are discarded");
}

#[test]
fn failed_activation_discards_staged_rows() {
    let repository = Arc::new(FlakyAssignments::healthy());
    let store = AssignmentStore::new(repository.clone());
    store
        .replace_assignments(&exam("exam-1"), scenario_a_placements()[..2].to_vec())
        .expect("initial replace");

    repository.fail_activation.store(true, Ordering::SeqCst);
    assert!(store
        .replace_assignments(&exam("exam-1"), scenario_a_placements())
        .is_err());

    assert_eq!(store.assignments_for_exam(&exam("exam-1")).expect("lookup").len(), 2);
    assert_eq!(repository.inner.row_count(), 2);
}

#[test]
fn failed_purge_reports_error_and_retry_cleans_up() {
    let repository = Arc::new(FlakyAssignments::healthy());
    let store = AssignmentStore::new(repository.clone());
    store
        .replace_assignments(&exam("exam-1"), scenario_a_placements())
        .expect("initial replace");

    repository.fail_purge.store(true, Ordering::SeqCst);
    assert!(store
        .replace_assignments(&exam("exam-1"), scenario_a_placements()[..3].to_vec())
        .is_err());
    assert_eq!(
        store.assignments_for_exam(&exam("exam-1")).expect("lookup").len(),
        3,
        "new generation is already active"
    );

    repository.fail_purge.store(false, Ordering::SeqCst);
    let outcome = store
        .replace_assignments(&exam("exam-1"), scenario_a_placements()[..3].to_vec())
        .expect("retry succeeds");
    assert_eq!(outcome.generation, 3);
    assert_eq!(outcome.discarded, 8);
    assert_eq!(repository.inner.row_count(), 3);
}

#[test]
fn concurrent_replaces_leave_a_single_generation() {
    let repository = Arc::new(InMemoryAssignments::default());
    let store = Arc::new(AssignmentStore::new(repository.clone()));

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let store = store.clone();
            thread::spawn(move || {
                let count = 1 + worker % 5;
                store
                    .replace_assignments(&exam("exam-1"), scenario_a_placements()[..count].to_vec())
                    .expect("replace succeeds")
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker finished");
    }

    let active = store.assignments_for_exam(&exam("exam-1")).expect("lookup");
    assert_eq!(repository.row_count(), active.len());
    let generation = active[0].generation;
    assert!(active.iter().all(|assignment| assignment.generation == generation));
    assert_eq!(
        repository.active_generation(&exam("exam-1")).expect("generation"),
        Some(8)
    );
    assert_eq!(store.tracked_exam_locks(), 0);
}

#[test]
fn exam_locks_are_released_after_replace() {
    let repository = Arc::new(FlakyAssignments::healthy());
    let store = AssignmentStore::new(repository.clone());
    for exam_id in ["exam-1", "exam-2", "exam-3"] {
        store
            .replace_assignments(&exam(exam_id), scenario_a_placements())
            .expect("replace succeeds");
    }
    assert_eq!(store.tracked_exam_locks(), 0);

    repository.fail_activation.store(true, Ordering::SeqCst);
    assert!(store
        .replace_assignments(&exam("exam-4"), scenario_a_placements())
        .is_err());
    assert_eq!(store.tracked_exam_locks(), 0);
}

#[test]
fn candidate_lookup_only_sees_active_rows() {
    let repository = Arc::new(FlakyAssignments::healthy());
    let store = AssignmentStore::new(repository.clone());
    store
        .replace_assignments(&exam("exam-1"), scenario_a_placements())
        .expect("replace");

    // Staged row left behind by an interrupted replace.
    let orphan = SeatAssignment::from_placement(
        AssignmentId(999),
        exam("exam-1"),
        7,
        placement(1, "lab-9", 1),
    );
    repository.inner.insert(orphan).expect("orphan inserted");

    let rows = store
        .assignments_for_candidate(&candidate_id(1))
        .expect("lookup");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].laboratory_id, lab_id("lab-1"));
    assert!(store
        .active_assignment(AssignmentId(999))
        .expect("lookup")
        .is_none());
}

#[test]
fn selection_prefers_most_recent_grade() {
    let rows = vec![
        assignment(1, "exam-1", Some(30)),
        assignment(2, "exam-2", Some(5)),
        assignment(3, "exam-3", None),
    ];
    let selected = select_current_assignment(&rows).expect("one selected");
    assert_eq!(selected.id, AssignmentId(1));
}

#[test]
fn selection_breaks_grade_time_ties_by_id() {
    let rows = vec![
        assignment(4, "exam-1", Some(10)),
        assignment(2, "exam-2", Some(10)),
    ];
    let selected = select_current_assignment(&rows).expect("one selected");
    assert_eq!(selected.id, AssignmentId(4));
}

#[test]
fn selection_falls_back_to_most_recent_insert() {
    let rows = vec![
        assignment(7, "exam-1", None),
        assignment(9, "exam-2", None),
        assignment(8, "exam-3", None),
    ];
    let selected = select_current_assignment(&rows).expect("one selected");
    assert_eq!(selected.id, AssignmentId(9));
    assert!(select_current_assignment(&[]).is_none());
}
