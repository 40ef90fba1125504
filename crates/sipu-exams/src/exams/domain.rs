use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Lowest score an attending candidate can receive.
pub const MIN_SCORE: u16 = 1;
/// Highest score an attending candidate can receive.
pub const MAX_SCORE: u16 = 1000;

/// Identifier wrapper for exam sessions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExamId(pub String);

/// Candidates are keyed by their unique e-mail address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CandidateId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LaboratoryId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SiteId(pub String);

/// Storage-issued assignment identifier. Ids grow monotonically, so ordering by id
/// is ordering by insertion.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct AssignmentId(pub u64);

macro_rules! display_inner {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}

display_inner!(ExamId, CandidateId, LaboratoryId, SiteId, AssignmentId);

/// Physical room with a fixed number of workstations at a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Laboratory {
    pub id: LaboratoryId,
    pub site_id: SiteId,
    pub name: String,
    pub capacity: u32,
}

/// Class schedule a candidate enrolled into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shift {
    #[serde(alias = "matutina")]
    Morning,
    #[serde(alias = "vespertina")]
    Afternoon,
    #[serde(alias = "nocturna")]
    Evening,
}

impl Shift {
    pub const fn label(self) -> &'static str {
        match self {
            Shift::Morning => "morning",
            Shift::Afternoon => "afternoon",
            Shift::Evening => "evening",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentState {
    Registered,
    Enrolled,
    AwaitingExam,
    Rejected,
}

impl EnrollmentState {
    /// Only enrolled candidates waiting on their exam can be seated.
    pub const fn is_eligible(self) -> bool {
        matches!(self, EnrollmentState::Enrolled | EnrollmentState::AwaitingExam)
    }
}

/// Enrollment snapshot handed over by the registration collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    pub national_id: String,
    pub period: String,
    pub program: String,
    pub shift: Shift,
    pub state: EnrollmentState,
}

impl Candidate {
    /// Matches on enrollment state plus the exact (period, program, shift) key.
    pub fn is_eligible_for(&self, session: &ExamSession) -> bool {
        self.state.is_eligible()
            && self.period == session.period
            && self.program == session.program
            && self.shift == session.shift
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamSessionStatus {
    Active,
    Closed,
}

impl ExamSessionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ExamSessionStatus::Active => "active",
            ExamSessionStatus::Closed => "closed",
        }
    }
}

/// One scheduled administration of the admission exam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamSession {
    pub id: ExamId,
    pub period: String,
    pub program: String,
    pub shift: Shift,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: ExamSessionStatus,
}

impl ExamSession {
    pub fn is_active(&self) -> bool {
        self.status == ExamSessionStatus::Active
    }
}

/// Payload used by administrators to open a new exam session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamSessionRequest {
    pub period: String,
    pub program: String,
    pub shift: Shift,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Allocator output: a seat chosen for a candidate, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatPlacement {
    pub candidate_id: CandidateId,
    pub laboratory_id: LaboratoryId,
    pub site_id: SiteId,
    pub seat_number: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    Graded,
}

impl AssignmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "pending",
            AssignmentStatus::Graded => "graded",
        }
    }
}

/// Attendance and score recorded against one seat assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grade {
    pub attended: bool,
    /// Always `None` when the candidate did not attend.
    pub score: Option<u16>,
    pub remarks: String,
    pub graded_at: DateTime<Utc>,
}

/// Binding of one candidate to one (laboratory, seat) for one exam session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatAssignment {
    pub id: AssignmentId,
    pub exam_id: ExamId,
    pub candidate_id: CandidateId,
    pub laboratory_id: LaboratoryId,
    pub site_id: SiteId,
    pub seat_number: u32,
    pub status: AssignmentStatus,
    pub grade: Option<Grade>,
    /// Replace batch this row was written under.
    pub generation: u64,
    /// Bumped on every successful write; used for compare-and-set.
    pub revision: u64,
}

impl SeatAssignment {
    pub fn from_placement(
        id: AssignmentId,
        exam_id: ExamId,
        generation: u64,
        placement: SeatPlacement,
    ) -> Self {
        Self {
            id,
            exam_id,
            candidate_id: placement.candidate_id,
            laboratory_id: placement.laboratory_id,
            site_id: placement.site_id,
            seat_number: placement.seat_number,
            status: AssignmentStatus::Pending,
            grade: None,
            generation,
            revision: 0,
        }
    }

    pub fn is_graded(&self) -> bool {
        self.status == AssignmentStatus::Graded && self.grade.is_some()
    }

    /// Score usable for reporting; absent candidates never report one.
    pub fn usable_score(&self) -> Option<u16> {
        self.grade
            .as_ref()
            .filter(|grade| grade.attended)
            .and_then(|grade| grade.score)
    }
}
