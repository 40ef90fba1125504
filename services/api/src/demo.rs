use crate::infra::{in_memory_service, parse_date, parse_shift, parse_time};
use chrono::{Local, NaiveDate, NaiveTime};
use clap::Args;
use sipu_exams::error::AppError;
use sipu_exams::exams::{
    Candidate, CandidateId, CatalogImporter, DistributionSummary, EnrollmentState,
    ExamResults, ExamSessionRequest, GradeSubmission, InMemoryExamService, Laboratory,
    LaboratoryId, SeatAssignment, Shift, SiteId,
};
use std::collections::BTreeMap;
use std::path::PathBuf;

const DEMO_PERIOD: &str = "2025-1";
const DEMO_PROGRAM: &str = "software";

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Number of synthetic candidates to enroll
    #[arg(long, default_value_t = 18)]
    pub(crate) candidates: usize,
    /// Exam date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) date: Option<NaiveDate>,
    /// Stop after the distribution and skip the grading walkthrough
    #[arg(long)]
    pub(crate) skip_grading: bool,
}

#[derive(Args, Debug)]
pub(crate) struct PlanArgs {
    /// Laboratory export with `laboratory_id,site_id,name,capacity` columns
    #[arg(long)]
    pub(crate) laboratories: PathBuf,
    /// Candidate export with `email,name,national_id,period,program,shift,state` columns
    #[arg(long)]
    pub(crate) candidates: PathBuf,
    /// Academic period of the session, e.g. 2025-1
    #[arg(long)]
    pub(crate) period: String,
    /// Career or program code of the session
    #[arg(long)]
    pub(crate) program: String,
    /// Session shift (morning, afternoon, evening)
    #[arg(long, value_parser = parse_shift)]
    pub(crate) shift: Shift,
    /// Only seat candidates in laboratories of this site
    #[arg(long)]
    pub(crate) site: Option<String>,
    /// Exam date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) date: Option<NaiveDate>,
    /// Start time (HH:MM)
    #[arg(long, value_parser = parse_time, default_value = "08:00")]
    pub(crate) start: NaiveTime,
    /// End time (HH:MM)
    #[arg(long, value_parser = parse_time, default_value = "10:00")]
    pub(crate) end: NaiveTime,
}

#[derive(Args, Debug)]
pub(crate) struct CatalogArgs {
    /// Laboratory export with `laboratory_id,site_id,name,capacity` columns
    #[arg(long)]
    pub(crate) laboratories: PathBuf,
    /// Restrict the listing to one site
    #[arg(long)]
    pub(crate) site: Option<String>,
}

pub(crate) fn run_catalog_listing(args: CatalogArgs) -> Result<(), AppError> {
    let CatalogArgs { laboratories, site } = args;
    let laboratories = restrict_to_site(
        CatalogImporter::laboratories_from_path(laboratories)?,
        site.as_deref(),
    );
    render_catalog(&laboratories);
    Ok(())
}

pub(crate) fn run_seat_plan(args: PlanArgs) -> Result<(), AppError> {
    let PlanArgs {
        laboratories,
        candidates,
        period,
        program,
        shift,
        site,
        date,
        start,
        end,
    } = args;

    let laboratories = restrict_to_site(
        CatalogImporter::laboratories_from_path(laboratories)?,
        site.as_deref(),
    );
    let candidates = CatalogImporter::candidates_from_path(candidates)?;
    let service = in_memory_service(laboratories, candidates);

    let session = service.create_exam_session(ExamSessionRequest {
        period,
        program,
        shift,
        date: date.unwrap_or_else(|| Local::now().date_naive()),
        start_time: start,
        end_time: end,
    })?;
    let summary = service.distribute_seats(&session.id)?;
    let assignments = service.assignments_for_exam(&session.id)?;

    println!(
        "Seat plan for {} {} ({}) on {} {}-{}",
        session.period,
        session.program,
        session.shift.label(),
        session.date,
        session.start_time.format("%H:%M"),
        session.end_time.format("%H:%M")
    );
    render_distribution(&summary);
    render_seats(&assignments);
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        candidates,
        date,
        skip_grading,
    } = args;

    let service = in_memory_service(demo_laboratories(), demo_candidates(candidates));
    let date = date.unwrap_or_else(|| Local::now().date_naive());

    println!("SIPU exam administration demo");
    let session = service.create_exam_session(ExamSessionRequest {
        period: DEMO_PERIOD.to_string(),
        program: DEMO_PROGRAM.to_string(),
        shift: Shift::Morning,
        date,
        start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
        end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap_or_default(),
    })?;
    println!(
        "- Opened session {} on {} ({})",
        session.id,
        session.date,
        session.status.label()
    );

    let summary = match service.distribute_seats(&session.id) {
        Ok(summary) => summary,
        Err(err) => {
            println!("  Distribution refused: {}", err);
            return Ok(());
        }
    };
    render_distribution(&summary);

    let rerun = service.distribute_seats(&session.id)?;
    println!(
        "- Redistribution replaced {} seats with {} new ones",
        rerun.previous_assignments_discarded, rerun.candidates_assigned
    );

    if skip_grading {
        return Ok(());
    }

    grade_demo_assignments(&service, &service.assignments_for_exam(&session.id)?)?;
    render_results(&service.exam_results(&session.id)?);

    if let Some(first) = demo_candidates(1).into_iter().next() {
        match service.assignment_for_candidate(&first.id)? {
            Some(assignment) => println!(
                "- {} sits in {} seat {} at site {} ({})",
                first.id,
                assignment.laboratory_id,
                assignment.seat_number,
                assignment.site_id,
                assignment.status.label()
            ),
            None => println!("- {} has no seat", first.id),
        }
    }

    let closed = service.close_exam_session(&session.id)?;
    println!("- Session {} is now {}", closed.id, closed.status.label());
    Ok(())
}

fn grade_demo_assignments(
    service: &InMemoryExamService,
    assignments: &[SeatAssignment],
) -> Result<(), AppError> {
    for (index, assignment) in assignments.iter().enumerate() {
        let submission = if index % 5 == 4 {
            GradeSubmission {
                attended: false,
                score: None,
                remarks: "did not show up".to_string(),
            }
        } else {
            GradeSubmission {
                attended: true,
                score: Some(400 + ((index as i64 * 137) % 600)),
                remarks: String::new(),
            }
        };
        service.record_grade(assignment.id, &submission)?;
    }
    Ok(())
}

fn render_distribution(summary: &DistributionSummary) {
    println!(
        "- {} candidates seated across {} laboratories ({} seats available)",
        summary.candidates_assigned,
        summary.laboratories.len(),
        summary.seats_available
    );
    for load in &summary.laboratories {
        println!(
            "  - {} @ {}: {}/{} seats used",
            load.laboratory_id, load.site_id, load.seats_used, load.capacity
        );
    }
}

fn render_seats(assignments: &[SeatAssignment]) {
    println!("Seats:");
    for assignment in assignments {
        println!(
            "  - {} -> {} seat {} ({}, {})",
            assignment.candidate_id,
            assignment.laboratory_id,
            assignment.seat_number,
            assignment.site_id,
            assignment.status.label()
        );
    }
}

fn render_catalog(laboratories: &[Laboratory]) {
    let mut sites: BTreeMap<&SiteId, Vec<&Laboratory>> = BTreeMap::new();
    for laboratory in laboratories {
        sites.entry(&laboratory.site_id).or_default().push(laboratory);
    }

    if sites.is_empty() {
        println!("No laboratories in the catalog");
        return;
    }
    for (site_id, laboratories) in sites {
        let seats: u32 = laboratories.iter().map(|laboratory| laboratory.capacity).sum();
        println!("{} ({} seats)", site_id, seats);
        for laboratory in laboratories {
            println!(
                "  - {} {}: {} seats",
                laboratory.id, laboratory.name, laboratory.capacity
            );
        }
    }
}

fn restrict_to_site(laboratories: Vec<Laboratory>, site: Option<&str>) -> Vec<Laboratory> {
    match site {
        Some(site) => laboratories
            .into_iter()
            .filter(|laboratory| laboratory.site_id.0 == site)
            .collect(),
        None => laboratories,
    }
}

fn render_results(results: &ExamResults) {
    println!(
        "- Results: {} graded of {} ({} attended, {} absent, {} pending)",
        results.graded, results.total, results.attended, results.absent, results.pending
    );
    match (results.average_score, results.highest_score) {
        (Some(average), Some(highest)) => {
            println!("  Average score {:.1} | highest {}", average, highest)
        }
        _ => println!("  No scores recorded"),
    }
}

fn demo_laboratories() -> Vec<Laboratory> {
    [
        ("lab-este-1", "este", 3),
        ("lab-norte-1", "norte", 4),
        ("lab-principal-1", "principal", 6),
        ("lab-principal-2", "principal", 4),
        ("lab-sur-1", "sur", 3),
    ]
    .into_iter()
    .map(|(id, site, capacity)| Laboratory {
        id: LaboratoryId(id.to_string()),
        site_id: SiteId(site.to_string()),
        name: format!("Laboratorio {}", id.trim_start_matches("lab-")),
        capacity,
    })
    .collect()
}

fn demo_candidates(count: usize) -> Vec<Candidate> {
    (1..=count)
        .map(|index| Candidate {
            id: CandidateId(format!("aspirante{index:03}@sipu.edu")),
            name: format!("Aspirante {index}"),
            national_id: format!("{:010}", 1_700_000_000 + index),
            period: DEMO_PERIOD.to_string(),
            program: DEMO_PROGRAM.to_string(),
            shift: Shift::Morning,
            state: if index % 2 == 0 {
                EnrollmentState::AwaitingExam
            } else {
                EnrollmentState::Enrolled
            },
        })
        .collect()
}
