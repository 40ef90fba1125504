use chrono::{NaiveDate, NaiveTime};
use metrics_exporter_prometheus::PrometheusHandle;
use sipu_exams::config::CatalogConfig;
use sipu_exams::error::AppError;
use sipu_exams::exams::{
    Candidate, CatalogImporter, InMemoryAssignments, InMemoryCatalog, InMemoryExamService,
    InMemoryExamSessions, InMemoryRoster, Laboratory, Shift,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn in_memory_service(
    laboratories: Vec<Laboratory>,
    candidates: Vec<Candidate>,
) -> InMemoryExamService {
    InMemoryExamService::new(
        Arc::new(InMemoryExamSessions::default()),
        Arc::new(InMemoryRoster::with_candidates(candidates)),
        Arc::new(InMemoryCatalog::with_laboratories(laboratories)),
        Arc::new(InMemoryAssignments::default()),
    )
}

/// Builds the in-memory backends, hydrating them from the configured CSV exports.
pub(crate) fn seeded_service(catalog: &CatalogConfig) -> Result<InMemoryExamService, AppError> {
    let laboratories = match &catalog.laboratories_csv {
        Some(path) => CatalogImporter::laboratories_from_path(path)?,
        None => Vec::new(),
    };
    let candidates = match &catalog.candidates_csv {
        Some(path) => CatalogImporter::candidates_from_path(path)?,
        None => Vec::new(),
    };

    info!(
        laboratories = laboratories.len(),
        candidates = candidates.len(),
        "catalog seeded"
    );
    Ok(in_memory_service(laboratories, candidates))
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|err| format!("failed to parse '{raw}' as HH:MM ({err})"))
}

pub(crate) fn parse_shift(raw: &str) -> Result<Shift, String> {
    let value = serde_json::Value::String(raw.trim().to_ascii_lowercase());
    serde_json::from_value(value).map_err(|_| {
        format!("unknown shift '{raw}' (expected morning, afternoon or evening)")
    })
}
