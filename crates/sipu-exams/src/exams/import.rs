use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use super::domain::{
    Candidate, CandidateId, EnrollmentState, Laboratory, LaboratoryId, Shift, SiteId,
};

#[derive(Debug)]
pub enum CatalogImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidCapacity { laboratory_id: String },
    MissingField { row: usize, field: &'static str },
}

impl std::fmt::Display for CatalogImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogImportError::Io(err) => write!(f, "failed to read catalog export: {}", err),
            CatalogImportError::Csv(err) => write!(f, "invalid catalog CSV data: {}", err),
            CatalogImportError::InvalidCapacity { laboratory_id } => write!(
                f,
                "laboratory '{}' must have a capacity of at least one seat",
                laboratory_id
            ),
            CatalogImportError::MissingField { row, field } => {
                write!(f, "row {} is missing a value for '{}'", row, field)
            }
        }
    }
}

impl std::error::Error for CatalogImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CatalogImportError::Io(err) => Some(err),
            CatalogImportError::Csv(err) => Some(err),
            CatalogImportError::InvalidCapacity { .. } | CatalogImportError::MissingField { .. } => {
                None
            }
        }
    }
}

impl From<std::io::Error> for CatalogImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for CatalogImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

#[derive(Debug, Deserialize)]
struct LaboratoryRow {
    laboratory_id: String,
    site_id: String,
    #[serde(default)]
    name: String,
    capacity: u32,
}

#[derive(Debug, Deserialize)]
struct CandidateRow {
    email: String,
    name: String,
    #[serde(default)]
    national_id: String,
    period: String,
    program: String,
    shift: Shift,
    state: EnrollmentState,
}

/// Loads laboratories and candidates from CSV exports of the registration system.
pub struct CatalogImporter;

impl CatalogImporter {
    pub fn laboratories_from_path<P: AsRef<Path>>(
        path: P,
    ) -> Result<Vec<Laboratory>, CatalogImportError> {
        let file = std::fs::File::open(path)?;
        Self::laboratories_from_reader(file)
    }

    /// Expects `laboratory_id,site_id,name,capacity` columns.
    pub fn laboratories_from_reader<R: Read>(
        reader: R,
    ) -> Result<Vec<Laboratory>, CatalogImportError> {
        let mut laboratories = Vec::new();
        for (index, row) in csv_reader(reader).deserialize::<LaboratoryRow>().enumerate() {
            let row = row?;
            require(index, "laboratory_id", &row.laboratory_id)?;
            require(index, "site_id", &row.site_id)?;
            if row.capacity == 0 {
                return Err(CatalogImportError::InvalidCapacity {
                    laboratory_id: row.laboratory_id,
                });
            }

            let name = if row.name.is_empty() {
                row.laboratory_id.clone()
            } else {
                row.name
            };
            laboratories.push(Laboratory {
                id: LaboratoryId(row.laboratory_id),
                site_id: SiteId(row.site_id),
                name,
                capacity: row.capacity,
            });
        }

        laboratories.sort_by(|left, right| left.id.cmp(&right.id));
        Ok(laboratories)
    }

    pub fn candidates_from_path<P: AsRef<Path>>(
        path: P,
    ) -> Result<Vec<Candidate>, CatalogImportError> {
        let file = std::fs::File::open(path)?;
        Self::candidates_from_reader(file)
    }

    /// Expects `email,name,national_id,period,program,shift,state` columns.
    pub fn candidates_from_reader<R: Read>(
        reader: R,
    ) -> Result<Vec<Candidate>, CatalogImportError> {
        let mut candidates = Vec::new();
        for (index, row) in csv_reader(reader).deserialize::<CandidateRow>().enumerate() {
            let row = row?;
            require(index, "email", &row.email)?;
            require(index, "period", &row.period)?;
            require(index, "program", &row.program)?;

            candidates.push(Candidate {
                id: CandidateId(row.email.to_ascii_lowercase()),
                name: row.name,
                national_id: row.national_id,
                period: row.period,
                program: row.program,
                shift: row.shift,
                state: row.state,
            });
        }

        Ok(candidates)
    }
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
}

fn require(index: usize, field: &'static str, value: &str) -> Result<(), CatalogImportError> {
    if value.is_empty() {
        return Err(CatalogImportError::MissingField {
            row: index + 1,
            field,
        });
    }
    Ok(())
}
