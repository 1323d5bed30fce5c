//! CSV intake: header resolution, row building and duplicate suppression.

mod mapping;
mod normalizer;
mod parser;

use std::collections::HashSet;
use std::io::Read;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::domain::{name_key, ColumnMapping, LeadField, NewLead};
use super::error::{ValidationError, WorkflowError};
use super::store::{LeadStore, LeadTransaction};

pub use mapping::{
    default_column_mappings, HeaderResolver, DEFAULT_COLUMN_MAPPINGS, HEADER_OVERRIDES,
};
pub use parser::ImportRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub inserted: usize,
    /// Rows dropped as duplicates. Rows without a resolvable name are not counted.
    pub skipped: usize,
    pub total_in_input: usize,
    pub total_now: usize,
}

pub struct LeadImporter<S> {
    store: Arc<S>,
}

impl<S> LeadImporter<S>
where
    S: LeadStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Inserts the default header mappings that are not already present. Existing rows,
    /// including ones edited at runtime, are left alone.
    pub fn seed_default_mappings(&self) -> Result<usize, WorkflowError> {
        self.store.transaction(|tx| {
            let mut seeded = 0;
            for mapping in default_column_mappings() {
                if tx.insert_column_mapping_if_absent(mapping)? {
                    seeded += 1;
                }
            }
            Ok(seeded)
        })
    }

    pub fn column_mappings(&self) -> Result<Vec<ColumnMapping>, WorkflowError> {
        self.store
            .transaction(|tx| tx.column_mappings().map_err(WorkflowError::from))
    }

    pub fn put_column_mapping(
        &self,
        csv_header: &str,
        db_field: &str,
    ) -> Result<ColumnMapping, WorkflowError> {
        let db_field = LeadField::from_db_field(db_field)?;
        let csv_header = csv_header.trim();
        if csv_header.is_empty() {
            return Err(
                ValidationError::Invalid("csv_header must not be empty".to_string()).into(),
            );
        }

        let mapping = ColumnMapping {
            csv_header: csv_header.to_string(),
            db_field,
        };
        self.store.transaction(|tx| {
            tx.upsert_column_mapping(mapping.clone())
                .map_err(WorkflowError::from)
        })?;
        info!(
            csv_header = %mapping.csv_header,
            db_field = db_field.db_field(),
            "column mapping saved"
        );
        Ok(mapping)
    }

    pub fn resolve_column(&self, header: &str) -> Result<Option<LeadField>, WorkflowError> {
        let table = self.column_mappings()?;
        Ok(HeaderResolver::new(&table).resolve(header))
    }

    /// Persists one lead per row that resolves a name. Names are unique case-insensitively
    /// against the store and against earlier rows of the same batch; the first occurrence
    /// wins. The whole batch commits together.
    pub fn ingest(&self, rows: Vec<ImportRow>) -> Result<ImportSummary, WorkflowError> {
        let total_in_input = rows.len();

        let summary = self.store.transaction(|tx| {
            let resolver = HeaderResolver::new(&tx.column_mappings()?);
            let mut accepted = HashSet::new();
            let mut inserted = 0;
            let mut skipped = 0;

            for row in rows {
                let Some(candidate) = build_candidate(&resolver, row) else {
                    continue;
                };
                let key = name_key(&candidate.name);
                if accepted.contains(&key) || tx.lead_by_name(&candidate.name)?.is_some() {
                    skipped += 1;
                    continue;
                }
                tx.insert_lead(candidate)?;
                accepted.insert(key);
                inserted += 1;
            }

            Ok::<_, WorkflowError>(ImportSummary {
                inserted,
                skipped,
                total_in_input,
                total_now: count_leads(tx)?,
            })
        })?;

        info!(
            inserted = summary.inserted,
            skipped = summary.skipped,
            total_in_input,
            "import finished"
        );
        Ok(summary)
    }

    pub fn ingest_csv<R: Read>(&self, reader: R) -> Result<ImportSummary, WorkflowError> {
        let rows = parser::parse_rows(reader)
            .map_err(|err| ValidationError::Invalid(format!("invalid CSV data: {err}")))?;
        self.ingest(rows)
    }

    /// Upload entry point; a declared file name must carry a `.csv` extension.
    pub fn ingest_upload(
        &self,
        file_name: Option<&str>,
        body: &str,
    ) -> Result<ImportSummary, WorkflowError> {
        if let Some(file_name) = file_name {
            if !file_name.trim().to_ascii_lowercase().ends_with(".csv") {
                return Err(
                    ValidationError::Invalid("Only CSV files are allowed".to_string()).into(),
                );
            }
        }
        self.ingest_csv(body.as_bytes())
    }
}

fn build_candidate(resolver: &HeaderResolver, row: ImportRow) -> Option<NewLead> {
    let mut candidate = NewLead::named("");
    let mut filled = HashSet::new();

    for (header, value) in row.cells {
        let Some(field) = resolver.resolve(&header) else {
            debug!(header = %header, "unmapped column dropped");
            continue;
        };
        let value = value.trim();
        if value.is_empty() || filled.contains(&field) {
            continue;
        }
        candidate.set_field(field, value.to_string());
        filled.insert(field);
    }

    (!candidate.name.is_empty()).then_some(candidate)
}

fn count_leads(tx: &mut dyn LeadTransaction) -> Result<usize, WorkflowError> {
    Ok(tx.leads()?.len())
}
