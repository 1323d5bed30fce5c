use super::normalizer::normalize_header;
use crate::pipeline::domain::{ColumnMapping, LeadField};

/// Legacy aliases that win over anything in the mapping table.
pub const HEADER_OVERRIDES: &[(&str, LeadField)] = &[
    ("business_owner_name", LeadField::Name),
    ("address_state", LeadField::Location),
];

/// Rows seeded into the mapping table on startup.
pub const DEFAULT_COLUMN_MAPPINGS: &[(&str, LeadField)] = &[
    ("Company Name", LeadField::Name),
    ("Organization", LeadField::Name),
    ("Name", LeadField::Name),
    ("Number of Employees", LeadField::Employees),
    ("Employees", LeadField::Employees),
    ("Staff Count", LeadField::Employees),
    ("Location", LeadField::Location),
    ("City", LeadField::Location),
    ("Address", LeadField::Location),
    ("Limit", LeadField::Limit),
    ("clients_company", LeadField::Name),
    ("location_office", LeadField::Location),
    ("previous_call_summary", LeadField::Description),
    ("phone_number", LeadField::ContactPhone),
    ("user_name", LeadField::ContactName),
    ("user_surname", LeadField::ContactSurname),
];

pub fn default_column_mappings() -> Vec<ColumnMapping> {
    DEFAULT_COLUMN_MAPPINGS
        .iter()
        .map(|(header, field)| ColumnMapping {
            csv_header: (*header).to_string(),
            db_field: *field,
        })
        .collect()
}

/// Header lookup as one priority-ordered list: overrides first, then table rows in
/// table order. The first entry whose normalized header matches wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderResolver {
    entries: Vec<(String, LeadField)>,
}

impl HeaderResolver {
    pub fn new(table: &[ColumnMapping]) -> Self {
        let overrides = HEADER_OVERRIDES
            .iter()
            .map(|(header, field)| (normalize_header(header), *field));
        let rows = table
            .iter()
            .map(|mapping| (normalize_header(&mapping.csv_header), mapping.db_field));

        Self {
            entries: overrides.chain(rows).collect(),
        }
    }

    pub fn resolve(&self, header: &str) -> Option<LeadField> {
        let normalized = normalize_header(header);
        self.entries
            .iter()
            .find(|(candidate, _)| *candidate == normalized)
            .map(|(_, field)| *field)
    }
}
