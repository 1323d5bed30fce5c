use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::WorkflowError;

/// Identifier of an active lead. Assigned by the store, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadId(pub u64);

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an archive snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArchiveId(pub u64);

impl fmt::Display for ArchiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Top-level pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowBucket {
    #[serde(rename = "ALL")]
    All,
    #[serde(rename = "READY")]
    Ready,
    #[serde(rename = "KANBAN")]
    Kanban,
}

impl WorkflowBucket {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::Ready => "READY",
            Self::Kanban => "KANBAN",
        }
    }
}

impl FromStr for WorkflowBucket {
    type Err = WorkflowError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ALL" => Ok(Self::All),
            "READY" => Ok(Self::Ready),
            "KANBAN" => Ok(Self::Kanban),
            _ => Err(WorkflowError::InvalidEnumValue {
                field: "workflow_bucket",
                value: raw.to_string(),
            }),
        }
    }
}

/// Call-outcome sub-stage of the Kanban bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KanbanColumn {
    New,
    NotResponding,
    Ivr,
    HangUp,
    DmFoundCallTime,
    Voicemail,
}

impl KanbanColumn {
    pub const fn ordered() -> [Self; 6] {
        [
            Self::New,
            Self::NotResponding,
            Self::Ivr,
            Self::HangUp,
            Self::DmFoundCallTime,
            Self::Voicemail,
        ]
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::NotResponding => "not-responding",
            Self::Ivr => "ivr",
            Self::HangUp => "hang-up",
            Self::DmFoundCallTime => "dm-found-call-time",
            Self::Voicemail => "voicemail",
        }
    }

    /// Parses a column for the given wire field, so errors name what the caller sent.
    pub fn parse_field(raw: &str, field: &'static str) -> Result<Self, WorkflowError> {
        let trimmed = raw.trim();
        Self::ordered()
            .into_iter()
            .find(|column| column.as_str() == trimmed)
            .ok_or_else(|| WorkflowError::InvalidEnumValue {
                field,
                value: raw.to_string(),
            })
    }
}

impl FromStr for KanbanColumn {
    type Err = WorkflowError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse_field(raw, "kanban_column")
    }
}

/// Where a lead sits in the pipeline. The Kanban column only exists inside the Kanban
/// bucket, so the bucket/column pairing can never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    All,
    Ready,
    Kanban(KanbanColumn),
}

impl PipelineStage {
    /// Builds the stage for a bucket; the column is ignored outside Kanban and defaults to
    /// `new` inside it.
    pub fn from_parts(bucket: WorkflowBucket, column: Option<KanbanColumn>) -> Self {
        match bucket {
            WorkflowBucket::All => Self::All,
            WorkflowBucket::Ready => Self::Ready,
            WorkflowBucket::Kanban => Self::Kanban(column.unwrap_or(KanbanColumn::New)),
        }
    }

    pub const fn bucket(self) -> WorkflowBucket {
        match self {
            Self::All => WorkflowBucket::All,
            Self::Ready => WorkflowBucket::Ready,
            Self::Kanban(_) => WorkflowBucket::Kanban,
        }
    }

    pub const fn kanban_column(self) -> Option<KanbanColumn> {
        match self {
            Self::Kanban(column) => Some(column),
            _ => None,
        }
    }

    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }

    pub const fn is_in_kanban(self) -> bool {
        matches!(self, Self::Kanban(_))
    }

    /// Legacy free-text status shown for this stage.
    pub const fn status_label(self) -> &'static str {
        match self {
            Self::Kanban(column) => column.as_str(),
            _ => DEFAULT_STATUS,
        }
    }
}

/// Unicode lowercase used wherever lead names or CSV headers are compared.
pub(crate) fn fold_case(value: &str) -> String {
    value.to_lowercase()
}

/// Key under which lead names are unique.
pub(crate) fn name_key(value: &str) -> String {
    fold_case(value.trim())
}

pub const DEFAULT_STATUS: &str = "new";
pub const SENT_STATUS: &str = "sent";

/// Canonical lead attributes addressable from CSV headers and validation messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadField {
    Name,
    Employees,
    Location,
    Description,
    ContactName,
    ContactSurname,
    ContactPhone,
    Limit,
}

impl LeadField {
    pub const fn ordered() -> [Self; 8] {
        [
            Self::Name,
            Self::Employees,
            Self::Location,
            Self::Description,
            Self::ContactName,
            Self::ContactSurname,
            Self::ContactPhone,
            Self::Limit,
        ]
    }

    pub const fn db_field(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Employees => "employees",
            Self::Location => "location",
            Self::Description => "description",
            Self::ContactName => "contact_name",
            Self::ContactSurname => "contact_surname",
            Self::ContactPhone => "contact_phone",
            Self::Limit => "limit_val",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Name => "Company Name",
            Self::Employees => "Employees",
            Self::Location => "Location",
            Self::Description => "Description",
            Self::ContactName => "Contact Name",
            Self::ContactSurname => "Contact Surname",
            Self::ContactPhone => "Phone Number",
            Self::Limit => "Limit",
        }
    }

    pub fn from_db_field(raw: &str) -> Result<Self, WorkflowError> {
        let trimmed = raw.trim();
        Self::ordered()
            .into_iter()
            .find(|field| field.db_field().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| WorkflowError::InvalidEnumValue {
                field: "db_field",
                value: raw.to_string(),
            })
    }
}

/// Fields that must be filled before a lead may enter the Kanban board, in message order.
pub const KANBAN_REQUIRED_FIELDS: [LeadField; 5] = [
    LeadField::Name,
    LeadField::Location,
    LeadField::ContactName,
    LeadField::ContactSurname,
    LeadField::ContactPhone,
];

/// A company moving through the sales pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Lead {
    pub id: LeadId,
    pub name: String,
    pub employees: u32,
    pub location: Option<String>,
    pub description: Option<String>,
    pub contact_name: Option<String>,
    pub contact_surname: Option<String>,
    pub contact_phone: Option<String>,
    pub limit_val: Option<String>,
    pub stage: PipelineStage,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    pub fn field_value(&self, field: LeadField) -> Option<String> {
        match field {
            LeadField::Name => Some(self.name.clone()),
            LeadField::Employees => Some(self.employees.to_string()),
            LeadField::Location => self.location.clone(),
            LeadField::Description => self.description.clone(),
            LeadField::ContactName => self.contact_name.clone(),
            LeadField::ContactSurname => self.contact_surname.clone(),
            LeadField::ContactPhone => self.contact_phone.clone(),
            LeadField::Limit => self.limit_val.clone(),
        }
    }

    /// Labels of Kanban-required fields that are absent or blank.
    pub fn missing_kanban_fields(&self) -> Vec<&'static str> {
        KANBAN_REQUIRED_FIELDS
            .iter()
            .filter(|field| {
                self.field_value(**field)
                    .map_or(true, |value| value.trim().is_empty())
            })
            .map(|field| field.label())
            .collect()
    }

    pub fn view(&self) -> LeadView {
        LeadView {
            id: self.id,
            name: self.name.clone(),
            employees: self.employees,
            location: self.location.clone(),
            description: self.description.clone(),
            contact_name: self.contact_name.clone(),
            contact_surname: self.contact_surname.clone(),
            contact_phone: self.contact_phone.clone(),
            limit_val: self.limit_val.clone(),
            workflow_bucket: self.stage.bucket(),
            kanban_column: self.stage.kanban_column(),
            is_ready: self.stage.is_ready(),
            is_in_kanban: self.stage.is_in_kanban(),
            scheduled_at: self.scheduled_at,
            status: self.status.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Wire representation of a lead. `is_ready`/`is_in_kanban` are projected from the stage
/// for readers that still expect the legacy flags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadView {
    pub id: LeadId,
    pub name: String,
    pub employees: u32,
    pub location: Option<String>,
    pub description: Option<String>,
    pub contact_name: Option<String>,
    pub contact_surname: Option<String>,
    pub contact_phone: Option<String>,
    pub limit_val: Option<String>,
    pub workflow_bucket: WorkflowBucket,
    pub kanban_column: Option<KanbanColumn>,
    pub is_ready: bool,
    pub is_in_kanban: bool,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload handed to the store; ids and timestamps are assigned on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLead {
    pub name: String,
    pub employees: u32,
    pub location: Option<String>,
    pub description: Option<String>,
    pub contact_name: Option<String>,
    pub contact_surname: Option<String>,
    pub contact_phone: Option<String>,
    pub limit_val: Option<String>,
    pub stage: PipelineStage,
    pub status: String,
}

impl NewLead {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            employees: 0,
            location: None,
            description: None,
            contact_name: None,
            contact_surname: None,
            contact_phone: None,
            limit_val: None,
            stage: PipelineStage::All,
            status: DEFAULT_STATUS.to_string(),
        }
    }

    pub fn set_field(&mut self, field: LeadField, value: String) {
        match field {
            LeadField::Name => self.name = value,
            LeadField::Employees => {
                if let Some(count) = parse_employee_count(&value) {
                    self.employees = count;
                }
            }
            LeadField::Location => self.location = Some(value),
            LeadField::Description => self.description = Some(value),
            LeadField::ContactName => self.contact_name = Some(value),
            LeadField::ContactSurname => self.contact_surname = Some(value),
            LeadField::ContactPhone => self.contact_phone = Some(value),
            LeadField::Limit => self.limit_val = Some(value),
        }
    }
}

/// Accepts plain integers with optional thousands separators; anything else is ignored.
pub fn parse_employee_count(raw: &str) -> Option<u32> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|ch| !matches!(ch, ',' | '_' | ' '))
        .collect();
    cleaned.parse::<u32>().ok()
}

/// Caller-supplied fields for a manually created lead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LeadDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub employees: Option<u32>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub contact_surname: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub limit_val: Option<String>,
}

impl LeadDraft {
    pub fn into_new_lead(self) -> NewLead {
        NewLead {
            name: self.name.trim().to_string(),
            employees: self.employees.unwrap_or(0),
            location: non_blank(self.location),
            description: non_blank(self.description),
            contact_name: non_blank(self.contact_name),
            contact_surname: non_blank(self.contact_surname),
            contact_phone: non_blank(self.contact_phone),
            limit_val: non_blank(self.limit_val),
            ..NewLead::named("")
        }
    }
}

/// Partial edit of descriptive fields. Stage and scheduling are not editable here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LeadDetailsPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub employees: Option<u32>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub contact_surname: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub limit_val: Option<String>,
}

impl LeadDetailsPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Applies the patch; an empty string clears an optional field.
    pub fn apply(self, lead: &mut Lead) {
        if let Some(name) = self.name {
            lead.name = name.trim().to_string();
        }
        if let Some(employees) = self.employees {
            lead.employees = employees;
        }
        if let Some(location) = self.location {
            lead.location = non_blank(Some(location));
        }
        if let Some(description) = self.description {
            lead.description = non_blank(Some(description));
        }
        if let Some(contact_name) = self.contact_name {
            lead.contact_name = non_blank(Some(contact_name));
        }
        if let Some(contact_surname) = self.contact_surname {
            lead.contact_surname = non_blank(Some(contact_surname));
        }
        if let Some(contact_phone) = self.contact_phone {
            lead.contact_phone = non_blank(Some(contact_phone));
        }
        if let Some(limit_val) = self.limit_val {
            lead.limit_val = non_blank(Some(limit_val));
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}

/// Snapshot kept after a lead leaves the active table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchivedLead {
    pub id: ArchiveId,
    pub name: String,
    pub location: Option<String>,
    pub contact_name: Option<String>,
    pub contact_surname: Option<String>,
    pub contact_phone: Option<String>,
    pub archived_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewArchivedLead {
    pub name: String,
    pub location: Option<String>,
    pub contact_name: Option<String>,
    pub contact_surname: Option<String>,
    pub contact_phone: Option<String>,
}

impl From<&Lead> for NewArchivedLead {
    fn from(lead: &Lead) -> Self {
        Self {
            name: lead.name.clone(),
            location: lead.location.clone(),
            contact_name: lead.contact_name.clone(),
            contact_surname: lead.contact_surname.clone(),
            contact_phone: lead.contact_phone.clone(),
        }
    }
}

impl ArchivedLead {
    /// Rebuilds an active lead from the snapshot; restored leads land on the Kanban board.
    pub fn to_restored_lead(&self) -> NewLead {
        let stage = PipelineStage::Kanban(KanbanColumn::New);
        NewLead {
            name: self.name.clone(),
            location: self.location.clone(),
            contact_name: self.contact_name.clone(),
            contact_surname: self.contact_surname.clone(),
            contact_phone: self.contact_phone.clone(),
            stage,
            status: stage.status_label().to_string(),
            ..NewLead::named("")
        }
    }
}

/// Header-to-field entry of the import mapping table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMapping {
    pub csv_header: String,
    pub db_field: LeadField,
}
