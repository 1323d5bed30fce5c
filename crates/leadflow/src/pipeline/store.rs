//! Storage collaborator contract and the bundled in-memory implementation.
//!
//! The pipeline only ever talks to storage through [`LeadStore::transaction`]: every read
//! and write of one compound operation goes through the same [`LeadTransaction`], and the
//! store either commits all of it or none of it.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::Utc;

use super::audit::{ActivityEntry, NewActivity};
use super::domain::{
    fold_case, name_key, ArchiveId, ArchivedLead, ColumnMapping, Lead, LeadId, NewArchivedLead,
    NewLead,
};
use super::phone::PhoneQuery;

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("{0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Transactional access to the lead tables.
pub trait LeadStore: Send + Sync {
    /// Runs `work` inside one transaction. `Ok` commits every write made through the
    /// transaction handle; `Err` rolls all of them back.
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut dyn LeadTransaction) -> Result<T, E>;
}

/// Row-level operations available inside a transaction.
pub trait LeadTransaction {
    fn lead(&mut self, id: LeadId) -> Result<Option<Lead>, StoreError>;
    /// All active leads in ascending id order.
    fn leads(&mut self) -> Result<Vec<Lead>, StoreError>;
    /// Case-insensitive exact lookup on the lead name.
    fn lead_by_name(&mut self, name: &str) -> Result<Option<Lead>, StoreError>;
    /// Lowest-id lead whose stored phone satisfies the query.
    fn lead_by_phone(&mut self, query: &PhoneQuery) -> Result<Option<Lead>, StoreError>;
    /// Inserts a lead, rejecting names already used by an active lead.
    fn insert_lead(&mut self, lead: NewLead) -> Result<Lead, StoreError>;
    fn update_lead(&mut self, lead: &Lead) -> Result<(), StoreError>;
    fn delete_lead(&mut self, id: LeadId) -> Result<(), StoreError>;

    fn archived(&mut self, id: ArchiveId) -> Result<Option<ArchivedLead>, StoreError>;
    fn archived_leads(&mut self) -> Result<Vec<ArchivedLead>, StoreError>;
    fn insert_archived(&mut self, snapshot: NewArchivedLead)
        -> Result<ArchivedLead, StoreError>;
    fn delete_archived(&mut self, id: ArchiveId) -> Result<(), StoreError>;

    fn append_activity(&mut self, entry: NewActivity) -> Result<ActivityEntry, StoreError>;
    /// Entries referencing `lead_id`, oldest first.
    fn activity(&mut self, lead_id: LeadId) -> Result<Vec<ActivityEntry>, StoreError>;

    /// Mapping rows in insertion order.
    fn column_mappings(&mut self) -> Result<Vec<ColumnMapping>, StoreError>;
    /// Inserts or replaces the row keyed by `csv_header` (case-insensitive).
    fn upsert_column_mapping(&mut self, mapping: ColumnMapping) -> Result<(), StoreError>;
    /// Inserts only when no row uses the header yet; reports whether a row was added.
    fn insert_column_mapping_if_absent(
        &mut self,
        mapping: ColumnMapping,
    ) -> Result<bool, StoreError>;
}

#[derive(Debug, Clone, Default)]
struct Tables {
    leads: BTreeMap<LeadId, Lead>,
    archived: BTreeMap<ArchiveId, ArchivedLead>,
    activity: Vec<ActivityEntry>,
    mappings: Vec<ColumnMapping>,
    last_lead_id: u64,
    last_archive_id: u64,
    last_activity_id: u64,
}

/// In-process store. Transactions are serialised on one mutex and run against a working
/// copy that replaces the committed tables only on success.
#[derive(Debug, Default)]
pub struct MemoryLeadStore {
    tables: Mutex<Tables>,
}

impl MemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LeadStore for MemoryLeadStore {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut dyn LeadTransaction) -> Result<T, E>,
    {
        let mut committed = self
            .tables
            .lock()
            .map_err(|_| StoreError::Unavailable("lead store mutex poisoned".to_string()))?;

        let mut working = MemoryTransaction {
            tables: committed.clone(),
        };
        let value = work(&mut working)?;
        *committed = working.tables;
        Ok(value)
    }
}

struct MemoryTransaction {
    tables: Tables,
}

impl MemoryTransaction {
    fn name_taken(&self, name: &str, except: Option<LeadId>) -> bool {
        let key = name_key(name);
        self.tables
            .leads
            .values()
            .any(|lead| Some(lead.id) != except && name_key(&lead.name) == key)
    }

    fn mapping_position(&self, csv_header: &str) -> Option<usize> {
        let key = fold_case(csv_header.trim());
        self.tables
            .mappings
            .iter()
            .position(|row| fold_case(row.csv_header.trim()) == key)
    }
}

impl LeadTransaction for MemoryTransaction {
    fn lead(&mut self, id: LeadId) -> Result<Option<Lead>, StoreError> {
        Ok(self.tables.leads.get(&id).cloned())
    }

    fn leads(&mut self) -> Result<Vec<Lead>, StoreError> {
        Ok(self.tables.leads.values().cloned().collect())
    }

    fn lead_by_name(&mut self, name: &str) -> Result<Option<Lead>, StoreError> {
        let key = name_key(name);
        Ok(self
            .tables
            .leads
            .values()
            .find(|lead| name_key(&lead.name) == key)
            .cloned())
    }

    fn lead_by_phone(&mut self, query: &PhoneQuery) -> Result<Option<Lead>, StoreError> {
        Ok(self
            .tables
            .leads
            .values()
            .find(|lead| {
                lead.contact_phone
                    .as_deref()
                    .is_some_and(|stored| query.matches(stored))
            })
            .cloned())
    }

    fn insert_lead(&mut self, lead: NewLead) -> Result<Lead, StoreError> {
        if self.name_taken(&lead.name, None) {
            return Err(StoreError::Conflict(format!(
                "a lead named '{}' already exists",
                lead.name
            )));
        }

        self.tables.last_lead_id += 1;
        let now = Utc::now();
        let stored = Lead {
            id: LeadId(self.tables.last_lead_id),
            name: lead.name,
            employees: lead.employees,
            location: lead.location,
            description: lead.description,
            contact_name: lead.contact_name,
            contact_surname: lead.contact_surname,
            contact_phone: lead.contact_phone,
            limit_val: lead.limit_val,
            stage: lead.stage,
            scheduled_at: None,
            status: lead.status,
            created_at: now,
            updated_at: now,
        };
        self.tables.leads.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn update_lead(&mut self, lead: &Lead) -> Result<(), StoreError> {
        if !self.tables.leads.contains_key(&lead.id) {
            return Err(StoreError::NotFound {
                entity: "lead",
                id: lead.id.to_string(),
            });
        }
        if self.name_taken(&lead.name, Some(lead.id)) {
            return Err(StoreError::Conflict(format!(
                "a lead named '{}' already exists",
                lead.name
            )));
        }
        self.tables.leads.insert(lead.id, lead.clone());
        Ok(())
    }

    fn delete_lead(&mut self, id: LeadId) -> Result<(), StoreError> {
        self.tables
            .leads
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                entity: "lead",
                id: id.to_string(),
            })
    }

    fn archived(&mut self, id: ArchiveId) -> Result<Option<ArchivedLead>, StoreError> {
        Ok(self.tables.archived.get(&id).cloned())
    }

    fn archived_leads(&mut self) -> Result<Vec<ArchivedLead>, StoreError> {
        Ok(self.tables.archived.values().cloned().collect())
    }

    fn insert_archived(
        &mut self,
        snapshot: NewArchivedLead,
    ) -> Result<ArchivedLead, StoreError> {
        self.tables.last_archive_id += 1;
        let stored = ArchivedLead {
            id: ArchiveId(self.tables.last_archive_id),
            name: snapshot.name,
            location: snapshot.location,
            contact_name: snapshot.contact_name,
            contact_surname: snapshot.contact_surname,
            contact_phone: snapshot.contact_phone,
            archived_at: Utc::now(),
        };
        self.tables.archived.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn delete_archived(&mut self, id: ArchiveId) -> Result<(), StoreError> {
        self.tables
            .archived
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                entity: "archived lead",
                id: id.to_string(),
            })
    }

    fn append_activity(&mut self, entry: NewActivity) -> Result<ActivityEntry, StoreError> {
        self.tables.last_activity_id += 1;
        let stored = ActivityEntry {
            id: self.tables.last_activity_id,
            lead_id: entry.lead_id,
            action: entry.action,
            old_value: entry.old_value,
            new_value: entry.new_value,
            created_at: Utc::now(),
        };
        self.tables.activity.push(stored.clone());
        Ok(stored)
    }

    fn activity(&mut self, lead_id: LeadId) -> Result<Vec<ActivityEntry>, StoreError> {
        Ok(self
            .tables
            .activity
            .iter()
            .filter(|entry| entry.lead_id == lead_id)
            .cloned()
            .collect())
    }

    fn column_mappings(&mut self) -> Result<Vec<ColumnMapping>, StoreError> {
        Ok(self.tables.mappings.clone())
    }

    fn upsert_column_mapping(&mut self, mapping: ColumnMapping) -> Result<(), StoreError> {
        match self.mapping_position(&mapping.csv_header) {
            Some(index) => self.tables.mappings[index] = mapping,
            None => self.tables.mappings.push(mapping),
        }
        Ok(())
    }

    fn insert_column_mapping_if_absent(
        &mut self,
        mapping: ColumnMapping,
    ) -> Result<bool, StoreError> {
        if self.mapping_position(&mapping.csv_header).is_some() {
            return Ok(false);
        }
        self.tables.mappings.push(mapping);
        Ok(true)
    }
}
