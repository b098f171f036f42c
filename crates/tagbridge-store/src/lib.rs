//! Tagbridge in-memory entity store
//!
//! Implements both host contracts (`MetadataProvider`, `EntityStore`) over a
//! `StoreFixture` held in memory:
//!
//! ```text
//! ┌──────────────┐  describe / fetch / link   ┌──────────────────────────┐
//! │  TagControl  │───────────────────────────►│       MemoryStore        │
//! └──────────────┘                            │  ┌────────────────────┐  │
//!                                             │  │ entity tables      │  │
//!        fixture.json ◄──── load / save ─────►│  │ relationship defs  │  │
//!                                             │  └────────────────────┘  │
//!                                             │  call log · faults       │
//!                                             └──────────────────────────┘
//! ```
//!
//! Besides serving the CLI, the store records every call it receives and can
//! be told to fail specific operations, so tests can observe exactly what the
//! control asked for.

pub mod fixture;
pub mod matching;
pub mod sample;

#[cfg(test)]
mod tests;

pub use fixture::{EntityTable, RelationshipDef, StoreFixture};
pub use matching::MatchCase;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tagbridge_model::{
    record_str, Association, AssociationKey, EntityMetadata, EntityStore, MetadataProvider,
    Record, RecordQuery, StoreError,
};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    /// Case policy for substring filters and ordering
    #[serde(default)]
    pub match_case: MatchCase,
    /// Artificial delay applied to every call, in milliseconds
    #[serde(default)]
    pub latency_ms: u64,
}

// ============================================================================
// Call Log & Faults
// ============================================================================

/// Every call the store received, in arrival order (failed calls included).
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    pub describe: Vec<String>,
    pub fetch_one: Vec<(String, String)>,
    pub fetch_many: Vec<(String, RecordQuery)>,
    pub links: Vec<AssociationKey>,
    pub unlinks: Vec<AssociationKey>,
}

#[derive(Debug, Default)]
struct Faults {
    describe: HashSet<String>,
    fetch: HashSet<String>,
    link: HashSet<String>,
    unlink: HashSet<String>,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Memory Store
// ============================================================================

pub struct MemoryStore {
    config: StoreConfig,
    data: RwLock<StoreFixture>,
    faults: RwLock<Faults>,
    calls: Mutex<CallLog>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MemoryStore {
    pub fn new(fixture: StoreFixture, config: StoreConfig) -> Self {
        Self {
            config,
            data: RwLock::new(fixture),
            faults: RwLock::new(Faults::default()),
            calls: Mutex::new(CallLog::default()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn load(path: &Path, config: StoreConfig) -> anyhow::Result<Self> {
        Ok(Self::new(StoreFixture::load(path)?, config))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        self.snapshot().save(path)
    }

    pub fn snapshot(&self) -> StoreFixture {
        self.data.read().clone()
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub fn calls(&self) -> CallLog {
        self.calls.lock().clone()
    }

    pub fn describe_calls(&self, entity_type: &str) -> usize {
        self.calls
            .lock()
            .describe
            .iter()
            .filter(|e| e.as_str() == entity_type)
            .count()
    }

    /// Highest number of link/unlink calls that were in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Related ids currently linked to `host_id` through `relationship_name`,
    /// in junction-row order.
    pub fn linked_ids(&self, relationship_name: &str, host_id: &str) -> Vec<String> {
        let data = self.data.read();
        let Ok(columns) = relationship_columns(&data, relationship_name) else {
            return Vec::new();
        };
        let Some(junction) = data.entities.get(&columns.junction_entity) else {
            return Vec::new();
        };
        junction
            .records
            .iter()
            .filter(|row| {
                record_str(row, &columns.host_attribute)
                    .map(|id| matching::id_eq(&id, host_id))
                    .unwrap_or(false)
            })
            .filter_map(|row| record_str(row, &columns.related_attribute))
            .collect()
    }

    // ========================================================================
    // Fault Injection
    // ========================================================================

    pub fn fail_describe(&self, entity_type: &str) {
        self.faults.write().describe.insert(entity_type.to_string());
    }

    pub fn fail_fetch(&self, entity: &str) {
        self.faults.write().fetch.insert(entity.to_string());
    }

    /// Reject any link of the related record `tag_key`.
    pub fn fail_link(&self, tag_key: &str) {
        self.faults.write().link.insert(tag_key.to_string());
    }

    /// Reject any unlink of the related record `tag_key`.
    pub fn fail_unlink(&self, tag_key: &str) {
        self.faults.write().unlink.insert(tag_key.to_string());
    }

    pub fn clear_faults(&self) {
        *self.faults.write() = Faults::default();
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn pause(&self) {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }
    }

    fn enter(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight(&self.in_flight)
    }

    fn check_fetch_fault(&self, entity: &str) -> Result<(), StoreError> {
        if self.faults.read().fetch.contains(entity) {
            return Err(StoreError::Transport(format!("fetch from `{entity}` failed")));
        }
        Ok(())
    }
}

/// Where the rows of one relationship live and which columns they carry.
struct RelationshipColumns {
    junction_entity: String,
    host_collection: String,
    host_attribute: String,
    related_collection: String,
    related_attribute: String,
}

fn relationship_columns(
    data: &StoreFixture,
    relationship_name: &str,
) -> Result<RelationshipColumns, StoreError> {
    let def = data
        .relationships
        .get(relationship_name)
        .ok_or_else(|| StoreError::UnknownRelationship(relationship_name.to_string()))?;
    let table = |entity: &str| {
        data.entities
            .get(entity)
            .ok_or_else(|| StoreError::UnknownEntity(entity.to_string()))
    };
    table(&def.junction_entity)?;
    let host = table(&def.host_entity)?;
    let related = table(&def.related_entity)?;
    Ok(RelationshipColumns {
        junction_entity: def.junction_entity.clone(),
        host_collection: host.metadata.collection_name.clone(),
        host_attribute: host.metadata.id_attribute.clone(),
        related_collection: related.metadata.collection_name.clone(),
        related_attribute: related.metadata.id_attribute.clone(),
    })
}

fn contains_id(table: &EntityTable, id: &str) -> bool {
    table.records.iter().any(|r| {
        record_str(r, &table.metadata.id_attribute)
            .map(|rid| matching::id_eq(&rid, id))
            .unwrap_or(false)
    })
}

/// Validate `association` against the relationship definition and make sure
/// both endpoints exist.
fn resolve_association(
    data: &StoreFixture,
    association: &Association,
) -> Result<RelationshipColumns, StoreError> {
    let columns = relationship_columns(data, &association.relationship_name)?;

    for (expected, record) in [
        (&columns.host_collection, &association.host),
        (&columns.related_collection, &association.related),
    ] {
        if expected != &record.collection {
            return Err(StoreError::Rejected(format!(
                "`{}` does not take part in `{}`",
                record.collection, association.relationship_name
            )));
        }
        let (entity, table) = data
            .entity_for_collection(&record.collection)
            .ok_or_else(|| StoreError::UnknownEntity(record.collection.clone()))?;
        if !contains_id(table, &record.id) {
            return Err(StoreError::NotFound {
                entity: entity.to_string(),
                id: record.id.clone(),
            });
        }
    }

    Ok(columns)
}

fn is_link_row(row: &Record, columns: &RelationshipColumns, association: &Association) -> bool {
    let host = record_str(row, &columns.host_attribute)
        .map(|id| matching::id_eq(&id, &association.host.id));
    let related = record_str(row, &columns.related_attribute)
        .map(|id| matching::id_eq(&id, &association.related.id));
    host == Some(true) && related == Some(true)
}

// ============================================================================
// Contract Implementations
// ============================================================================

#[async_trait]
impl MetadataProvider for MemoryStore {
    async fn describe(&self, entity_type: &str) -> Result<EntityMetadata, StoreError> {
        self.calls.lock().describe.push(entity_type.to_string());
        self.pause().await;

        if self.faults.read().describe.contains(entity_type) {
            return Err(StoreError::Transport(format!(
                "metadata for `{entity_type}` unavailable"
            )));
        }
        self.data
            .read()
            .entities
            .get(entity_type)
            .map(|table| table.metadata.clone())
            .ok_or_else(|| StoreError::UnknownEntity(entity_type.to_string()))
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn fetch_one(
        &self,
        entity: &str,
        id: &str,
        fields: &[String],
    ) -> Result<Record, StoreError> {
        self.calls
            .lock()
            .fetch_one
            .push((entity.to_string(), id.to_string()));
        self.pause().await;
        self.check_fetch_fault(entity)?;

        let data = self.data.read();
        let table = data
            .entities
            .get(entity)
            .ok_or_else(|| StoreError::UnknownEntity(entity.to_string()))?;
        table
            .records
            .iter()
            .find(|r| {
                record_str(r, &table.metadata.id_attribute)
                    .map(|rid| matching::id_eq(&rid, id))
                    .unwrap_or(false)
            })
            .map(|r| matching::project(r, fields))
            .ok_or_else(|| StoreError::NotFound {
                entity: entity.to_string(),
                id: id.to_string(),
            })
    }

    async fn fetch_many(
        &self,
        entity: &str,
        query: &RecordQuery,
    ) -> Result<Vec<Record>, StoreError> {
        self.calls
            .lock()
            .fetch_many
            .push((entity.to_string(), query.clone()));
        self.pause().await;
        self.check_fetch_fault(entity)?;

        let data = self.data.read();
        let table = data
            .entities
            .get(entity)
            .ok_or_else(|| StoreError::UnknownEntity(entity.to_string()))?;

        let mut rows: Vec<&Record> = table
            .records
            .iter()
            .filter(|r| {
                query
                    .filter
                    .as_ref()
                    .map_or(true, |f| matching::matches(f, r, self.config.match_case))
            })
            .collect();
        if let Some(order_by) = &query.order_by {
            rows.sort_by(|a, b| matching::compare(a, b, order_by, self.config.match_case));
        }
        if let Some(top) = query.top {
            rows.truncate(top);
        }

        tracing::debug!(entity, query = %query.to_query_options(), rows = rows.len(), "fetch_many");
        Ok(rows
            .into_iter()
            .map(|r| matching::project(r, &query.select))
            .collect())
    }

    async fn link(&self, association: &Association) -> Result<(), StoreError> {
        self.calls.lock().links.push(association.key());
        let _in_flight = self.enter();
        self.pause().await;

        if self.faults.read().link.contains(&association.related.id) {
            return Err(StoreError::Rejected(format!(
                "link of `{}` refused",
                association.related.id
            )));
        }

        let mut data = self.data.write();
        let columns = resolve_association(&data, association)?;
        let table = data
            .entities
            .get_mut(&columns.junction_entity)
            .ok_or_else(|| StoreError::UnknownEntity(columns.junction_entity.clone()))?;

        if table
            .records
            .iter()
            .any(|row| is_link_row(row, &columns, association))
        {
            return Err(StoreError::AlreadyLinked {
                relationship: association.relationship_name.clone(),
                host_id: association.host.id.clone(),
                related_id: association.related.id.clone(),
            });
        }

        let mut row = Record::new();
        row.insert(columns.host_attribute, association.host.id.clone().into());
        row.insert(columns.related_attribute, association.related.id.clone().into());
        table.records.push(row);
        Ok(())
    }

    async fn unlink(&self, association: &Association) -> Result<(), StoreError> {
        self.calls.lock().unlinks.push(association.key());
        let _in_flight = self.enter();
        self.pause().await;

        if self.faults.read().unlink.contains(&association.related.id) {
            return Err(StoreError::Rejected(format!(
                "unlink of `{}` refused",
                association.related.id
            )));
        }

        let mut data = self.data.write();
        let columns = resolve_association(&data, association)?;
        let table = data
            .entities
            .get_mut(&columns.junction_entity)
            .ok_or_else(|| StoreError::UnknownEntity(columns.junction_entity.clone()))?;

        let before = table.records.len();
        table
            .records
            .retain(|row| !is_link_row(row, &columns, association));
        if table.records.len() == before {
            return Err(StoreError::NotLinked {
                relationship: association.relationship_name.clone(),
                host_id: association.host.id.clone(),
                related_id: association.related.id.clone(),
            });
        }
        Ok(())
    }
}
