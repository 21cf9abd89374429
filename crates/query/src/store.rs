//! Storage abstraction and an in-memory implementation.
//!
//! - [`Storage`] is the contract steps use to read and write records
//! - [`MemoryStore`] keeps tables in process memory, for prototyping and tests
//! - [`QueryOptions`] carries the `where` condition and column projection
//!
//! Reads, updates and removals all select records with the same match engine.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use mblock_types::{RECORD_ID_FIELD, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{MatchCondition, StoreError};

/// Options accepted by read/update/remove operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Match condition in any accepted shape. `None` selects every record.
    #[serde(rename = "where", default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,
    /// Columns to keep in returned records. `None` keeps every field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
}

impl QueryOptions {
    pub fn with_condition(condition: Value) -> Self {
        Self {
            condition: Some(condition),
            columns: None,
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Returns a copy with the fields present in `overrides` taking precedence.
    ///
    /// `overrides` is usually the output of a previous step; anything that is
    /// not an object leaves the options unchanged.
    pub fn merged_with(&self, overrides: &Value) -> QueryOptions {
        let mut merged = self.clone();
        let Value::Object(fields) = overrides else {
            return merged;
        };
        if let Some(condition) = fields.get("where").filter(|condition| !condition.is_null()) {
            merged.condition = Some(condition.clone());
        }
        if let Some(Value::Array(columns)) = fields.get("columns") {
            merged.columns = Some(columns.iter().filter_map(Value::as_str).map(str::to_string).collect());
        }
        merged
    }

    /// Adds `condition` to the existing condition as an AND.
    pub fn and_condition(mut self, condition: Value) -> Self {
        self.condition = Some(match self.condition.take() {
            None | Some(Value::Null) => condition,
            Some(existing) => serde_json::json!({ "and": [existing, condition] }),
        });
        self
    }

    /// Adds `field == value` to the condition, keeping any existing condition.
    pub fn and_field_equals(self, field: &str, value: Value) -> Self {
        self.and_condition(serde_json::json!({ field: value }))
    }

    /// Normalizes the `where` condition. No condition matches every record.
    pub fn compile(&self) -> Result<MatchCondition, StoreError> {
        match &self.condition {
            Some(condition) => Ok(MatchCondition::normalize(condition)?),
            None => Ok(MatchCondition::always()),
        }
    }

    /// Copies `record` keeping only the configured `columns`.
    pub fn project(&self, record: &Record) -> Record {
        project(record, self.columns.as_deref())
    }

    fn require_condition(&self, operation: &str) -> Result<(), StoreError> {
        match &self.condition {
            Some(condition) if !condition.is_null() => Ok(()),
            _ => Err(StoreError::missing_where(operation)),
        }
    }
}

/// Record storage consumed by database steps.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Every record in `table` matching the options, projected onto `columns`.
    async fn find_many(&self, table: &str, options: &QueryOptions) -> Result<Vec<Record>, StoreError>;

    /// The first matching record. A `where` condition is required.
    async fn find_one(&self, table: &str, options: &QueryOptions) -> Result<Option<Record>, StoreError> {
        options.require_condition("find_one")?;
        Ok(self.find_many(table, options).await?.into_iter().next())
    }

    /// Inserts or replaces a record keyed by its `id`.
    async fn save(&self, table: &str, record: Record) -> Result<Record, StoreError>;

    /// Shallow-merges `patch` into every matching record and returns the updated records.
    ///
    /// Record ids are fixed at save time; an `id` in the patch is ignored.
    async fn update(&self, table: &str, patch: Record, options: &QueryOptions) -> Result<Vec<Record>, StoreError>;

    /// Deletes every matching record and returns the removed ids.
    async fn remove(&self, table: &str, options: &QueryOptions) -> Result<Vec<Value>, StoreError>;
}

type Table = IndexMap<String, Record>;

/// In-memory [`Storage`] backed by insertion-ordered tables.
///
/// Cloning shares the underlying tables. Nothing is persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<IndexMap<String, Table>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with empty tables named by `tables`.
    pub fn with_tables<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tables = tables.into_iter().map(|name| (name.into(), Table::new())).collect();
        Self {
            tables: Arc::new(RwLock::new(tables)),
        }
    }

    /// Creates `table` if it does not exist yet.
    pub async fn create_table(&self, table: &str) {
        self.tables.write().await.entry(table.to_string()).or_default();
    }

    /// Copies every record of `table` without applying any condition.
    pub async fn snapshot(&self, table: &str) -> Result<Vec<Record>, StoreError> {
        let tables = self.tables.read().await;
        let rows = tables.get(table).ok_or_else(|| StoreError::no_such_table(table))?;
        Ok(rows.values().cloned().collect())
    }

    /// Keys of the records in `table` that match `condition`.
    fn matching_keys(rows: &Table, condition: &MatchCondition) -> Vec<String> {
        rows.iter()
            .filter(|(_, record)| condition.evaluate(record))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn find_many(&self, table: &str, options: &QueryOptions) -> Result<Vec<Record>, StoreError> {
        let condition = options.compile()?;
        let tables = self.tables.read().await;
        let rows = tables.get(table).ok_or_else(|| StoreError::no_such_table(table))?;

        let results: Vec<Record> = rows
            .values()
            .filter(|record| condition.evaluate(record))
            .map(|record| project(record, options.columns.as_deref()))
            .collect();
        debug!(table = %table, result_count = results.len(), "memory store find");
        Ok(results)
    }

    async fn save(&self, table: &str, record: Record) -> Result<Record, StoreError> {
        let key = record
            .get(RECORD_ID_FIELD)
            .filter(|id| !id.is_null())
            .map(record_key)
            .ok_or_else(|| StoreError::missing_id(table))?;

        let mut tables = self.tables.write().await;
        let rows = tables.get_mut(table).ok_or_else(|| StoreError::no_such_table(table))?;
        rows.insert(key, record.clone());
        debug!(table = %table, "memory store save");
        Ok(record)
    }

    async fn update(&self, table: &str, mut patch: Record, options: &QueryOptions) -> Result<Vec<Record>, StoreError> {
        options.require_condition("update")?;
        let condition = options.compile()?;
        if patch.remove(RECORD_ID_FIELD).is_some() {
            debug!(table = %table, "ignoring id in update patch");
        }

        let mut tables = self.tables.write().await;
        let rows = tables.get_mut(table).ok_or_else(|| StoreError::no_such_table(table))?;
        let keys = Self::matching_keys(rows, &condition);
        if keys.is_empty() {
            return Err(StoreError::no_record_found(table));
        }

        let mut updated = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(record) = rows.get_mut(&key) {
                record.extend(patch.clone());
                updated.push(record.clone());
            }
        }
        debug!(table = %table, updated_count = updated.len(), "memory store update");
        Ok(updated)
    }

    async fn remove(&self, table: &str, options: &QueryOptions) -> Result<Vec<Value>, StoreError> {
        options.require_condition("remove")?;
        let condition = options.compile()?;

        let mut tables = self.tables.write().await;
        let rows = tables.get_mut(table).ok_or_else(|| StoreError::no_such_table(table))?;
        let keys = Self::matching_keys(rows, &condition);
        if keys.is_empty() {
            return Err(StoreError::no_record_found(table));
        }

        let removed: Vec<Value> = keys
            .iter()
            .filter_map(|key| rows.shift_remove(key))
            .map(|record| record.get(RECORD_ID_FIELD).cloned().unwrap_or(Value::Null))
            .collect();
        debug!(table = %table, removed_count = removed.len(), "memory store remove");
        Ok(removed)
    }
}

fn record_key(id: &Value) -> String {
    match id {
        Value::String(id) => id.clone(),
        other => other.to_string(),
    }
}

fn project(record: &Record, columns: Option<&[String]>) -> Record {
    let Some(columns) = columns else {
        return record.clone();
    };
    columns
        .iter()
        .filter_map(|column| record.get(column).map(|value| (column.clone(), value.clone())))
        .collect()
}
