//! Storage collaborator: schemaless tables of JSON records.
//!
//! Handlers talk to storage only through the [`Database`] trait, so the
//! in-memory [`MemoryDatabase`] can be swapped for another backend without
//! touching the router or the handlers.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde_json::{Map, Value};

/// A single stored record: a JSON object. Records are identified by their
/// `"id"` string field.
pub type Record = Map<String, Value>;

/// Field name → search term. See [`Database::select`].
pub type Filter = HashMap<String, String>;

/// The operations handlers need from storage.
pub trait Database: Send + Sync {
    /// All records of `table`, in insertion order.
    ///
    /// With a filter, a record is kept when ANY filter entry names a string
    /// field that contains the term, ignoring case. Unknown tables are empty.
    fn select(&self, table: &str, filter: Option<&Filter>) -> Vec<Record>;

    /// Append `record` to `table`, creating the table if needed.
    fn insert(&self, table: &str, record: Record) -> Record;

    /// Replace the record whose `id` is `id` with `data` plus that `id`.
    ///
    /// Returns `false` when no such record exists.
    fn update(&self, table: &str, id: &str, data: Record) -> bool;

    /// Remove the record whose `id` is `id`. Returns `false` when absent.
    fn delete(&self, table: &str, id: &str) -> bool;
}

/// A [`Database`] held entirely in process memory.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use users_api::database::{Database, Filter, MemoryDatabase};
///
/// let db = MemoryDatabase::new();
/// let record = json!({ "id": "1", "name": "Ann" }).as_object().unwrap().clone();
/// db.insert("users", record);
///
/// let filter = Filter::from([("name".to_owned(), "an".to_owned())]);
/// assert_eq!(db.select("users", Some(&filter)).len(), 1);
/// assert!(db.delete("users", "1"));
/// assert!(db.select("users", None).is_empty());
/// ```
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    tables: RwLock<HashMap<String, Vec<Record>>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Database for MemoryDatabase {
    fn select(&self, table: &str, filter: Option<&Filter>) -> Vec<Record> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let Some(rows) = tables.get(table) else {
            return Vec::new();
        };

        match filter {
            Some(filter) => rows
                .iter()
                .filter(|row| matches_any(row, filter))
                .cloned()
                .collect(),
            None => rows.clone(),
        }
    }

    fn insert(&self, table: &str, record: Record) -> Record {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        tables
            .entry(table.to_owned())
            .or_default()
            .push(record.clone());
        record
    }

    fn update(&self, table: &str, id: &str, data: Record) -> bool {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let Some(row) = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|row| has_id(row, id)))
        else {
            return false;
        };

        let mut replacement = Record::new();
        replacement.insert("id".to_owned(), Value::String(id.to_owned()));
        replacement.extend(data.into_iter().filter(|(key, _)| key != "id"));
        *row = replacement;
        true
    }

    fn delete(&self, table: &str, id: &str) -> bool {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let Some(rows) = tables.get_mut(table) else {
            return false;
        };
        match rows.iter().position(|row| has_id(row, id)) {
            Some(index) => {
                rows.remove(index);
                true
            }
            None => false,
        }
    }
}

fn has_id(row: &Record, id: &str) -> bool {
    row.get("id").and_then(Value::as_str) == Some(id)
}

fn matches_any(row: &Record, filter: &Filter) -> bool {
    filter.iter().any(|(field, term)| {
        row.get(field)
            .and_then(Value::as_str)
            .is_some_and(|value| value.to_lowercase().contains(&term.to_lowercase()))
    })
}
