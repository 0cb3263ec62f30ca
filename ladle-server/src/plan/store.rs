//! redb-based storage layer for planned entries
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `entries` | `entry_id` | `PlanEntry` (JSON) | Entry records |
//! | `buckets` | `(household, date, slot, entry_id)` | `()` | Bucket membership index |
//!
//! The composite `buckets` key makes one range scan per bucket possible:
//! all members of `(household, date, slot)` are contiguous in key order.
//! Entries come back in id order from the index, so callers sort by
//! `sort_order` after loading.
//!
//! # Durability
//!
//! redb commits with `Durability::Immediate`: once `commit()` returns, the
//! mutation survives power loss and the file is always in a consistent
//! state. The single-writer model of redb is also what serializes
//! concurrent mutations against the same buckets.

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use chrono::NaiveDate;
use shared::{MealSlot, PlanEntry};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Entry records: key = entry id, value = JSON-serialized PlanEntry
const ENTRIES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("entries");

/// Bucket membership index: key = (household, ISO date, slot code, entry id)
const BUCKETS_TABLE: TableDefinition<(&str, &str, u8, &str), ()> = TableDefinition::new("buckets");

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Plan entry storage backed by redb
#[derive(Clone)]
pub struct PlanStore {
    db: Arc<Database>,
}

impl PlanStore {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = Database::create(path)?;
        Self::init_tables(db)
    }

    /// Open an in-memory database, for tests and embedded in-process setups
    pub fn open_in_memory() -> StoreResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init_tables(db)
    }

    fn init_tables(db: Database) -> StoreResult<Self> {
        // Create all tables if they don't exist
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ENTRIES_TABLE)?;
            let _ = write_txn.open_table(BUCKETS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> StoreResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    // ========== Entry Operations (within transaction) ==========

    /// Insert a new entry: value record plus bucket index row
    pub fn insert_entry(
        &self,
        txn: &WriteTransaction,
        household: &str,
        entry: &PlanEntry,
    ) -> StoreResult<()> {
        let value = serde_json::to_vec(entry)?;
        {
            let mut entries = txn.open_table(ENTRIES_TABLE)?;
            entries.insert(entry.id.as_str(), value.as_slice())?;
        }
        let mut buckets = txn.open_table(BUCKETS_TABLE)?;
        let date = date_key(entry.date);
        buckets.insert(
            (household, date.as_str(), entry.slot.code(), entry.id.as_str()),
            (),
        )?;
        Ok(())
    }

    /// Rewrite an entry value without touching the bucket index
    ///
    /// Used for sort-order reindexing and title edits, where the entry
    /// stays in its bucket.
    pub fn write_entry_value(&self, txn: &WriteTransaction, entry: &PlanEntry) -> StoreResult<()> {
        let mut entries = txn.open_table(ENTRIES_TABLE)?;
        let value = serde_json::to_vec(entry)?;
        entries.insert(entry.id.as_str(), value.as_slice())?;
        Ok(())
    }

    /// Remove an entry: value record plus bucket index row
    pub fn remove_entry(
        &self,
        txn: &WriteTransaction,
        household: &str,
        entry: &PlanEntry,
    ) -> StoreResult<()> {
        {
            let mut entries = txn.open_table(ENTRIES_TABLE)?;
            entries.remove(entry.id.as_str())?;
        }
        let mut buckets = txn.open_table(BUCKETS_TABLE)?;
        let date = date_key(entry.date);
        buckets.remove((household, date.as_str(), entry.slot.code(), entry.id.as_str()))?;
        Ok(())
    }

    /// Move an entry to a different bucket
    ///
    /// `entry` carries the new date/slot/sort order; the old index row is
    /// identified by `old_date`/`old_slot`.
    pub fn relocate_entry(
        &self,
        txn: &WriteTransaction,
        household: &str,
        old_date: NaiveDate,
        old_slot: MealSlot,
        entry: &PlanEntry,
    ) -> StoreResult<()> {
        {
            let mut buckets = txn.open_table(BUCKETS_TABLE)?;
            let old = date_key(old_date);
            buckets.remove((household, old.as_str(), old_slot.code(), entry.id.as_str()))?;
            let new = date_key(entry.date);
            buckets.insert(
                (household, new.as_str(), entry.slot.code(), entry.id.as_str()),
                (),
            )?;
        }
        self.write_entry_value(txn, entry)
    }

    /// Get an entry by id (within transaction)
    pub fn get_entry_txn(
        &self,
        txn: &WriteTransaction,
        entry_id: &str,
    ) -> StoreResult<Option<PlanEntry>> {
        let entries = txn.open_table(ENTRIES_TABLE)?;
        match entries.get(entry_id)? {
            Some(value) => {
                let entry: PlanEntry = serde_json::from_slice(value.value())?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// Get all members of a bucket, sorted by sort order (within transaction)
    pub fn bucket_entries_txn(
        &self,
        txn: &WriteTransaction,
        household: &str,
        date: NaiveDate,
        slot: MealSlot,
    ) -> StoreResult<Vec<PlanEntry>> {
        let buckets = txn.open_table(BUCKETS_TABLE)?;
        let entries = txn.open_table(ENTRIES_TABLE)?;

        let date = date_key(date);
        let code = slot.code();
        let range_start = (household, date.as_str(), code, "");
        let range_end = (household, date.as_str(), code + 1, "");

        let mut members = Vec::new();
        for result in buckets.range(range_start..range_end)? {
            let (key, _value) = result?;
            let entry_id = key.value().3;
            if let Some(value) = entries.get(entry_id)? {
                let entry: PlanEntry = serde_json::from_slice(value.value())?;
                members.push(entry);
            }
        }

        members.sort_by_key(|e| e.sort_order);
        Ok(members)
    }

    // ========== Read-only Operations ==========

    /// Get an entry by id
    pub fn get_entry(&self, entry_id: &str) -> StoreResult<Option<PlanEntry>> {
        let read_txn = self.db.begin_read()?;
        let entries = read_txn.open_table(ENTRIES_TABLE)?;
        match entries.get(entry_id)? {
            Some(value) => {
                let entry: PlanEntry = serde_json::from_slice(value.value())?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// Get all members of a bucket, sorted by sort order
    pub fn bucket_entries(
        &self,
        household: &str,
        date: NaiveDate,
        slot: MealSlot,
    ) -> StoreResult<Vec<PlanEntry>> {
        let read_txn = self.db.begin_read()?;
        let buckets = read_txn.open_table(BUCKETS_TABLE)?;
        let entries = read_txn.open_table(ENTRIES_TABLE)?;

        let date = date_key(date);
        let code = slot.code();
        let range_start = (household, date.as_str(), code, "");
        let range_end = (household, date.as_str(), code + 1, "");

        let mut members = Vec::new();
        for result in buckets.range(range_start..range_end)? {
            let (key, _value) = result?;
            let entry_id = key.value().3;
            if let Some(value) = entries.get(entry_id)? {
                let entry: PlanEntry = serde_json::from_slice(value.value())?;
                members.push(entry);
            }
        }

        members.sort_by_key(|e| e.sort_order);
        Ok(members)
    }

    /// Get every entry of a household within an inclusive date range
    ///
    /// Sorted by date, then slot, then sort order.
    pub fn range_entries(
        &self,
        household: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<PlanEntry>> {
        let read_txn = self.db.begin_read()?;
        let buckets = read_txn.open_table(BUCKETS_TABLE)?;
        let entries = read_txn.open_table(ENTRIES_TABLE)?;

        let start = date_key(start);
        let end = date_key(end);
        let range_start = (household, start.as_str(), 0u8, "");
        let range_end = (household, end.as_str(), u8::MAX, "");

        let mut members = Vec::new();
        for result in buckets.range(range_start..=range_end)? {
            let (key, _value) = result?;
            let entry_id = key.value().3;
            if let Some(value) = entries.get(entry_id)? {
                let entry: PlanEntry = serde_json::from_slice(value.value())?;
                members.push(entry);
            }
        }

        members.sort_by_key(|e| (e.date, e.slot.code(), e.sort_order));
        Ok(members)
    }

    /// Get storage statistics
    pub fn get_stats(&self) -> StoreResult<StoreStats> {
        let read_txn = self.db.begin_read()?;
        let entries = read_txn.open_table(ENTRIES_TABLE)?;
        let buckets = read_txn.open_table(BUCKETS_TABLE)?;

        Ok(StoreStats {
            entry_count: entries.len()?,
            index_count: buckets.len()?,
        })
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub entry_count: u64,
    pub index_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::EntryKind;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn note(id: &str, d: u32, slot: MealSlot, order: u32) -> PlanEntry {
        PlanEntry {
            id: id.to_string(),
            owner_id: "alice".to_string(),
            date: date(d),
            slot,
            sort_order: order,
            kind: EntryKind::Note,
            recipe_id: None,
            title: Some(format!("note {}", id)),
            created_at: shared::util::now_millis(),
            updated_at: shared::util::now_millis(),
        }
    }

    #[test]
    fn test_insert_and_get() {
        let store = PlanStore::open_in_memory().unwrap();
        let entry = note("e1", 2, MealSlot::Morning, 0);

        let txn = store.begin_write().unwrap();
        store.insert_entry(&txn, "home", &entry).unwrap();
        txn.commit().unwrap();

        let loaded = store.get_entry("e1").unwrap().unwrap();
        assert_eq!(loaded.id, "e1");
        assert_eq!(loaded.slot, MealSlot::Morning);
        assert!(store.get_entry("missing").unwrap().is_none());
    }

    #[test]
    fn test_bucket_scan_sorted_by_order() {
        let store = PlanStore::open_in_memory().unwrap();

        // Insert out of order; ids sort differently than sort_order
        let txn = store.begin_write().unwrap();
        store.insert_entry(&txn, "home", &note("a", 2, MealSlot::Evening, 2)).unwrap();
        store.insert_entry(&txn, "home", &note("b", 2, MealSlot::Evening, 0)).unwrap();
        store.insert_entry(&txn, "home", &note("c", 2, MealSlot::Evening, 1)).unwrap();
        txn.commit().unwrap();

        let members = store.bucket_entries("home", date(2), MealSlot::Evening).unwrap();
        let ids: Vec<&str> = members.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_bucket_scan_does_not_leak_neighbors() {
        let store = PlanStore::open_in_memory().unwrap();

        let txn = store.begin_write().unwrap();
        store.insert_entry(&txn, "home", &note("e1", 2, MealSlot::Morning, 0)).unwrap();
        store.insert_entry(&txn, "home", &note("e2", 2, MealSlot::Midday, 0)).unwrap();
        store.insert_entry(&txn, "home", &note("e3", 3, MealSlot::Morning, 0)).unwrap();
        store.insert_entry(&txn, "other", &note("e4", 2, MealSlot::Morning, 0)).unwrap();
        txn.commit().unwrap();

        let members = store.bucket_entries("home", date(2), MealSlot::Morning).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, "e1");
    }

    #[test]
    fn test_range_scan_ordering() {
        let store = PlanStore::open_in_memory().unwrap();

        let txn = store.begin_write().unwrap();
        store.insert_entry(&txn, "home", &note("d3", 3, MealSlot::Morning, 0)).unwrap();
        store.insert_entry(&txn, "home", &note("d2b", 2, MealSlot::Evening, 1)).unwrap();
        store.insert_entry(&txn, "home", &note("d2a", 2, MealSlot::Evening, 0)).unwrap();
        store.insert_entry(&txn, "home", &note("d2m", 2, MealSlot::Morning, 0)).unwrap();
        store.insert_entry(&txn, "home", &note("d9", 9, MealSlot::Morning, 0)).unwrap();
        txn.commit().unwrap();

        let members = store.range_entries("home", date(2), date(3)).unwrap();
        let ids: Vec<&str> = members.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["d2m", "d2a", "d2b", "d3"]);
    }

    #[test]
    fn test_remove_entry_clears_index() {
        let store = PlanStore::open_in_memory().unwrap();
        let entry = note("e1", 2, MealSlot::Extra, 0);

        let txn = store.begin_write().unwrap();
        store.insert_entry(&txn, "home", &entry).unwrap();
        txn.commit().unwrap();

        let txn = store.begin_write().unwrap();
        store.remove_entry(&txn, "home", &entry).unwrap();
        txn.commit().unwrap();

        assert!(store.get_entry("e1").unwrap().is_none());
        assert!(store.bucket_entries("home", date(2), MealSlot::Extra).unwrap().is_empty());
        let stats = store.get_stats().unwrap();
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.index_count, 0);
    }

    #[test]
    fn test_relocate_entry_moves_index_row() {
        let store = PlanStore::open_in_memory().unwrap();
        let mut entry = note("e1", 2, MealSlot::Morning, 0);

        let txn = store.begin_write().unwrap();
        store.insert_entry(&txn, "home", &entry).unwrap();
        txn.commit().unwrap();

        let (old_date, old_slot) = (entry.date, entry.slot);
        entry.date = date(5);
        entry.slot = MealSlot::Evening;

        let txn = store.begin_write().unwrap();
        store.relocate_entry(&txn, "home", old_date, old_slot, &entry).unwrap();
        txn.commit().unwrap();

        assert!(store.bucket_entries("home", date(2), MealSlot::Morning).unwrap().is_empty());
        let members = store.bucket_entries("home", date(5), MealSlot::Evening).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, "e1");
    }

    #[test]
    fn test_reads_inside_write_transaction() {
        let store = PlanStore::open_in_memory().unwrap();

        let txn = store.begin_write().unwrap();
        store.insert_entry(&txn, "home", &note("e1", 2, MealSlot::Midday, 0)).unwrap();
        // Uncommitted write must be visible to reads in the same transaction
        let members = store.bucket_entries_txn(&txn, "home", date(2), MealSlot::Midday).unwrap();
        assert_eq!(members.len(), 1);
        assert!(store.get_entry_txn(&txn, "e1").unwrap().is_some());
        txn.commit().unwrap();
    }
}
