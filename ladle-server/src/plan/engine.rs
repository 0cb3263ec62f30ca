//! Ordering engine for planned entries
//!
//! Every operation runs inside one store transaction and leaves each
//! touched bucket with a dense sort order: for n members the orders are
//! exactly 0..n-1. Access control happens in the service layer before any
//! of these are called; the engine only sees requests for one household.

use chrono::NaiveDate;
use shared::plan::request::{CreateEntryRequest, MoveEntryRequest};
use shared::util::now_millis;
use shared::{EntryKind, MealSlot, PlanEntry, SlotPosition};
use uuid::Uuid;

use super::error::{PlanError, PlanResult};
use super::store::{PlanStore, StoreError};

/// Result of a move operation
///
/// `target_positions`/`source_positions` describe the complete post-state
/// of the affected buckets so the caller can broadcast exact orderings.
/// Both are empty when `moved` is false.
#[derive(Debug, Clone)]
pub struct MoveOutcome {
    pub entry: PlanEntry,
    pub moved: bool,
    pub target_positions: Vec<SlotPosition>,
    /// Post-state of the source bucket; `None` for a same-bucket reorder
    pub source_positions: Option<Vec<SlotPosition>>,
    pub old_date: NaiveDate,
    pub old_slot: MealSlot,
    pub old_sort_order: u32,
}

impl MoveOutcome {
    fn unchanged(entry: PlanEntry) -> Self {
        let (old_date, old_slot, old_sort_order) = (entry.date, entry.slot, entry.sort_order);
        Self {
            entry,
            moved: false,
            target_positions: Vec::new(),
            source_positions: None,
            old_date,
            old_slot,
            old_sort_order,
        }
    }
}

/// Result of a delete operation: the removed entry plus the reindexed
/// post-state of its bucket
#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    pub entry: PlanEntry,
    pub positions: Vec<SlotPosition>,
}

/// Transactional create/delete/update/move over the plan store
#[derive(Clone)]
pub struct PlanEngine {
    store: PlanStore,
}

impl PlanEngine {
    pub fn new(store: PlanStore) -> Self {
        Self { store }
    }

    /// Create an entry at the tail of its bucket
    ///
    /// The new sort order is max(bucket) + 1, or 0 for an empty bucket.
    /// The bucket is scoped to the whole household, not just the owner.
    pub fn create(
        &self,
        household: &str,
        owner_id: &str,
        req: &CreateEntryRequest,
    ) -> PlanResult<PlanEntry> {
        validate_kind_payload(req.kind, req.recipe_id.as_deref(), req.title.as_deref())?;

        let txn = self.store.begin_write()?;
        let siblings = self
            .store
            .bucket_entries_txn(&txn, household, req.date, req.slot)?;
        let next_order = siblings
            .iter()
            .map(|e| e.sort_order)
            .max()
            .map_or(0, |max| max + 1);

        let now = now_millis();
        let entry = PlanEntry {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            date: req.date,
            slot: req.slot,
            sort_order: next_order,
            kind: req.kind,
            recipe_id: req.recipe_id.clone(),
            title: req.title.clone(),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_entry(&txn, household, &entry)?;
        txn.commit().map_err(StoreError::from)?;
        Ok(entry)
    }

    /// Get an entry by id
    pub fn get(&self, entry_id: &str) -> PlanResult<Option<PlanEntry>> {
        Ok(self.store.get_entry(entry_id)?)
    }

    /// List every entry of a household in an inclusive date range,
    /// ordered by date, slot, sort order
    pub fn list_range(
        &self,
        household: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PlanResult<Vec<PlanEntry>> {
        Ok(self.store.range_entries(household, start, end)?)
    }

    /// Delete an entry and close the gap it leaves behind
    ///
    /// The remaining bucket members are rewritten to positions 0..n-1 in
    /// their current relative order. Returns `None` when the entry is
    /// already gone (benign no-op, nothing to broadcast).
    pub fn delete(&self, household: &str, entry_id: &str) -> PlanResult<Option<DeleteOutcome>> {
        let txn = self.store.begin_write()?;
        let Some(entry) = self.store.get_entry_txn(&txn, entry_id)? else {
            return Ok(None);
        };

        self.store.remove_entry(&txn, household, &entry)?;

        let mut rest = self
            .store
            .bucket_entries_txn(&txn, household, entry.date, entry.slot)?;
        let mut positions = Vec::with_capacity(rest.len());
        for (index, sibling) in rest.iter_mut().enumerate() {
            let want = index as u32;
            if sibling.sort_order != want {
                sibling.sort_order = want;
                self.store.write_entry_value(&txn, sibling)?;
            }
            positions.push(SlotPosition {
                entry_id: sibling.id.clone(),
                sort_order: want,
            });
        }

        txn.commit().map_err(StoreError::from)?;
        Ok(Some(DeleteOutcome { entry, positions }))
    }

    /// Patch the title of a note entry
    ///
    /// Never touches date, slot or sort order.
    pub fn update_title(&self, entry_id: &str, title: &str) -> PlanResult<PlanEntry> {
        if title.trim().is_empty() {
            return Err(PlanError::Validation("title must not be empty".to_string()));
        }

        let txn = self.store.begin_write()?;
        let Some(mut entry) = self.store.get_entry_txn(&txn, entry_id)? else {
            return Err(PlanError::NotFound(entry_id.to_string()));
        };
        if entry.kind != EntryKind::Note {
            return Err(PlanError::Validation(
                "only note entries carry a title".to_string(),
            ));
        }

        entry.title = Some(title.to_string());
        entry.updated_at = now_millis();
        self.store.write_entry_value(&txn, &entry)?;
        txn.commit().map_err(StoreError::from)?;
        Ok(entry)
    }

    /// Move an entry to (target date, target slot, target index)
    ///
    /// Shift algorithm: remove from the source list, clamp the index to
    /// [0, len], insert, then rewrite every position in the touched
    /// buckets. A request that names the entry's current position exactly
    /// short-circuits with zero writes and `moved: false`.
    pub fn move_entry(
        &self,
        household: &str,
        entry_id: &str,
        req: &MoveEntryRequest,
    ) -> PlanResult<MoveOutcome> {
        let txn = self.store.begin_write()?;
        let Some(mut entry) = self.store.get_entry_txn(&txn, entry_id)? else {
            return Err(PlanError::NotFound(entry_id.to_string()));
        };

        let (old_date, old_slot, old_sort_order) = (entry.date, entry.slot, entry.sort_order);
        let same_bucket = old_date == req.target_date && old_slot == req.target_slot;
        if same_bucket && old_sort_order == req.target_index {
            return Ok(MoveOutcome::unchanged(entry));
        }

        let mut source = self
            .store
            .bucket_entries_txn(&txn, household, old_date, old_slot)?;
        source.retain(|e| e.id != entry.id);

        let mut target = if same_bucket {
            std::mem::take(&mut source)
        } else {
            self.store
                .bucket_entries_txn(&txn, household, req.target_date, req.target_slot)?
        };

        let index = (req.target_index as usize).min(target.len());
        entry.date = req.target_date;
        entry.slot = req.target_slot;
        entry.sort_order = index as u32;
        entry.updated_at = now_millis();
        target.insert(index, entry.clone());

        if same_bucket {
            self.store.write_entry_value(&txn, &entry)?;
        } else {
            self.store
                .relocate_entry(&txn, household, old_date, old_slot, &entry)?;
        }

        let mut target_positions = Vec::with_capacity(target.len());
        for (index, sibling) in target.iter_mut().enumerate() {
            let want = index as u32;
            if sibling.id != entry.id && sibling.sort_order != want {
                sibling.sort_order = want;
                self.store.write_entry_value(&txn, sibling)?;
            }
            target_positions.push(SlotPosition {
                entry_id: sibling.id.clone(),
                sort_order: want,
            });
        }

        let source_positions = if same_bucket {
            None
        } else {
            let mut positions = Vec::with_capacity(source.len());
            for (index, sibling) in source.iter_mut().enumerate() {
                let want = index as u32;
                if sibling.sort_order != want {
                    sibling.sort_order = want;
                    self.store.write_entry_value(&txn, sibling)?;
                }
                positions.push(SlotPosition {
                    entry_id: sibling.id.clone(),
                    sort_order: want,
                });
            }
            Some(positions)
        };

        txn.commit().map_err(StoreError::from)?;
        Ok(MoveOutcome {
            entry,
            moved: true,
            target_positions,
            source_positions,
            old_date,
            old_slot,
            old_sort_order,
        })
    }
}

fn validate_kind_payload(
    kind: EntryKind,
    recipe_id: Option<&str>,
    title: Option<&str>,
) -> PlanResult<()> {
    match kind {
        EntryKind::Recipe => {
            if recipe_id.is_none_or(|r| r.trim().is_empty()) {
                return Err(PlanError::Validation(
                    "recipe entries require a recipeId".to_string(),
                ));
            }
            if title.is_some() {
                return Err(PlanError::Validation(
                    "recipe entries must not carry a title".to_string(),
                ));
            }
        }
        EntryKind::Note => {
            if title.is_none_or(|t| t.trim().is_empty()) {
                return Err(PlanError::Validation(
                    "note entries require a title".to_string(),
                ));
            }
            if recipe_id.is_some() {
                return Err(PlanError::Validation(
                    "note entries must not carry a recipeId".to_string(),
                ));
            }
        }
    }
    Ok(())
}
