//! Range cache - the session's local copy of one visible calendar window
//!
//! Two write paths feed the cache, mirroring the server contract:
//!
//! - **Speculative**: `apply_delete`/`apply_move`/`apply_update_title` run
//!   the same positional-shift rules as the server engine so the UI never
//!   waits on the network. Callers snapshot first and restore on rejection.
//! - **Authoritative**: `apply_event` folds in feed events. Position lists
//!   carried by `EntryMoved`/`EntryDeleted` overwrite local sort orders
//!   wholesale instead of being recomputed; the server result is ground
//!   truth, which keeps every session convergent even after speculation
//!   drifted.
//!
//! Snapshots are taken and restored by value, so a gesture and a broadcast
//! update never share mutable structures.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use shared::plan::request::{EntryView, PlanRange};
use shared::{MealSlot, PlanEntry, PlanEvent, PlanEventPayload, SlotPosition};

/// Per-bucket entry-id ordering, keyed by (date, slot)
pub type BucketLayout = BTreeMap<(NaiveDate, MealSlot), Vec<String>>;

/// Outcome of folding one feed event into the cache
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Cache updated in place
    Applied,
    /// The event invalidates local state; the caller must refetch the range
    RefetchRequired,
}

/// By-value snapshot of the cache contents, for optimistic rollback
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    entries: Vec<EntryView>,
}

/// Flat list of entries known for one open date range
///
/// Kept sorted by (date, slot, position) at all times.
#[derive(Debug, Clone)]
pub struct RangeCache {
    range: PlanRange,
    entries: Vec<EntryView>,
}

impl RangeCache {
    pub fn new(range: PlanRange) -> Self {
        Self {
            range,
            entries: Vec::new(),
        }
    }

    pub fn range(&self) -> PlanRange {
        self.range
    }

    /// Replace the contents wholesale, e.g. after a list call
    pub fn fill(&mut self, entries: Vec<EntryView>) {
        self.entries = entries;
        self.resort();
    }

    pub fn entries(&self) -> &[EntryView] {
        &self.entries
    }

    pub fn get(&self, entry_id: &str) -> Option<&EntryView> {
        self.entries.iter().find(|v| v.entry.id == entry_id)
    }

    /// Entry ids of one bucket in display order
    pub fn bucket_ids(&self, date: NaiveDate, slot: MealSlot) -> Vec<String> {
        self.entries
            .iter()
            .filter(|v| v.entry.date == date && v.entry.slot == slot)
            .map(|v| v.entry.id.clone())
            .collect()
    }

    /// The full per-bucket id-ordering map, as snapshotted by drag gestures
    pub fn bucket_layout(&self) -> BucketLayout {
        let mut layout = BucketLayout::new();
        for view in &self.entries {
            layout
                .entry((view.entry.date, view.entry.slot))
                .or_default()
                .push(view.entry.id.clone());
        }
        layout
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            entries: self.entries.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: CacheSnapshot) {
        self.entries = snapshot.entries;
    }

    // ========================================================================
    // Speculative path - local mirror of the engine's shift rules
    // ========================================================================

    /// Remove an entry and compact its bucket; `false` when absent
    pub fn apply_delete(&mut self, entry_id: &str) -> bool {
        let Some(view) = self.take_entry(entry_id) else {
            return false;
        };
        self.reindex_bucket(view.entry.date, view.entry.slot);
        true
    }

    /// Move an entry to a (date, slot, index) target; `false` when nothing
    /// changes
    ///
    /// Same decision order as the engine: a literal positional no-op is
    /// detected before any clamping, the source bucket compacts, the target
    /// index clamps to the bucket length. Targets outside the cached range
    /// drop the entry from view.
    pub fn apply_move(
        &mut self,
        entry_id: &str,
        target_date: NaiveDate,
        target_slot: MealSlot,
        target_index: u32,
    ) -> bool {
        let Some(pos) = self.entries.iter().position(|v| v.entry.id == entry_id) else {
            return false;
        };
        {
            let entry = &self.entries[pos].entry;
            if entry.date == target_date
                && entry.slot == target_slot
                && entry.sort_order == target_index
            {
                return false;
            }
        }

        let mut view = self.entries.remove(pos);
        let source_date = view.entry.date;
        let source_slot = view.entry.slot;
        self.reindex_bucket(source_date, source_slot);

        if !self.range.contains(target_date) {
            // moved off the visible window
            return true;
        }

        let mut bucket = self.bucket_ids(target_date, target_slot);
        let index = (target_index as usize).min(bucket.len());
        bucket.insert(index, view.entry.id.clone());

        view.entry.date = target_date;
        view.entry.slot = target_slot;
        self.entries.push(view);

        for (order, id) in bucket.iter().enumerate() {
            self.set_order(id, order as u32);
        }
        self.resort();
        true
    }

    /// Retitle locally; the authoritative entry arrives over the feed
    pub fn apply_update_title(&mut self, entry_id: &str, title: &str) -> bool {
        match self.entries.iter_mut().find(|v| v.entry.id == entry_id) {
            Some(view) => {
                view.entry.title = Some(title.to_string());
                true
            }
            None => false,
        }
    }

    // ========================================================================
    // Authoritative path - feed reconciliation
    // ========================================================================

    /// Fold one committed change into the cache
    ///
    /// Events are idempotent with respect to the originator's own speculative
    /// edits: position lists overwrite whatever the speculation produced.
    pub fn apply_event(&mut self, event: &PlanEvent) -> Reconciliation {
        match &event.payload {
            PlanEventPayload::EntryCreated { entry } => {
                if self.range.contains(entry.date) {
                    self.upsert(entry.clone());
                    self.resort();
                }
                Reconciliation::Applied
            }
            PlanEventPayload::EntryDeleted {
                entry_id,
                positions,
                ..
            } => {
                self.take_entry(entry_id);
                self.overwrite_positions(positions);
                self.resort();
                Reconciliation::Applied
            }
            PlanEventPayload::EntryMoved {
                entry,
                target_positions,
                source_positions,
                ..
            } => {
                let recipe = self.take_entry(&entry.id).and_then(|v| v.recipe);
                if self.range.contains(entry.date) {
                    self.entries.push(EntryView {
                        entry: entry.clone(),
                        recipe,
                    });
                }
                self.overwrite_positions(target_positions);
                if let Some(source) = source_positions {
                    self.overwrite_positions(source);
                }
                self.resort();
                Reconciliation::Applied
            }
            PlanEventPayload::EntryUpdated { entry } => {
                if self.range.contains(entry.date) {
                    self.upsert(entry.clone());
                    self.resort();
                }
                Reconciliation::Applied
            }
            PlanEventPayload::UpdateFailed { .. } => Reconciliation::RefetchRequired,
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn take_entry(&mut self, entry_id: &str) -> Option<EntryView> {
        let pos = self.entries.iter().position(|v| v.entry.id == entry_id)?;
        Some(self.entries.remove(pos))
    }

    /// Replace an entry's fields, keeping any recipe decoration already held
    /// (feed events carry bare entries)
    fn upsert(&mut self, entry: PlanEntry) {
        let recipe = self.take_entry(&entry.id).and_then(|v| v.recipe);
        self.entries.push(EntryView { entry, recipe });
    }

    fn set_order(&mut self, entry_id: &str, order: u32) {
        if let Some(view) = self.entries.iter_mut().find(|v| v.entry.id == entry_id) {
            view.entry.sort_order = order;
        }
    }

    fn reindex_bucket(&mut self, date: NaiveDate, slot: MealSlot) {
        let ids = self.bucket_ids(date, slot);
        for (order, id) in ids.iter().enumerate() {
            self.set_order(id, order as u32);
        }
    }

    fn overwrite_positions(&mut self, positions: &[SlotPosition]) {
        for pos in positions {
            self.set_order(&pos.entry_id, pos.sort_order);
        }
    }

    fn resort(&mut self) {
        self.entries
            .sort_by_key(|v| (v.entry.date, v.entry.slot.code(), v.entry.sort_order));
    }
}
