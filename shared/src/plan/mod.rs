//! Plan entry model - the unit of scheduling on the household calendar
//!
//! A calendar day is divided into four meal slots; each slot of each day
//! holds a densely ordered list of entries. Ordering is always scoped to a
//! bucket: the `(household, date, slot)` triple.

pub mod event;
pub mod request;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Meal slot within a day
///
/// The numeric code is the storage-key encoding and must stay stable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum MealSlot {
    Morning,
    Midday,
    Evening,
    Extra,
}

impl MealSlot {
    pub const ALL: [MealSlot; 4] = [
        MealSlot::Morning,
        MealSlot::Midday,
        MealSlot::Evening,
        MealSlot::Extra,
    ];

    /// Stable numeric code used in composite storage keys
    pub fn code(&self) -> u8 {
        match self {
            MealSlot::Morning => 0,
            MealSlot::Midday => 1,
            MealSlot::Evening => 2,
            MealSlot::Extra => 3,
        }
    }

    /// Inverse of [`code()`](Self::code); `None` for unknown codes
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(MealSlot::Morning),
            1 => Some(MealSlot::Midday),
            2 => Some(MealSlot::Evening),
            3 => Some(MealSlot::Extra),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MealSlot::Morning => "morning",
            MealSlot::Midday => "midday",
            MealSlot::Evening => "evening",
            MealSlot::Extra => "extra",
        }
    }
}

impl std::fmt::Display for MealSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Entry kind - what a plan entry points at
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// References a recipe in the external recipe collection
    Recipe,
    /// Free-form note with its own title
    Note,
}

/// A planned item on the calendar
///
/// Entries are owned by the user who created them but visible and editable
/// by the whole household. `sort_order` is dense within the entry's bucket:
/// after every committed mutation the orders in one bucket are exactly
/// `0..n`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanEntry {
    /// Entry unique ID (UUID v4)
    pub id: String,
    /// User who created the entry
    pub owner_id: String,
    /// Calendar date (no time component)
    pub date: NaiveDate,
    /// Meal slot within the date
    pub slot: MealSlot,
    /// Dense position within the bucket, starting at 0
    pub sort_order: u32,
    /// Recipe reference or note
    pub kind: EntryKind,
    /// Set iff `kind == Recipe`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe_id: Option<String>,
    /// Set iff `kind == Note`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
    /// Last mutation timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl PlanEntry {
    /// Type consistency: `recipe_id` iff recipe, `title` iff note.
    pub fn is_type_consistent(&self) -> bool {
        match self.kind {
            EntryKind::Recipe => self.recipe_id.is_some() && self.title.is_none(),
            EntryKind::Note => self.title.is_some() && self.recipe_id.is_none(),
        }
    }

    /// The bucket this entry currently lives in
    pub fn bucket(&self, household: &str) -> BucketKey {
        BucketKey {
            household: household.to_string(),
            date: self.date,
            slot: self.slot,
        }
    }
}

/// Bucket key - the scope of the ordering invariant
///
/// Not a stored entity; derived from an entry plus the household it is
/// visible to. All reindexing is confined to one bucket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct BucketKey {
    pub household: String,
    pub date: NaiveDate,
    pub slot: MealSlot,
}

/// One entry's authoritative position after a structural mutation
///
/// Move and delete events carry the complete position list of every bucket
/// they rewrote, so subscribers overwrite instead of recomputing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SlotPosition {
    pub entry_id: String,
    pub sort_order: u32,
}
