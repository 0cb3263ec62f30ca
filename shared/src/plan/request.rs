//! Request and response payloads for the plan API

use super::{EntryKind, MealSlot, PlanEntry};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Inclusive date range for listing, e.g. one visible calendar week
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Error)]
#[error("invalid range: start {start} is after end {end}")]
pub struct InvalidRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PlanRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, InvalidRange> {
        if start > end {
            return Err(InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// POST /api/plan
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEntryRequest {
    pub date: NaiveDate,
    pub slot: MealSlot,
    pub kind: EntryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// PUT /api/plan/{id} - field patch, never touches date/slot/order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEntryRequest {
    pub title: String,
}

/// POST /api/plan/{id}/move
///
/// `target_index` may exceed the target bucket length; the engine clamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveEntryRequest {
    pub target_date: NaiveDate,
    pub target_slot: MealSlot,
    pub target_index: u32,
}

/// Response to create
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedReceipt {
    pub id: String,
}

/// Response to delete
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReceipt {
    pub success: bool,
}

/// Response to move
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveReceipt {
    pub success: bool,
    /// `false` when the move was a positional no-op (nothing written)
    pub moved: bool,
}

/// Response to update - acknowledgement only, completion arrives via the feed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReceipt {
    pub success: bool,
}

/// Read-only recipe metadata supplied by the external recipe collaborator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecipeMeta {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servings: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories: Option<u32>,
}

/// A plan entry decorated for display
///
/// `recipe` is denormalized from the recipe collaborator at list time and is
/// `None` for notes, for dangling recipe references, and for entries that
/// arrived over the feed (the feed carries bare entries).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntryView {
    #[serde(flatten)]
    pub entry: PlanEntry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe: Option<RecipeMeta>,
}

impl EntryView {
    pub fn bare(entry: PlanEntry) -> Self {
        Self {
            entry,
            recipe: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_rejects_inverted_bounds() {
        let start = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        assert!(PlanRange::new(start, end).is_err());
        assert!(PlanRange::new(end, start).is_ok());
        assert!(PlanRange::new(end, end).is_ok());
    }

    #[test]
    fn test_view_flattens_entry_fields() {
        let view = EntryView::bare(PlanEntry {
            id: "e1".to_string(),
            owner_id: "alice".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            slot: MealSlot::Morning,
            sort_order: 1,
            kind: EntryKind::Recipe,
            recipe_id: Some("r9".to_string()),
            title: None,
            created_at: 0,
            updated_at: 0,
        });
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["id"], "e1");
        assert_eq!(json["recipeId"], "r9");
        assert!(json.get("recipe").is_none());
    }
}
