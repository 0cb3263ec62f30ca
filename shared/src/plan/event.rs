//! Plan events - facts broadcast after committed mutations
//!
//! One event is published per successful engine operation, on a topic scoped
//! to the sharing household. Every session subscribed to that household
//! receives every event, including the session that originated the mutation:
//! the originator's speculative cache state is confirmed (or corrected) by
//! the authoritative event instead of being trusted blindly.

use super::{MealSlot, PlanEntry, SlotPosition};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A committed calendar change
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanEvent {
    /// Event unique ID
    pub event_id: String,
    /// Broadcast topic - the sharing household key
    pub household: String,
    /// Server timestamp (Unix milliseconds)
    pub timestamp: i64,
    /// User whose request produced the event
    pub actor_id: String,
    /// Event type
    pub event_type: PlanEventType,
    /// Event payload
    pub payload: PlanEventPayload,
}

/// Event type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanEventType {
    EntryCreated,
    EntryDeleted,
    EntryMoved,
    EntryUpdated,
    UpdateFailed,
}

impl std::fmt::Display for PlanEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanEventType::EntryCreated => write!(f, "ENTRY_CREATED"),
            PlanEventType::EntryDeleted => write!(f, "ENTRY_DELETED"),
            PlanEventType::EntryMoved => write!(f, "ENTRY_MOVED"),
            PlanEventType::EntryUpdated => write!(f, "ENTRY_UPDATED"),
            PlanEventType::UpdateFailed => write!(f, "UPDATE_FAILED"),
        }
    }
}

/// Event payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlanEventPayload {
    #[serde(rename_all = "camelCase")]
    EntryCreated {
        entry: PlanEntry,
    },

    /// Deletion plus the post-delete position list of the affected bucket
    #[serde(rename_all = "camelCase")]
    EntryDeleted {
        entry_id: String,
        date: NaiveDate,
        slot: MealSlot,
        positions: Vec<SlotPosition>,
    },

    /// Move plus the complete rewritten position lists
    ///
    /// `source_positions` is present only for cross-bucket moves; a reorder
    /// within one bucket rewrites a single list.
    #[serde(rename_all = "camelCase")]
    EntryMoved {
        entry: PlanEntry,
        target_positions: Vec<SlotPosition>,
        #[serde(skip_serializing_if = "Option::is_none")]
        source_positions: Option<Vec<SlotPosition>>,
        old_date: NaiveDate,
        old_slot: MealSlot,
        old_sort_order: u32,
    },

    #[serde(rename_all = "camelCase")]
    EntryUpdated {
        entry: PlanEntry,
    },

    /// A detached update failed after its request was already acknowledged
    ///
    /// Subscribers should invalidate and refetch rather than trust any
    /// speculative state for this entry.
    #[serde(rename_all = "camelCase")]
    UpdateFailed {
        entry_id: String,
        reason: String,
    },
}

impl PlanEventPayload {
    pub fn event_type(&self) -> PlanEventType {
        match self {
            PlanEventPayload::EntryCreated { .. } => PlanEventType::EntryCreated,
            PlanEventPayload::EntryDeleted { .. } => PlanEventType::EntryDeleted,
            PlanEventPayload::EntryMoved { .. } => PlanEventType::EntryMoved,
            PlanEventPayload::EntryUpdated { .. } => PlanEventType::EntryUpdated,
            PlanEventPayload::UpdateFailed { .. } => PlanEventType::UpdateFailed,
        }
    }
}

impl PlanEvent {
    /// Create an event with a fresh ID and the current server timestamp
    pub fn new(
        household: impl Into<String>,
        actor_id: impl Into<String>,
        payload: PlanEventPayload,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            household: household.into(),
            timestamp: crate::util::now_millis(),
            actor_id: actor_id.into(),
            event_type: payload.event_type(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_derived_from_payload() {
        let event = PlanEvent::new(
            "casa-1",
            "alice",
            PlanEventPayload::UpdateFailed {
                entry_id: "e1".to_string(),
                reason: "gone".to_string(),
            },
        );
        assert_eq!(event.event_type, PlanEventType::UpdateFailed);
        assert!(!event.event_id.is_empty());
    }

    #[test]
    fn test_moved_payload_wire_shape() {
        let payload = PlanEventPayload::EntryMoved {
            entry: PlanEntry {
                id: "e1".to_string(),
                owner_id: "alice".to_string(),
                date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
                slot: MealSlot::Midday,
                sort_order: 0,
                kind: crate::plan::EntryKind::Note,
                recipe_id: None,
                title: Some("soup".to_string()),
                created_at: 1,
                updated_at: 2,
            },
            target_positions: vec![SlotPosition {
                entry_id: "e1".to_string(),
                sort_order: 0,
            }],
            source_positions: None,
            old_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            old_slot: MealSlot::Evening,
            old_sort_order: 2,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "entryMoved");
        assert_eq!(json["oldSortOrder"], 2);
        assert_eq!(json["targetPositions"][0]["entryId"], "e1");
        // absent for same-bucket reorders
        assert!(json.get("sourcePositions").is_none());
    }
}
