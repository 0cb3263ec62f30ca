//! Shared types for the Ladle meal-plan engine
//!
//! Wire-level types used by both the server and the client: plan entries,
//! change events, request/response payloads and the API envelope.

pub mod plan;
pub mod response;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

// Plan re-exports (for convenient access)
pub use plan::{BucketKey, EntryKind, MealSlot, PlanEntry, SlotPosition};
pub use plan::event::{PlanEvent, PlanEventPayload, PlanEventType};
pub use response::ApiEnvelope;
