//! Ladle Client - plan calendar client for Ladle Server
//!
//! Keeps a cached week (or any date range) of plan entries converged with the
//! engine: speculative local mirroring for the user's own mutations, a drag
//! state machine that collapses a whole gesture to one move call, and a feed
//! pump that applies every household member's events as they arrive.

pub mod cache;
pub mod drag;
pub mod error;
pub mod session;
pub mod transport;

pub use cache::{BucketLayout, CacheSnapshot, RangeCache, Reconciliation};
pub use drag::{DragSession, DropTarget, HoverPosition};
pub use error::{ClientError, ClientResult};
pub use session::PlanSession;
pub use transport::{FeedStream, HttpTransport, IDENTITY_HEADER, PlanTransport};

#[cfg(feature = "in-process")]
pub use transport::LocalTransport;

// Re-export shared types for convenience
pub use shared::plan::request::{
    CreateEntryRequest, CreatedReceipt, DeleteReceipt, EntryView, MoveEntryRequest, MoveReceipt,
    PlanRange, RecipeMeta, UpdateEntryRequest, UpdateReceipt,
};
pub use shared::{
    EntryKind, MealSlot, PlanEntry, PlanEvent, PlanEventPayload, PlanEventType, SlotPosition,
};
