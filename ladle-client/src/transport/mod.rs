//! Transport layer - how a session reaches the plan service
//!
//! 两种实现：
//!
//! - [`HttpTransport`] - 网络模式，JSON 请求 + SSE 事件流
//! - [`LocalTransport`] - 进程内模式 (feature `in-process`)，直接驱动服务端
//!   的 axum Router，零网络开销
//!
//! Both speak the same uniform response envelope; a non-`E0000` code becomes
//! [`ClientError::Api`]. The feed is one multiplexed stream per household:
//! every committed change arrives as a [`PlanEvent`], lag arrives as
//! [`ClientError::FeedLagged`] and leaves the stream alive.

mod http;
#[cfg(feature = "in-process")]
mod local;

pub use self::http::HttpTransport;
#[cfg(feature = "in-process")]
pub use self::local::LocalTransport;

use ::http::StatusCode;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::de::DeserializeOwned;
use shared::plan::request::{
    CreateEntryRequest, CreatedReceipt, DeleteReceipt, EntryView, MoveEntryRequest, MoveReceipt,
    PlanRange, UpdateEntryRequest, UpdateReceipt,
};
use shared::{ApiEnvelope, PlanEvent};

use crate::error::{ClientError, ClientResult};

/// Identity header resolved by the server's session middleware
pub const IDENTITY_HEADER: &str = "x-ladle-user";

/// The live feed: committed changes for one household, in commit order
pub type FeedStream = BoxStream<'static, ClientResult<PlanEvent>>;

/// Calls the plan service on behalf of one user
#[async_trait]
pub trait PlanTransport: Send + Sync {
    /// List entries in an inclusive date range, ordered by date, slot, position
    async fn list(&self, range: PlanRange) -> ClientResult<Vec<EntryView>>;

    /// Create an entry at the end of its bucket
    async fn create(&self, req: &CreateEntryRequest) -> ClientResult<CreatedReceipt>;

    /// Delete an entry; deleting an absent entry still succeeds
    async fn delete(&self, entry_id: &str) -> ClientResult<DeleteReceipt>;

    /// Move an entry to a (date, slot, index) target
    async fn move_entry(
        &self,
        entry_id: &str,
        req: &MoveEntryRequest,
    ) -> ClientResult<MoveReceipt>;

    /// Retitle a note entry; completion arrives over the feed, not here
    async fn update(
        &self,
        entry_id: &str,
        req: &UpdateEntryRequest,
    ) -> ClientResult<UpdateReceipt>;

    /// Open the live feed for the caller's household
    async fn subscribe(&self) -> ClientResult<FeedStream>;
}

/// Unwrap a response envelope, mapping error codes onto [`ClientError::Api`]
///
/// Error statuses still carry the envelope; only when the body is not an
/// envelope at all does the HTTP status drive the error.
fn decode_envelope<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> ClientResult<T> {
    match serde_json::from_slice::<ApiEnvelope<T>>(body) {
        Ok(envelope) if envelope.is_ok() => envelope
            .data
            .ok_or_else(|| ClientError::InvalidResponse("missing data field".to_string())),
        Ok(envelope) => Err(ClientError::Api {
            code: envelope.code,
            message: envelope.message,
        }),
        Err(_) if !status.is_success() => Err(ClientError::Internal(format!(
            "HTTP {status}: {}",
            String::from_utf8_lossy(body)
        ))),
        Err(e) => Err(ClientError::Serialization(e)),
    }
}
