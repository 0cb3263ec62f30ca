//! Network transport - JSON calls plus SSE feed parsing over a byte stream

use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::plan::request::{
    CreateEntryRequest, CreatedReceipt, DeleteReceipt, EntryView, MoveEntryRequest, MoveReceipt,
    PlanRange, UpdateEntryRequest, UpdateReceipt,
};
use shared::{ApiEnvelope, PlanEvent};

use super::{FeedStream, IDENTITY_HEADER, PlanTransport, decode_envelope};
use crate::error::{ClientError, ClientResult};

/// HTTP transport bound to one server and one user
///
/// Mutation and list calls carry a per-request timeout; the feed request does
/// not, since it is expected to stay open for the life of the session.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    user: String,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport for `user` against `base_url`
    pub fn new(base_url: impl Into<String>, user: impl Into<String>) -> ClientResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        let base_url: String = base_url.into();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user: user.into(),
            timeout: Duration::from_secs(30),
        })
    }

    /// Set the request timeout for non-feed calls
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> ClientResult<T> {
        let status = response.status();
        let body = response.bytes().await?;
        decode_envelope(status, &body)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ClientResult<T> {
        let response = self
            .client
            .get(self.url(path))
            .query(query)
            .header(IDENTITY_HEADER, &self.user)
            .timeout(self.timeout)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .header(IDENTITY_HEADER, &self.user)
            .timeout(self.timeout)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn put_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let response = self
            .client
            .put(self.url(path))
            .json(body)
            .header(IDENTITY_HEADER, &self.user)
            .timeout(self.timeout)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn delete_json<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self
            .client
            .delete(self.url(path))
            .header(IDENTITY_HEADER, &self.user)
            .timeout(self.timeout)
            .send()
            .await?;
        Self::handle_response(response).await
    }
}

#[async_trait]
impl PlanTransport for HttpTransport {
    async fn list(&self, range: PlanRange) -> ClientResult<Vec<EntryView>> {
        let query = [
            ("start", range.start.to_string()),
            ("end", range.end.to_string()),
        ];
        self.get_json("/api/plan", &query).await
    }

    async fn create(&self, req: &CreateEntryRequest) -> ClientResult<CreatedReceipt> {
        self.post_json("/api/plan", req).await
    }

    async fn delete(&self, entry_id: &str) -> ClientResult<DeleteReceipt> {
        self.delete_json(&format!("/api/plan/{entry_id}")).await
    }

    async fn move_entry(
        &self,
        entry_id: &str,
        req: &MoveEntryRequest,
    ) -> ClientResult<MoveReceipt> {
        self.post_json(&format!("/api/plan/{entry_id}/move"), req)
            .await
    }

    async fn update(
        &self,
        entry_id: &str,
        req: &UpdateEntryRequest,
    ) -> ClientResult<UpdateReceipt> {
        self.put_json(&format!("/api/plan/{entry_id}"), req).await
    }

    async fn subscribe(&self) -> ClientResult<FeedStream> {
        let response = self
            .client
            .get(self.url("/api/plan/feed"))
            .header(IDENTITY_HEADER, &self.user)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await?;
            if let Ok(envelope) = serde_json::from_slice::<ApiEnvelope<()>>(&body) {
                return Err(ClientError::Api {
                    code: envelope.code,
                    message: envelope.message,
                });
            }
            return Err(ClientError::Internal(format!("HTTP {status}")));
        }

        Ok(sse_frames(response.bytes_stream().boxed()).boxed())
    }
}

// ============================================================================
// SSE decoding
// ============================================================================

/// One parsed `event:`/`data:` block
struct SseFrame {
    event: String,
    data: String,
}

/// Byte accumulator that pops complete frames off the front
///
/// A frame ends at a blank line. Chunk boundaries from the network bear no
/// relation to frame boundaries, so partial frames stay buffered.
#[derive(Default)]
struct SseBuffer {
    data: Vec<u8>,
}

impl SseBuffer {
    fn extend(&mut self, chunk: &[u8]) {
        self.data.extend_from_slice(chunk);
    }

    fn next_frame(&mut self) -> Option<SseFrame> {
        let end = frame_boundary(&self.data)?;
        let frame_bytes: Vec<u8> = self.data.drain(..end).collect();
        let text = String::from_utf8_lossy(&frame_bytes);

        let mut event = String::new();
        let mut data_lines: Vec<String> = Vec::new();
        for line in text.lines() {
            if let Some(rest) = line.strip_prefix("event:") {
                event = rest.trim_start().to_string();
            } else if let Some(rest) = line.strip_prefix("data:") {
                data_lines.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
            }
            // comment lines (keep-alive pings) and field names we do not use
            // fall through
        }

        Some(SseFrame {
            event,
            data: data_lines.join("\n"),
        })
    }
}

fn frame_boundary(data: &[u8]) -> Option<usize> {
    let lf = data.windows(2).position(|w| w == b"\n\n").map(|p| p + 2);
    let crlf = data
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|p| p + 4);
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Map one frame onto the feed vocabulary
///
/// `None` for keep-alive pings and unknown event names.
fn decode_frame(frame: SseFrame) -> Option<ClientResult<PlanEvent>> {
    match frame.event.as_str() {
        "plan" => Some(
            serde_json::from_str::<PlanEvent>(&frame.data).map_err(ClientError::Serialization),
        ),
        "lagged" => {
            let skipped = frame.data.trim().parse().unwrap_or(0);
            Some(Err(ClientError::FeedLagged(skipped)))
        }
        "error" => Some(Err(ClientError::InvalidResponse(
            "feed frame failed to encode".to_string(),
        ))),
        _ => None,
    }
}

/// Turn a raw SSE byte stream into a stream of plan events
fn sse_frames<S, B>(bytes: S) -> impl Stream<Item = ClientResult<PlanEvent>> + Send + 'static
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    futures::stream::unfold(
        (bytes, SseBuffer::default()),
        |(mut bytes, mut buffer)| async move {
            loop {
                if let Some(frame) = buffer.next_frame() {
                    match decode_frame(frame) {
                        Some(item) => return Some((item, (bytes, buffer))),
                        None => continue,
                    }
                }
                match bytes.next().await {
                    Some(Ok(chunk)) => buffer.extend(chunk.as_ref()),
                    Some(Err(e)) => return Some((Err(ClientError::Http(e)), (bytes, buffer))),
                    None => return None,
                }
            }
        },
    )
}
