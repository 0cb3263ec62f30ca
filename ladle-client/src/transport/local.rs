// ladle-client/src/transport/local.rs
// Oneshot 传输 - 内存通信 (in-process mode)
//
// 需要启用 "in-process" feature

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use futures::StreamExt;
use http::{Method, Request};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::PlanEvent;
use shared::plan::request::{
    CreateEntryRequest, CreatedReceipt, DeleteReceipt, EntryView, MoveEntryRequest, MoveReceipt,
    PlanRange, UpdateEntryRequest, UpdateReceipt,
};
use tokio::sync::broadcast;
use tower::ServiceExt;

use super::{FeedStream, IDENTITY_HEADER, PlanTransport, decode_envelope};
use crate::error::{ClientError, ClientResult};

/// In-process transport (内存调用)
///
/// 使用 Tower Service 的 oneshot 模式直接调用 Router，适用于同进程的
/// 服务器-客户端通信，零网络开销。The feed side takes the household's
/// broadcast sender handed over by the server's composition root, so this
/// crate never links the server crate.
///
/// # Example
///
/// ```ignore
/// use ladle_client::LocalTransport;
///
/// let router = ladle_server::api::app(state);
/// let feed = state.service.broadcaster().sender_for("casa-verde");
/// let transport = LocalTransport::new(router, feed, "alice");
/// ```
#[derive(Debug, Clone)]
pub struct LocalTransport {
    router: Router,
    feed: broadcast::Sender<PlanEvent>,
    user: String,
}

impl LocalTransport {
    /// Create an in-process transport for `user`
    ///
    /// # Arguments
    /// * `router` - 已初始化的 axum Router (with_state 已调用)
    /// * `feed` - broadcast sender for the user's household topic
    pub fn new(
        router: Router,
        feed: broadcast::Sender<PlanEvent>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            router,
            feed,
            user: user.into(),
        }
    }

    fn build_request(&self, method: Method, path: &str) -> ClientResult<Request<Body>> {
        Request::builder()
            .method(method)
            .uri(path)
            .header(IDENTITY_HEADER, &self.user)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::empty())
            .map_err(|e| ClientError::Internal(format!("failed to build request: {e}")))
    }

    fn build_request_with_body<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> ClientResult<Request<Body>> {
        let body_bytes = serde_json::to_vec(body)?;
        Request::builder()
            .method(method)
            .uri(path)
            .header(IDENTITY_HEADER, &self.user)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(body_bytes))
            .map_err(|e| ClientError::Internal(format!("failed to build request: {e}")))
    }

    async fn execute<T: DeserializeOwned>(&self, request: Request<Body>) -> ClientResult<T> {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .map_err(|e| ClientError::Internal(format!("oneshot call failed: {e}")))?;

        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| ClientError::Internal(format!("failed to read body: {e}")))?;

        decode_envelope(status, &body)
    }
}

#[async_trait]
impl PlanTransport for LocalTransport {
    async fn list(&self, range: PlanRange) -> ClientResult<Vec<EntryView>> {
        let path = format!("/api/plan?start={}&end={}", range.start, range.end);
        let request = self.build_request(Method::GET, &path)?;
        self.execute(request).await
    }

    async fn create(&self, req: &CreateEntryRequest) -> ClientResult<CreatedReceipt> {
        let request = self.build_request_with_body(Method::POST, "/api/plan", req)?;
        self.execute(request).await
    }

    async fn delete(&self, entry_id: &str) -> ClientResult<DeleteReceipt> {
        let request = self.build_request(Method::DELETE, &format!("/api/plan/{entry_id}"))?;
        self.execute(request).await
    }

    async fn move_entry(
        &self,
        entry_id: &str,
        req: &MoveEntryRequest,
    ) -> ClientResult<MoveReceipt> {
        let request =
            self.build_request_with_body(Method::POST, &format!("/api/plan/{entry_id}/move"), req)?;
        self.execute(request).await
    }

    async fn update(
        &self,
        entry_id: &str,
        req: &UpdateEntryRequest,
    ) -> ClientResult<UpdateReceipt> {
        let request =
            self.build_request_with_body(Method::PUT, &format!("/api/plan/{entry_id}"), req)?;
        self.execute(request).await
    }

    async fn subscribe(&self) -> ClientResult<FeedStream> {
        let rx = self.feed.subscribe();
        Ok(receiver_frames(rx).boxed())
    }
}

/// Adapt a broadcast receiver to the feed vocabulary
///
/// Lag surfaces as [`ClientError::FeedLagged`] and leaves the stream alive,
/// matching the SSE transport's behavior.
fn receiver_frames(
    rx: broadcast::Receiver<PlanEvent>,
) -> impl futures::Stream<Item = ClientResult<PlanEvent>> + Send + 'static {
    futures::stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Ok(event) => Some((Ok(event), rx)),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                Some((Err(ClientError::FeedLagged(skipped)), rx))
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    })
}
