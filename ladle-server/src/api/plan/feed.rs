//! Live plan event feed (SSE)
//!
//! One long-lived stream per session, scoped to the caller's household
//! topic. Frames:
//!
//! - `event: plan` - one JSON-encoded `PlanEvent` per committed mutation
//! - `event: lagged` - the subscriber fell behind and events were
//!   dropped; the data field carries the skip count and the client must
//!   refetch its range

use std::convert::Infallible;

use axum::extract::{Extension, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast;

use crate::api::identity::CurrentUser;
use crate::core::ServerState;
use crate::utils::AppResult;

pub async fn stream(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let rx = state.service.subscribe(&user.user_id).await?;
    tracing::debug!(user = %user.user_id, household = %user.household, "feed subscribed");

    let stream = futures::stream::unfold(rx, move |mut rx| async move {
        match rx.recv().await {
            Ok(event) => {
                let frame = match Event::default().event("plan").json_data(&event) {
                    Ok(frame) => frame,
                    Err(err) => {
                        tracing::error!(error = %err, "failed to encode plan event");
                        Event::default().event("error").data("encoding failure")
                    }
                };
                Some((Ok(frame), rx))
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "feed subscriber lagged, events dropped");
                let frame = Event::default().event("lagged").data(skipped.to_string());
                Some((Ok(frame), rx))
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
