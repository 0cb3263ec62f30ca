//! Session identity resolution
//!
//! Authentication itself is an external collaborator; requests arrive
//! with an `x-ladle-user` header naming an already-authenticated user.
//! This middleware resolves that user's household through the directory
//! and injects [`CurrentUser`] for the handlers. Requests without a
//! resolvable identity are rejected before any handler runs.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::core::ServerState;
use crate::utils::AppError;

/// Header carrying the authenticated user id
pub const IDENTITY_HEADER: &str = "x-ladle-user";

/// The resolved caller, available as a request extension
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: String,
    /// The caller's household key (also the feed topic)
    pub household: String,
}

pub async fn resolve_identity(
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user_id = request
        .headers()
        .get(IDENTITY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .ok_or(AppError::Unauthorized)?;

    let household = state
        .service
        .household_key_of(&user_id)
        .await
        .ok_or(AppError::Unauthorized)?;

    request.extensions_mut().insert(CurrentUser {
        user_id,
        household,
    });
    Ok(next.run(request).await)
}
