//! Wire envelope shared by the server handlers and the client decoder

use serde::{Deserialize, Serialize};

/// Business code for a successful response
pub const CODE_OK: &str = "E0000";

/// Uniform response envelope
///
/// Every HTTP endpoint wraps its payload in this shape. `code` is `E0000`
/// on success; error responses carry the error family code and a human
/// readable message with `data` absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: CODE_OK.to_string(),
            message: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            data: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }
}
