use serde::{Deserialize, Serialize};

// -- JWT Claims --

/// Bearer token claims checked by the API middleware when auth is enabled.
/// `sub` is the uid the token was issued for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

// -- Responses --

/// Body of every response the service writes, success or failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status_code: u16,
    pub message: String,
    /// Cause chain of an internal error, only filled in debug mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<Vec<String>>,
}

impl StatusResponse {
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
            traceback: None,
        }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(200, message)
    }
}

// -- Forms --
//
// Request bodies are `application/x-www-form-urlencoded`. Blank values are
// accepted and copied verbatim.

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub uid: String,
    pub broadcaster: String,
    pub channel: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageForm {
    pub message: String,
    pub uid: String,
}

/// Used by the raise-hand, accept and remove endpoints.
#[derive(Debug, Deserialize)]
pub struct UidForm {
    pub uid: String,
}
