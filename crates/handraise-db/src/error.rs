use thiserror::Error;

/// Failures callers branch on. Everything else travels as plain `anyhow::Error`.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Invalid key: {0:?}")]
    InvalidKey(String),

    #[error("Firebase returned {status}: {message}")]
    Firebase { status: u16, message: String },

    #[error("Malformed {kind} record at {path}")]
    MalformedRecord { kind: &'static str, path: String },
}
