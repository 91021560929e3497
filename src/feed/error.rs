// src/feed/error.rs
use std::time::Duration;

use thiserror::Error;

/// Upstream could not be reached or answered badly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("feed request timed out after {0:?}")]
    Timeout(Duration),

    #[error("feed HTTP {0}")]
    Status(u16),

    #[error("feed unreachable: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// Payload bytes do not match the configured wire format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid protobuf framing: {0}")]
    Binary(String),

    #[error("feed text is not valid UTF-8 (at byte {0})")]
    Utf8(usize),

    #[error("unbalanced '}}' on line {0}")]
    UnbalancedBrace(usize),

    #[error("feed text ended inside an open block (depth {0})")]
    Truncated(usize),

    #[error("bad integer on line {line}: {value:?}")]
    BadInteger { line: usize, value: String },
}

impl From<prost::DecodeError> for DecodeError {
    fn from(err: prost::DecodeError) -> Self {
        DecodeError::Binary(err.to_string())
    }
}

/// Why a refresh cycle produced no new snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("refresh task aborted: {0}")]
    Aborted(String),
}

impl RefreshError {
    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RefreshError::Fetch(FetchError::Timeout(_)) => "timeout",
            RefreshError::Fetch(_) => "fetch",
            RefreshError::Decode(_) => "decode",
            RefreshError::Aborted(_) => "aborted",
        }
    }
}
