// ── Core error types ──
//
// Errors raised inside a poll cycle. None of these escape a cycle: the
// handlers turn transport failures into failure records and log the rest.
// Only a `Transport` error from client construction stops the process, and
// only at startup.

use linkpoll_api::StatusCode;
use thiserror::Error;
use url::Url;

use crate::correlation::RequestContext;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Transport ────────────────────────────────────────────────────
    #[error(transparent)]
    Transport(#[from] linkpoll_api::Error),

    #[error("Unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: StatusCode, url: Url },

    #[error("Cannot derive object URL from {base}: {reason}")]
    ObjectUrl { base: Url, reason: String },

    // ── Record pipeline ──────────────────────────────────────────────
    #[error("Decode error: {message}")]
    Decode { message: String },

    #[error("No correlation entry for request {context}")]
    MissingCorrelation { context: RequestContext },

    #[error("Failed to emit record: {message}")]
    Emit { message: String },
}

impl CoreError {
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn emit(message: impl Into<String>) -> Self {
        Self::Emit {
            message: message.into(),
        }
    }
}
