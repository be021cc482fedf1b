use thiserror::Error;

/// Top-level error type for the `linkpoll-api` crate.
///
/// Covers every way a single request can fail before a response is in hand:
/// transport, timeouts, TLS setup and header encoding.
/// `linkpoll-core` turns these into failure records rather than crashes.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error not classified more precisely below.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Request timed out.
    #[error("Request timed out after {timeout}")]
    Timeout { timeout: humantime::Duration },

    /// Connection-level failure (refused, reset, DNS). Displays the
    /// innermost cause verbatim.
    #[error("{message}")]
    Connection { message: String },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Request construction ────────────────────────────────────────
    /// A configured header name or value cannot be sent on the wire.
    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::Connection { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if the request ran out of time.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}
