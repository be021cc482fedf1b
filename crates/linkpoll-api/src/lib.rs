// linkpoll-api: HTTP transport for the linkpoll fan-out poller

pub mod client;
pub mod error;
pub mod request;
pub mod transport;

pub use client::{HttpClient, HttpResponse, Transport};
pub use error::Error;
pub use request::{BasicAuth, REDACTED, RequestOptions, RequestSpec};
pub use transport::{DEFAULT_USER_AGENT, TlsMode, TransportConfig};

// Re-exported so downstream crates name methods and status codes without
// depending on reqwest directly.
pub use reqwest::{Method, StatusCode};
