//! FastCGI transport subsystem.
//!
//! # Data Flow
//! ```text
//! TCP / Unix connection
//!     → protocol.rs (records, name-value pairs)
//!     → server.rs (per-request state, multiplexing, management records)
//!     → cgi.rs (CGI params → http::Request, http::Response → CGI output)
//!     → the responder's router, same as plain HTTP
//! ```
//!
//! Only the RESPONDER role is served.

pub mod cgi;
pub mod protocol;
pub mod server;

pub use server::FcgiServer;

/// Error type for FastCGI connections.
#[derive(Debug, thiserror::Error)]
pub enum FcgiError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported FastCGI version {0}")]
    UnsupportedVersion(u8),

    #[error("Malformed record: {0}")]
    Malformed(&'static str),

    #[error("Invalid CGI request: {0}")]
    Request(#[from] axum::http::Error),
}
