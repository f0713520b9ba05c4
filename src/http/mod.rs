//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper HTTP/1.1, transport tagging)
//!     → responder.rs (classify, optional sleep, canned response)
//!     → Send to client
//! ```
//!
//! The FastCGI servers reuse the same router, so all three transports answer
//! identically.

pub mod responder;
pub mod server;

pub use responder::{classify, parse_sleep_seconds, Outcome, Responder, SERVER_NAME};
pub use server::HttpServer;
