//! Slow HTTP and FastCGI responder for drain testing.
//!
//! Serves two canned responses over plain HTTP, FastCGI over TCP and FastCGI
//! over a Unix socket. `GET /sleep/<n>` holds the response for `n` seconds;
//! any other GET answers immediately. On SIGINT/SIGTERM every listener is
//! closed, the process waits out `--term-wait`, then exits.

// Core subsystems
pub mod config;
pub mod fcgi;
pub mod http;
pub mod net;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::ResponderConfig;
pub use http::Responder;
pub use lifecycle::{Running, Shutdown};
