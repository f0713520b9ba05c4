//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → Bind listeners → Spawn accept loops
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!
//! Shutdown (shutdown.rs):
//!     Close listeners → Grace period → Remove default socket → Exit
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: listeners are closed before the grace period starts
//! - The grace period is a fixed sleep; nothing cancels it
//! - In-flight connections are never waited on or force-closed

pub mod shutdown;
pub mod signals;
pub mod startup;

use std::path::PathBuf;

pub use shutdown::Shutdown;
pub use startup::{run, start, Running};

use crate::config::ConfigError;
use crate::net::{ListenerError, Transport};

/// Error type for startup and shutdown.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("Failed to read listener address: {0}")]
    LocalAddr(#[source] std::io::Error),

    #[error("Failed to install signal handlers: {0}")]
    Signal(#[source] std::io::Error),

    #[error("{transport} server task failed: {source}")]
    Join {
        transport: Transport,
        #[source]
        source: tokio::task::JoinError,
    },

    #[error("Failed to remove {}: {source}", .path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
