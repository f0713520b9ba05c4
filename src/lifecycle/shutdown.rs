//! Shutdown coordination.
//!
//! # Ordering
//! ```text
//! signal → broadcast → every accept loop returns (listener dropped)
//!        → grace sleep → socket cleanup → exit
//! ```

use std::io;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::ResponderConfig;
use crate::lifecycle::LifecycleError;

/// Coordinator for closing every listener at once.
///
/// Each accept loop holds a receiver and stops when the signal arrives.
#[derive(Debug, Clone)]
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Sleep out the grace period. Zero returns immediately.
pub async fn grace_period(wait: Duration) {
    if !wait.is_zero() {
        tracing::info!(term_wait_secs = wait.as_secs(), "Waiting before exit");
        tokio::time::sleep(wait).await;
    }
}

/// Remove the FastCGI socket file if it lives at the default path.
///
/// Returns whether a file was removed. A custom path is never touched.
pub fn remove_default_socket(config: &ResponderConfig) -> Result<bool, LifecycleError> {
    if !config.uses_default_socket() {
        return Ok(false);
    }
    let path = config.fcgi_sock.as_path();
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Removed socket file");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(LifecycleError::Cleanup {
            path: path.to_path_buf(),
            source,
        }),
    }
}
