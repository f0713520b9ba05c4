//! TCP and Unix listeners with a shutdown-aware accept loop.
//!
//! # Responsibilities
//! - Bind to configured address or socket path
//! - Accept incoming connections and apply TCP keep-alive
//! - Stop accepting (and drop the listener) once shutdown is broadcast
//! - Graceful handling of accept errors

use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use tokio::net::{TcpListener, TcpStream, UnixListener};
use tokio::sync::broadcast;

use crate::net::connection::{Connection, ConnectionTracker, PeerAddr, Stream};

/// Keep-alive idle time and probe interval applied to accepted HTTP connections.
pub const TCP_KEEPALIVE_PERIOD: Duration = Duration::from_secs(3 * 60);

/// Pause after a failed accept before trying again.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(#[source] io::Error),
}

/// Where a listener is bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenAddr {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenAddr::Tcp(addr) => write!(f, "{addr}"),
            ListenAddr::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

/// Listener lifecycle: `Unstarted → Listening → Draining → Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Not bound yet.
    Unstarted,
    /// Bound and accepting connections.
    Listening,
    /// Closed to new connections; accepted ones are finishing.
    Draining,
    /// Grace period over.
    Closed,
}

/// A bound listener of either kind.
#[derive(Debug)]
pub enum Listener {
    Tcp {
        inner: TcpListener,
        keepalive: Option<Duration>,
    },
    Unix {
        inner: UnixListener,
        path: PathBuf,
    },
}

impl Listener {
    /// Bind a TCP listener. `keepalive` is applied to every accepted stream.
    pub async fn bind_tcp(addr: &str, keepalive: Option<Duration>) -> Result<Self, ListenerError> {
        let inner = TcpListener::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        Ok(Self::Tcp { inner, keepalive })
    }

    /// Bind the first address in `addrs` that succeeds.
    ///
    /// The error from the last attempt is returned if none do.
    pub async fn bind_tcp_any(
        addrs: &[String],
        keepalive: Option<Duration>,
    ) -> Result<Self, ListenerError> {
        let mut last = None;
        for addr in addrs {
            match Self::bind_tcp(addr, keepalive).await {
                Ok(listener) => return Ok(listener),
                Err(e) => {
                    tracing::debug!(addr = %addr, error = %e, "Bind attempt failed");
                    last = Some(e);
                }
            }
        }
        Err(last.unwrap_or_else(|| ListenerError::Bind {
            addr: String::new(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "no address to bind"),
        }))
    }

    /// Bind a Unix domain socket listener.
    ///
    /// A stale socket left behind by a killed process is removed first.
    /// Any other kind of file at `path` makes the bind fail.
    pub fn bind_unix(path: &Path) -> Result<Self, ListenerError> {
        let bind_error = |source| ListenerError::Bind {
            addr: path.display().to_string(),
            source,
        };

        if let Ok(meta) = std::fs::symlink_metadata(path) {
            if meta.file_type().is_socket() {
                tracing::debug!(path = %path.display(), "Removing stale socket");
                std::fs::remove_file(path).map_err(bind_error)?;
            }
        }

        let inner = UnixListener::bind(path).map_err(bind_error)?;
        Ok(Self::Unix {
            inner,
            path: path.to_path_buf(),
        })
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<ListenAddr, io::Error> {
        match self {
            Listener::Tcp { inner, .. } => inner.local_addr().map(ListenAddr::Tcp),
            Listener::Unix { path, .. } => Ok(ListenAddr::Unix(path.clone())),
        }
    }

    /// Accept a new connection.
    pub async fn accept(&self) -> Result<(Stream, PeerAddr), ListenerError> {
        match self {
            Listener::Tcp { inner, keepalive } => {
                let (stream, addr) = inner.accept().await.map_err(ListenerError::Accept)?;
                if let Some(period) = keepalive {
                    if let Err(e) = set_keepalive(&stream, *period) {
                        tracing::warn!(peer_addr = %addr, error = %e, "Failed to set TCP keep-alive");
                    }
                }
                Ok((Stream::Tcp(stream), PeerAddr::Tcp(addr)))
            }
            Listener::Unix { inner, .. } => {
                let (stream, _) = inner.accept().await.map_err(ListenerError::Accept)?;
                Ok((Stream::Unix(stream), PeerAddr::Unix))
            }
        }
    }
}

fn set_keepalive(stream: &TcpStream, period: Duration) -> io::Result<()> {
    let keepalive = TcpKeepalive::new().with_time(period).with_interval(period);
    SockRef::from(stream).set_tcp_keepalive(&keepalive)
}

/// Accept connections until shutdown is broadcast, handing each to `handler`
/// on its own task.
///
/// Returning drops the listener, so the OS refuses new connections from then
/// on. Spawned connection tasks are not awaited; they finish on their own.
pub async fn serve<F, Fut>(
    listener: Listener,
    mut shutdown: broadcast::Receiver<()>,
    tracker: ConnectionTracker,
    handler: F,
) where
    F: Fn(Connection) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let local = listener
        .local_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let guard = tracker.track();
                    tracing::debug!(
                        listener = %local,
                        peer_addr = %peer,
                        connection_id = %guard.id(),
                        active_connections = tracker.active_count(),
                        "Connection accepted"
                    );
                    tokio::spawn(handler(Connection { stream, peer, guard }));
                }
                Err(e) => {
                    tracing::warn!(listener = %local, error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            },
        }
    }

    drop(listener);
    tracing::debug!(listener = %local, "Listener closed");
}
