//! Startup orchestration and the running responder.
//!
//! # Responsibilities
//! - Validate configuration
//! - Bind all three listeners concurrently
//! - Spawn one accept loop per listener
//! - Drain: close listeners, wait out the grace period, clean up
//!
//! # Design Decisions
//! - Fail fast: any bind error is fatal, no partial startup
//! - Listeners are closed before the grace period begins

use std::net::SocketAddr;
use std::path::Path;

use tokio::task::JoinHandle;

use crate::config::schema::{fcgi_bind_addresses, http_bind_addresses};
use crate::config::{self, ResponderConfig};
use crate::fcgi::FcgiServer;
use crate::http::{HttpServer, Responder};
use crate::lifecycle::shutdown::{self, Shutdown};
use crate::lifecycle::signals::Signals;
use crate::lifecycle::LifecycleError;
use crate::net::listener::TCP_KEEPALIVE_PERIOD;
use crate::net::{ConnectionTracker, ListenAddr, Listener, ListenerState, Transport};

/// A responder with all three listeners accepting.
#[derive(Debug)]
pub struct Running {
    config: ResponderConfig,
    http_addr: SocketAddr,
    fcgi_addr: SocketAddr,
    state: ListenerState,
    shutdown: Shutdown,
    tracker: ConnectionTracker,
    tasks: Vec<(Transport, JoinHandle<()>)>,
}

/// Validate the configuration, bind every listener and start serving.
pub async fn start(config: ResponderConfig) -> Result<Running, LifecycleError> {
    config::check(&config)?;

    let http_bind = http_bind_addresses(&config.http_addr);
    let fcgi_bind = fcgi_bind_addresses(&config.fcgi_addr);

    let (http, fcgi_tcp, fcgi_unix) = tokio::try_join!(
        Listener::bind_tcp_any(&http_bind, Some(TCP_KEEPALIVE_PERIOD)),
        Listener::bind_tcp_any(&fcgi_bind, None),
        async { Listener::bind_unix(&config.fcgi_sock) },
    )?;

    let http_addr = tcp_addr(&http)?;
    let fcgi_addr = tcp_addr(&fcgi_tcp)?;

    tracing::info!(transport = %Transport::Http, address = %http_addr, "Listening");
    tracing::info!(transport = %Transport::FcgiTcp, address = %fcgi_addr, "Listening");
    tracing::info!(
        transport = %Transport::FcgiUnix,
        path = %config.fcgi_sock.display(),
        "Listening"
    );

    let router = Responder::new(config.keep_alive_secs).router();
    let shutdown = Shutdown::new();
    let tracker = ConnectionTracker::new();

    let tasks = vec![
        (
            Transport::Http,
            tokio::spawn(HttpServer::new(router.clone()).run(
                http,
                shutdown.subscribe(),
                tracker.clone(),
            )),
        ),
        (
            Transport::FcgiTcp,
            tokio::spawn(FcgiServer::new(router.clone(), Transport::FcgiTcp).run(
                fcgi_tcp,
                shutdown.subscribe(),
                tracker.clone(),
            )),
        ),
        (
            Transport::FcgiUnix,
            tokio::spawn(FcgiServer::new(router, Transport::FcgiUnix).run(
                fcgi_unix,
                shutdown.subscribe(),
                tracker.clone(),
            )),
        ),
    ];

    Ok(Running {
        config,
        http_addr,
        fcgi_addr,
        state: ListenerState::Listening,
        shutdown,
        tracker,
        tasks,
    })
}

fn tcp_addr(listener: &Listener) -> Result<SocketAddr, LifecycleError> {
    match listener.local_addr().map_err(LifecycleError::LocalAddr)? {
        ListenAddr::Tcp(addr) => Ok(addr),
        ListenAddr::Unix(path) => Err(LifecycleError::LocalAddr(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("expected a TCP listener, got {}", path.display()),
        ))),
    }
}

impl Running {
    /// Bound HTTP address (useful when configured with port 0).
    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    /// Bound FastCGI TCP address.
    pub fn fcgi_addr(&self) -> SocketAddr {
        self.fcgi_addr
    }

    /// FastCGI Unix socket path.
    pub fn fcgi_sock(&self) -> &Path {
        &self.config.fcgi_sock
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    /// Connections accepted and not yet finished, across all listeners.
    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Stop accepting on every listener and wait until all three are closed.
    ///
    /// Connections already accepted keep being served.
    pub async fn close_listeners(&mut self) -> Result<(), LifecycleError> {
        if self.state != ListenerState::Listening {
            return Ok(());
        }
        self.shutdown.trigger();
        for (transport, task) in self.tasks.drain(..) {
            task.await.map_err(|source| LifecycleError::Join { transport, source })?;
        }
        self.state = ListenerState::Draining;
        tracing::info!(
            active_connections = self.tracker.active_count(),
            "Listeners closed"
        );
        Ok(())
    }

    /// Close listeners, wait out the grace period, then clean up.
    pub async fn drain(mut self) -> Result<(), LifecycleError> {
        self.close_listeners().await?;
        shutdown::grace_period(self.config.term_wait).await;
        self.state = ListenerState::Closed;

        tracing::info!(
            active_connections = self.tracker.active_count(),
            "All done"
        );

        shutdown::remove_default_socket(&self.config)?;
        Ok(())
    }
}

/// Run until SIGINT or SIGTERM, then drain and return.
pub async fn run(config: ResponderConfig) -> Result<(), LifecycleError> {
    let mut signals = Signals::install().map_err(LifecycleError::Signal)?;
    let running = start(config).await?;

    let signal = signals.recv().await;
    tracing::info!(
        signal = %signal,
        term_wait_secs = running.config.term_wait.as_secs(),
        "Got signal, shutting down"
    );

    running.drain().await?;
    Ok(())
}
