//! HTTP/1.1 server over a TCP listener.
//!
//! # Responsibilities
//! - Run the accept loop for the HTTP listener
//! - Drive each connection with hyper's HTTP/1.1 state machine
//! - Tag requests with their transport before they reach the router

use axum::{body::Body, extract::Request, Router};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::{
    rt::{TokioIo, TokioTimer},
    service::TowerToHyperService,
};
use tokio::sync::broadcast;
use tower::ServiceExt;

use crate::net::{self, Connection, ConnectionTracker, Listener, Transport};

/// HTTP server for the responder.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server around the responder's router.
    pub fn new(router: Router) -> Self {
        Self { router }
    }

    /// Accept connections until shutdown is broadcast.
    pub async fn run(
        self,
        listener: Listener,
        shutdown: broadcast::Receiver<()>,
        tracker: ConnectionTracker,
    ) {
        let router = self.router;
        net::serve(listener, shutdown, tracker, move |conn| {
            serve_connection(conn, router.clone())
        })
        .await;
        tracing::info!("HTTP server stopped");
    }
}

async fn serve_connection(conn: Connection, router: Router) {
    let Connection {
        stream,
        peer,
        guard,
    } = conn;

    let service = router.map_request(|request: Request<Incoming>| {
        let mut request = request.map(Body::new);
        request.extensions_mut().insert(Transport::Http);
        request
    });

    let mut builder = http1::Builder::new();
    builder.timer(TokioTimer::new()).keep_alive(true);

    let result = builder
        .serve_connection(TokioIo::new(stream), TowerToHyperService::new(service))
        .await;

    if let Err(e) = result {
        tracing::debug!(
            peer_addr = %peer,
            connection_id = %guard.id(),
            error = %e,
            "HTTP connection error"
        );
    }
}
