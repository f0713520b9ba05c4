//! Latent responder.
//!
//! ```text
//!   :8080  HTTP/1.1 ─────┐
//!   :9001  FastCGI ──────┼──▶ responder ──▶ "Hello World" | sleep n, "slept for n seconds"
//!   /tmp/go.sock FastCGI ┘
//!
//!   SIGTERM/SIGINT ──▶ close listeners ──▶ sleep --term-wait ──▶ exit 0
//! ```

use clap::Parser;

use latent_responder::config::cli::Cli;
use latent_responder::lifecycle;
use latent_responder::observability::logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config();

    logging::init(config.debug);

    tracing::info!("latent-responder v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        http_addr = %config.http_addr,
        fcgi_addr = %config.fcgi_addr,
        fcgi_sock = %config.fcgi_sock.display(),
        term_wait_secs = config.term_wait.as_secs(),
        keep_alive_secs = config.keep_alive_secs,
        "Configuration loaded"
    );

    lifecycle::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
