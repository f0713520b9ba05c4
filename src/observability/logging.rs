//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Output goes to stderr so stdout stays free
//! - `RUST_LOG` overrides the level chosen by `--debug`

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
pub fn default_filter(debug: bool) -> &'static str {
    if debug {
        "latent_responder=debug,tower_http=debug"
    } else {
        "latent_responder=info"
    }
}

/// Install the global tracing subscriber.
pub fn init(debug: bool) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(debug).into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
