//! Command line parsing.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::schema::{
    ResponderConfig, DEFAULT_FCGI_ADDR, DEFAULT_FCGI_SOCK, DEFAULT_HTTP_ADDR,
    DEFAULT_KEEP_ALIVE_SECS,
};

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(name = "latent-responder", version)]
#[command(about = "Simulates latent clients and clients that need a lot of time to shut down")]
#[command(
    long_about = "Simulates latent clients and clients that need a lot of time to shut down. \
                  For use with drain testing behind a load balancer or orchestrator.\n\n\
                  Request GET /sleep/60 to hold the response for 60 seconds."
)]
pub struct Cli {
    /// Set the HTTP bind address
    #[arg(long, default_value = DEFAULT_HTTP_ADDR)]
    pub http_addr: String,

    /// FastCGI TCP bind address
    #[arg(long, default_value = DEFAULT_FCGI_ADDR)]
    pub fcgi_addr: String,

    /// FastCGI Unix socket path
    #[arg(long, default_value = DEFAULT_FCGI_SOCK)]
    pub fcgi_sock: PathBuf,

    /// How long to wait between SIGTERM and exit, in seconds
    #[arg(long, value_name = "SECONDS", default_value_t = 0)]
    pub term_wait: u64,

    /// Keep-Alive header timeout in seconds (0 omits the header)
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_KEEP_ALIVE_SECS)]
    pub keep_alive: u64,

    /// Turn on debug level logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    pub fn into_config(self) -> ResponderConfig {
        ResponderConfig {
            http_addr: self.http_addr,
            fcgi_addr: self.fcgi_addr,
            fcgi_sock: self.fcgi_sock,
            term_wait: Duration::from_secs(self.term_wait),
            keep_alive_secs: self.keep_alive,
            debug: self.debug,
        }
    }
}
