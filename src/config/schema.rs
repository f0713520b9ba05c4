//! Configuration schema definitions.

use std::path::PathBuf;
use std::time::Duration;

/// Default HTTP bind address.
pub const DEFAULT_HTTP_ADDR: &str = ":8080";

/// Default FastCGI TCP bind address.
pub const DEFAULT_FCGI_ADDR: &str = ":9001";

/// Default FastCGI Unix socket path. Only this path is removed on exit.
pub const DEFAULT_FCGI_SOCK: &str = "/tmp/go.sock";

/// Default `Keep-Alive: timeout=` value in seconds.
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 60;

/// Root configuration for the responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponderConfig {
    /// HTTP bind address (e.g. ":8080" or "127.0.0.1:8080").
    pub http_addr: String,

    /// FastCGI TCP bind address.
    pub fcgi_addr: String,

    /// FastCGI Unix domain socket path.
    pub fcgi_sock: PathBuf,

    /// How long to wait between the shutdown signal and exit.
    pub term_wait: Duration,

    /// Advertised keep-alive timeout in seconds. Zero omits the header.
    pub keep_alive_secs: u64,

    /// Enable debug level logging.
    pub debug: bool,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            fcgi_addr: DEFAULT_FCGI_ADDR.to_string(),
            fcgi_sock: PathBuf::from(DEFAULT_FCGI_SOCK),
            term_wait: Duration::ZERO,
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
            debug: false,
        }
    }
}

impl ResponderConfig {
    /// Whether the configured socket is the compiled-in default path.
    pub fn uses_default_socket(&self) -> bool {
        self.fcgi_sock.as_os_str() == DEFAULT_FCGI_SOCK
    }
}

/// Port an empty HTTP address falls back to (`:http`).
pub const HTTP_PORT: u16 = 80;

/// Turn a listen address into the addresses to try binding, in order.
///
/// A bare `:port` means every interface: dual-stack `[::]` first, then IPv4
/// for hosts without IPv6. An empty port picks an ephemeral one.
pub fn bind_addresses(addr: &str) -> Vec<String> {
    let addr = match addr.strip_suffix(':') {
        Some(host) => format!("{host}:0"),
        None => addr.to_string(),
    };
    match addr.strip_prefix(':') {
        Some(port) => vec![format!("[::]:{port}"), format!("0.0.0.0:{port}")],
        None => vec![addr],
    }
}

/// Bind candidates for the HTTP listener. Empty means `:http`.
pub fn http_bind_addresses(addr: &str) -> Vec<String> {
    if addr.is_empty() {
        bind_addresses(&format!(":{HTTP_PORT}"))
    } else {
        bind_addresses(addr)
    }
}

/// Bind candidates for the FastCGI TCP listener. Empty means any port.
pub fn fcgi_bind_addresses(addr: &str) -> Vec<String> {
    if addr.is_empty() {
        bind_addresses(":0")
    } else {
        bind_addresses(addr)
    }
}
