//! Transport labels attached to every request.

use std::fmt;

/// Which listener a request arrived on.
///
/// Inserted into request extensions by each protocol server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Http,
    FcgiTcp,
    FcgiUnix,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Http => "http",
            Transport::FcgiTcp => "fcgi-tcp",
            Transport::FcgiUnix => "fcgi-unix",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
