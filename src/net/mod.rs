//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP / Unix connection
//!     → listener.rs (accept loop, keep-alive, shutdown)
//!     → connection.rs (unified stream, lifecycle tracking)
//!     → Hand off to HTTP or FastCGI server
//!
//! Listener States:
//!     Unstarted → Listening → Draining → Closed
//! ```
//!
//! # Design Decisions
//! - One accept loop per listener, each owning its listener
//! - Closing a listener is the normal way an accept loop ends
//! - Accepted connections are never force-closed by shutdown

pub mod connection;
pub mod listener;
pub mod transport;

pub use connection::{Connection, ConnectionTracker, PeerAddr, Stream};
pub use listener::{serve, ListenAddr, Listener, ListenerError, ListenerState};
pub use transport::Transport;
