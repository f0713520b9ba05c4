//! Observability subsystem.
//!
//! Every subsystem emits `tracing` events with structured fields; this module
//! only installs the subscriber.

pub mod logging;
