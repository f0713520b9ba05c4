//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! process arguments
//!     → cli.rs (clap parsing, usage text)
//!     → ResponderConfig (immutable)
//!     → validation.rs (semantic checks)
//!     → passed by value into the lifecycle
//! ```
//!
//! # Design Decisions
//! - Config is parsed once at startup and never mutated
//! - Every field has a compiled-in default matching the CLI defaults
//! - Validation reports every problem at once, not just the first

pub mod cli;
pub mod schema;
pub mod validation;

pub use schema::ResponderConfig;
pub use validation::{validate_config, ValidationError};

/// Error type for configuration handling.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validate a configuration, wrapping every failure into a [`ConfigError`].
pub fn check(config: &ResponderConfig) -> Result<(), ConfigError> {
    validate_config(config).map_err(ConfigError::Validation)
}
