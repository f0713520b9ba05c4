//! Configuration validation.
//!
//! Validation is a pure function: `&ResponderConfig → Result<(), Vec<ValidationError>>`.
//! It runs before any listener is bound.

use crate::config::schema::ResponderConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} '{value}' has no port")]
    MissingPort { field: &'static str, value: String },
}

/// Check every field, collecting all errors.
///
/// Empty addresses are allowed: HTTP falls back to `:http` and FastCGI to an
/// ephemeral port.
pub fn validate_config(config: &ResponderConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address("http-addr", &config.http_addr, &mut errors);
    check_address("fcgi-addr", &config.fcgi_addr, &mut errors);

    if config.fcgi_sock.as_os_str().is_empty() {
        errors.push(ValidationError::Empty { field: "fcgi-sock" });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if !value.is_empty() && !value.contains(':') {
        errors.push(ValidationError::MissingPort {
            field,
            value: value.to_string(),
        });
    }
}
