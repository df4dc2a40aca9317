//! CLI command implementations for Ratchet.

pub(crate) mod disasm;
pub(crate) mod play;
pub(crate) mod validate;

use std::error::Error;
use std::fmt;

use tracing_subscriber::{EnvFilter, fmt as log_fmt};

/// Install the log subscriber. `RUST_LOG` overrides the default filter.
pub(crate) fn init_logging(debug: bool) {
    let default = if debug {
        "ratchet=debug,bot=info"
    } else {
        "ratchet=info,bot=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    log_fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

/// CLI error type.
#[derive(Debug)]
pub(crate) struct CliError {
    message: String,
}

impl CliError {
    /// Create a new CLI error.
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<ratchet::sandbox::LoadError> for CliError {
    fn from(e: ratchet::sandbox::LoadError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<ratchet::transport::TransportError> for CliError {
    fn from(e: ratchet::transport::TransportError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<ratchet::session::SessionError> for CliError {
    fn from(e: ratchet::session::SessionError) -> Self {
        Self::new(e.to_string())
    }
}
