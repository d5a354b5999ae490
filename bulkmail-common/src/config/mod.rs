//! Configuration types for bulkmail.
//!
//! The configuration file is written in RON and currently holds a single
//! [`EmailConfig`] section describing the outbound mail account, the message
//! templates and the retry behaviour of the delivery engine.
//!
//! ```ron
//! (
//!     email: (
//!         host: "smtp.example.com",
//!         user_email_address: "office@example.com",
//!         subject: "Results for {{Name}}",
//!         body_file: "body.txt",
//!     ),
//! )
//! ```

pub mod email;

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub use email::{EmailConfig, RetryPolicy};

/// Errors raised while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read configuration from {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid RON or does not match the expected layout.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// A value was parsed but is not acceptable.
    #[error("Invalid configuration for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Top level configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub email: EmailConfig,
}

impl Config {
    /// Parse a configuration from RON text and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed input and
    /// [`ConfigError::Invalid`] for values outside their allowed range.
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text)?;
        config.email.validate()?;
        Ok(config)
    }

    /// Read, parse and validate the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// See [`Config::from_ron`]; additionally fails when the file cannot be read.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_ron(&text)
    }
}
