//! Outbound email account and delivery settings.

use std::time::Duration;

use serde::Deserialize;

use super::ConfigError;

/// Settings for the outbound mail account and the delivery engine.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// SMTP server host name
    pub host: String,

    /// SMTP server port
    ///
    /// Default: 587 (submission)
    #[serde(default = "defaults::port")]
    pub port: u16,

    /// Account used to authenticate and as the sender address
    pub user_email_address: String,

    /// Display name shown next to the sender address
    ///
    /// Default: the user email address
    #[serde(default)]
    pub return_address: Option<String>,

    /// Subject template, rendered per recipient group
    pub subject: String,

    /// Body template file, relative to the configuration file
    pub body_file: String,

    /// Retry budget shared by connection attempts and unproductive send attempts
    ///
    /// Default: 3
    #[serde(default = "defaults::retries")]
    pub retries: u32,

    /// Pause between retries (in milliseconds)
    ///
    /// Default: 5000 milliseconds
    #[serde(default = "defaults::wait_ms")]
    pub wait_ms: u64,

    /// Connect and read timeout for the SMTP connection (in milliseconds)
    ///
    /// Default: 10000 milliseconds
    #[serde(default = "defaults::timeout_ms")]
    pub timeout_ms: u64,

    /// Spreadsheet columns holding recipient addresses
    ///
    /// Default: `["PrimaryEmail", "SecondaryEmail"]`
    #[serde(default = "defaults::target_email_columns")]
    pub target_email_columns: Vec<String>,
}

impl EmailConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.retries == 0 {
            return Err(ConfigError::Invalid {
                field: "email.retries",
                reason: "at least one attempt is required".to_string(),
            });
        }

        if self.target_email_columns.is_empty() {
            return Err(ConfigError::Invalid {
                field: "email.target_email_columns",
                reason: "no recipient columns configured".to_string(),
            });
        }

        Ok(())
    }

    #[must_use]
    pub fn return_address(&self) -> &str {
        self.return_address
            .as_deref()
            .unwrap_or(&self.user_email_address)
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            wait: Duration::from_millis(self.wait_ms),
        }
    }
}

/// Fixed-delay retry budget.
///
/// The same budget applies independently to connecting and to resuming a
/// batch: each connector call gets a fresh budget of `retries` attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts
    pub retries: u32,
    /// Pause between attempts
    pub wait: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(retries: u32, wait: Duration) -> Self {
        Self { retries, wait }
    }

    /// Check if another attempt is allowed after `attempts_used` attempts.
    #[must_use]
    pub const fn should_retry(&self, attempts_used: u32) -> bool {
        attempts_used < self.retries
    }

    /// Get the number of attempts left, saturating at zero.
    #[must_use]
    pub const fn remaining_attempts(&self, attempts_used: u32) -> u32 {
        self.retries.saturating_sub(attempts_used)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: defaults::retries(),
            wait: Duration::from_millis(defaults::wait_ms()),
        }
    }
}

mod defaults {
    pub const fn port() -> u16 {
        587
    }

    pub const fn retries() -> u32 {
        3
    }

    pub const fn wait_ms() -> u64 {
        5000
    }

    pub const fn timeout_ms() -> u64 {
        10_000
    }

    pub fn target_email_columns() -> Vec<String> {
        vec!["PrimaryEmail".to_string(), "SecondaryEmail".to_string()]
    }
}
