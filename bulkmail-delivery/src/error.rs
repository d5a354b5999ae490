//! Typed error handling for delivery runs.
//!
//! Only failures that end the whole run surface as [`DeliveryError`]:
//! - Configuration defects (missing address columns, broken templates)
//! - An unusable mail provider
//! - Retry budgets exhausted while connecting or sending
//! - Unknown failures while sending
//!
//! Skipped units and refused recipients are handled where they occur and
//! never become errors.

use bulkmail_common::template::TemplateError;
use thiserror::Error;

use crate::{
    message::TemplatePart,
    transport::{ConnectError, SendError},
};

/// A failure that aborts the run.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Configured recipient columns are absent from the spreadsheet.
    #[error(
        "The spreadsheet does not contain the columns {0} that define target email addresses."
    )]
    MissingColumns(String),

    /// A template refers to a column the recipient group does not have.
    #[error("The {part} of the email to be sent to {recipients} contains an undefined variable: {name}")]
    UndefinedVariable {
        part: TemplatePart,
        recipients: String,
        name: String,
    },

    /// A template could not be rendered for another reason.
    #[error(
        "An unexpected error occurred when creating the {part} text of the email message to be sent to {recipients}."
    )]
    Template {
        part: TemplatePart,
        recipients: String,
        #[source]
        source: TemplateError,
    },

    /// The transport cannot be used at all.
    #[error("Failure to connect to Email server.")]
    ProviderUnavailable(#[source] ConnectError),

    /// Every connection attempt failed.
    #[error("Unable to connect to email server after {retries} retries.")]
    ConnectRetriesExhausted {
        retries: u32,
        #[source]
        source: ConnectError,
    },

    /// Reconnecting kept failing without sending anything.
    #[error("Unable to send email for group ID {group_id} after {retries} attempts.")]
    SendRetriesExhausted {
        group_id: String,
        retries: u32,
        #[source]
        source: SendError,
    },

    /// Sending failed in a way the transport could not classify.
    #[error(
        "Email server was unable to deliver message in record {record} to {recipients} due to an unknown issue. The email was not sent."
    )]
    UnknownSendFailure {
        record: usize,
        recipients: String,
        #[source]
        source: SendError,
    },
}

impl DeliveryError {
    /// Returns `true` if the run failed because of its configuration or
    /// input data rather than the mail server.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingColumns(_) | Self::UndefinedVariable { .. } | Self::Template { .. }
        )
    }

    /// Returns `true` if the run failed after exhausting a retry budget.
    #[must_use]
    pub const fn is_retries_exhausted(&self) -> bool {
        matches!(
            self,
            Self::ConnectRetriesExhausted { .. } | Self::SendRetriesExhausted { .. }
        )
    }
}
