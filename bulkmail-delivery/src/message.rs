//! Turning units of work into ready-to-send messages.
//!
//! A unit that cannot produce a valid message (no usable recipient address,
//! missing attachment, malformed sender) is skipped with a log entry and the
//! run continues. Problems that would affect every unit (a configured address
//! column missing from the spreadsheet, a broken template) abort the run.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use bulkmail_common::{
    template::{TemplateError, TextBuilder},
    tracing::{debug, error, warn},
    unit::{Row, UnitOfWork},
};
use lettre::{
    Address, Message,
    message::{
        Attachment, Mailbox, MultiPart, SinglePart,
        header::{ContentType, ContentTypeErr},
    },
};
use thiserror::Error;

use crate::error::DeliveryError;

/// Group identifier used when a recipient group has none.
pub const UNKNOWN_GROUP: &str = "unknown";

/// A message ready for delivery, together with what it was built from.
#[derive(Debug, Clone)]
pub struct BuiltMessage {
    group_id: String,
    recipients: Vec<Address>,
    subject: String,
    body: String,
    attachments: Vec<PathBuf>,
    message: Message,
}

impl BuiltMessage {
    #[must_use]
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// Never empty.
    #[must_use]
    pub fn recipients(&self) -> &[Address] {
        &self.recipients
    }

    /// Recipients joined for log and error messages.
    #[must_use]
    pub fn recipient_list(&self) -> String {
        join_addresses(&self.recipients)
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    #[must_use]
    pub fn attachments(&self) -> &[PathBuf] {
        &self.attachments
    }

    /// The MIME message handed to the transport.
    #[must_use]
    pub const fn message(&self) -> &Message {
        &self.message
    }
}

pub(crate) fn join_addresses(addresses: &[Address]) -> String {
    addresses
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Which template failed to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplatePart {
    Subject,
    Body,
}

impl fmt::Display for TemplatePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subject => f.write_str("subject"),
            Self::Body => f.write_str("body"),
        }
    }
}

/// Reasons a single message could not be put together.
#[derive(Debug, Error)]
enum ComposeError {
    #[error("attachment {} could not be read: {source}", path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid content type: {0}")]
    ContentType(#[from] ContentTypeErr),

    #[error("message could not be built: {0}")]
    Build(#[from] lettre::error::Error),
}

/// Builds one [`BuiltMessage`] per usable unit of work.
pub struct MessageBuilder<'a> {
    target_columns: &'a [String],
    subject_template: &'a str,
    body_template: &'a str,
    user_name: &'a str,
    from_address: &'a str,
    text: TextBuilder,
}

impl<'a> MessageBuilder<'a> {
    /// # Arguments
    /// * `target_columns` - Spreadsheet columns holding recipient addresses
    /// * `subject_template` - Template for the subject line
    /// * `body_template` - Template for the plain text body
    /// * `user_name` - Sender address (the mail account)
    /// * `from_address` - Display name shown with the sender address
    #[must_use]
    pub fn new(
        target_columns: &'a [String],
        subject_template: &'a str,
        body_template: &'a str,
        user_name: &'a str,
        from_address: &'a str,
    ) -> Self {
        Self {
            target_columns,
            subject_template,
            body_template,
            user_name,
            from_address,
            text: TextBuilder::new(),
        }
    }

    /// Build messages for `units`, preserving their order.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::MissingColumns`] when a configured address
    /// column does not exist, and a template error when a subject or body
    /// cannot be rendered. Both abort the whole run.
    pub fn build(&self, units: &[UnitOfWork]) -> Result<Vec<BuiltMessage>, DeliveryError> {
        units
            .iter()
            .filter_map(|unit| self.build_one(unit).transpose())
            .collect()
    }

    /// Build the message for one unit, or `None` if the unit is skipped.
    ///
    /// # Errors
    ///
    /// See [`MessageBuilder::build`].
    pub fn build_one(&self, unit: &UnitOfWork) -> Result<Option<BuiltMessage>, DeliveryError> {
        let group = unit.group();
        let row = group.head_row();
        let group_id = group.group_id().unwrap_or(UNKNOWN_GROUP).to_string();

        let emails = self.valid_email_addresses(row)?;
        if emails.is_empty() {
            warn!(
                group = %group_id,
                "No email sent because the required email address was unavailable."
            );
            return Ok(None);
        }
        let recipients = emails.join(",");

        if !unit.attachments().iter().all(|path| path.exists()) {
            let file_names = unit
                .attachments()
                .iter()
                .map(|path| display_name(path))
                .collect::<Vec<_>>()
                .join(", ");
            warn!(group = %group_id, "Files '{file_names}' not found. Skip sending email.");
            return Ok(None);
        }

        let subject = self.render(TemplatePart::Subject, self.subject_template, row, &recipients)?;
        let body = self.render(TemplatePart::Body, self.body_template, row, &recipients)?;

        let Ok(sender) = self.user_name.parse::<Address>() else {
            error!(
                group = %group_id,
                "Email address incorrectly formed for {} or {}. Email was not sent.",
                self.user_name,
                self.from_address
            );
            return Ok(None);
        };

        let addresses = match emails
            .iter()
            .map(|email| email.parse::<Address>())
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(addresses) => addresses,
            Err(e) => {
                error!(group = %group_id, error = %e, "Unable to create message for {recipients}");
                return Ok(None);
            }
        };

        let from = Mailbox::new(Some(self.from_address.to_string()), sender);
        match compose(from, &addresses, &subject, &body, unit.attachments()) {
            Ok(message) => {
                debug!(group = %group_id, "Built message for {recipients}");
                Ok(Some(BuiltMessage {
                    group_id,
                    recipients: addresses,
                    subject,
                    body,
                    attachments: unit.attachments().to_vec(),
                    message,
                }))
            }
            Err(e) => {
                error!(group = %group_id, error = %e, "Unable to create message. Email was not sent.");
                Ok(None)
            }
        }
    }

    fn valid_email_addresses(&self, row: &Row) -> Result<Vec<String>, DeliveryError> {
        let missing = self
            .target_columns
            .iter()
            .map(|column| column.trim())
            .filter(|column| !row.has_column(column))
            .collect::<Vec<_>>();

        if !missing.is_empty() {
            return Err(DeliveryError::MissingColumns(missing.join(", ")));
        }

        Ok(self
            .target_columns
            .iter()
            .filter_map(|column| row.value(column.trim()))
            .map(str::trim)
            .filter(|value| value.contains('@'))
            .map(str::to_string)
            .collect())
    }

    fn render(
        &self,
        part: TemplatePart,
        template: &str,
        row: &Row,
        recipients: &str,
    ) -> Result<String, DeliveryError> {
        self.text
            .substitute(template, row.variables())
            .map_err(|source| match source {
                TemplateError::UndefinedVariable(name) => DeliveryError::UndefinedVariable {
                    part,
                    recipients: recipients.to_string(),
                    name,
                },
                source => DeliveryError::Template {
                    part,
                    recipients: recipients.to_string(),
                    source,
                },
            })
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .into_owned()
}

fn content_type(path: &Path) -> Result<ContentType, ContentTypeErr> {
    let is_pdf = path
        .extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("pdf"));

    ContentType::parse(if is_pdf {
        "application/pdf"
    } else {
        "application/octet-stream"
    })
}

fn compose(
    from: Mailbox,
    recipients: &[Address],
    subject: &str,
    body: &str,
    attachments: &[PathBuf],
) -> Result<Message, ComposeError> {
    let mut builder = Message::builder().from(from).subject(subject).date_now();
    for address in recipients {
        builder = builder.to(Mailbox::new(None, address.clone()));
    }

    let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(body.to_string()));
    for path in attachments {
        let content = std::fs::read(path).map_err(|source| ComposeError::Attachment {
            path: path.clone(),
            source,
        })?;
        parts = parts.singlepart(Attachment::new(display_name(path)).body(content, content_type(path)?));
    }

    Ok(builder.multipart(parts)?)
}
