use std::io::Write;

use bulkmail_common::{
    config::{EmailConfig, RetryPolicy},
    internal,
    tracing::{error, info},
    unit::UnitOfWork,
};

use crate::{
    error::DeliveryError,
    message::MessageBuilder,
    orchestrator,
    progress::ProgressReporter,
    render,
    transport::{MailTransport, ServerSettings},
};

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliverySummary {
    /// Messages delivered to all of their recipients
    pub sent: usize,
    /// Messages that could be built
    pub possible: usize,
}

/// Builds and delivers one message per unit of work.
pub struct BulkEmail<T, W> {
    transport: T,
    reporter: ProgressReporter<W>,
    target_columns: Vec<String>,
    subject: String,
    policy: RetryPolicy,
}

impl<T, W> BulkEmail<T, W>
where
    T: MailTransport,
    W: Write,
{
    /// # Arguments
    /// * `config` - Email section of the configuration file
    /// * `transport` - Source of connections to the mail server
    /// * `sink` - Where progress marks are written
    pub fn new(config: &EmailConfig, transport: T, sink: W) -> Self {
        Self {
            transport,
            reporter: ProgressReporter::new(sink),
            target_columns: config.target_email_columns.clone(),
            subject: config.subject.clone(),
            policy: config.retry_policy(),
        }
    }

    /// Build a message for each unit and deliver them, or only render them
    /// when `simulate` is set.
    ///
    /// # Errors
    ///
    /// Any [`DeliveryError`] ends the run; messages already delivered stay
    /// delivered.
    pub fn send_emails(
        &mut self,
        units: &[UnitOfWork],
        simulate: bool,
        server: &ServerSettings,
        from_address: &str,
        body_template: &str,
    ) -> Result<DeliverySummary, DeliveryError> {
        self.reporter.line("");

        let messages = MessageBuilder::new(
            &self.target_columns,
            &self.subject,
            body_template,
            &server.user_name,
            from_address,
        )
        .build(units)?;

        internal!(
            level = INFO,
            units = units.len(),
            messages = messages.len(),
            simulate,
            "Built messages"
        );

        if simulate {
            for message in &messages {
                match render::render(message.message()) {
                    Ok(text) => info!(group = message.group_id(), "{text}"),
                    Err(e) => error!(error = %e, "Unable to render the email message."),
                }
            }

            return Ok(DeliverySummary {
                sent: 0,
                possible: messages.len(),
            });
        }

        let sent = orchestrator::deliver(
            &self.transport,
            server,
            &messages,
            &self.policy,
            &mut self.reporter,
        )?;

        let summary = DeliverySummary {
            sent,
            possible: messages.len(),
        };
        self.reporter.line("");
        self.reporter.line(&format!(
            "Sent {} of {} possible emails.",
            summary.sent, summary.possible
        ));

        Ok(summary)
    }

    /// Progress sink, for inspecting what was written.
    pub const fn sink(&self) -> &W {
        self.reporter.sink()
    }
}
