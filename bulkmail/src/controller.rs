use std::{
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Context;
use bulkmail_common::{
    config::Config,
    internal,
    tracing::warn,
    unit::{self, UnitOfWork},
};
use bulkmail_delivery::{
    BulkEmail, DeliveryError, DeliverySummary, MailTransport, ServerSettings, SmtpMailer,
};

/// What to send and how, as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Configuration file
    pub configuration: PathBuf,
    /// Unit manifest produced by the form filling step
    pub units: PathBuf,
    /// Password of the mail account
    pub password: Option<String>,
    /// Skip every unit before the first one of this group
    pub group_id: Option<String>,
    /// Render messages instead of sending them
    pub simulate: bool,
}

/// Everything a run needs, loaded and checked up front.
#[derive(Debug)]
pub struct Bulkmail {
    config: Config,
    body: String,
    units: Vec<UnitOfWork>,
    password: Option<String>,
    simulate: bool,
}

impl Bulkmail {
    /// Load the configuration, body template and units named by `options`.
    ///
    /// # Errors
    ///
    /// Fails when any input cannot be read or is invalid, or when the start
    /// group does not exist.
    pub fn load(options: Options) -> anyhow::Result<Self> {
        let config = Config::load(&options.configuration)?;

        let body_path = body_path(&options.configuration, &config.email.body_file);
        if !body_path.is_file() {
            anyhow::bail!(
                "File '{}' does not exist. Please correct your configurations.",
                body_path.display()
            );
        }
        let body = std::fs::read_to_string(&body_path)
            .with_context(|| format!("Unable to read the email body from {}", body_path.display()))?;

        let mut units = unit::load_manifest(&options.units)?;
        if let Some(group_id) = &options.group_id {
            units = unit::starting_at(units, group_id)?;
        }

        internal!(
            level = INFO,
            units = units.len(),
            simulate = options.simulate,
            "Loaded {}",
            options.units.display()
        );

        Ok(Self {
            config,
            body,
            units,
            password: options.password,
            simulate: options.simulate,
        })
    }

    /// Deliver over SMTP, writing progress to stdout.
    ///
    /// Returns `None` when nothing was attempted because no password was
    /// given for a real run.
    ///
    /// # Errors
    ///
    /// Any fatal delivery failure.
    pub fn run(&self) -> anyhow::Result<Option<DeliverySummary>> {
        self.run_with(SmtpMailer::new(), std::io::stdout())
    }

    /// [`Bulkmail::run`] with an explicit transport and progress sink.
    ///
    /// # Errors
    ///
    /// Any fatal delivery failure.
    pub fn run_with<T, W>(&self, transport: T, sink: W) -> anyhow::Result<Option<DeliverySummary>>
    where
        T: MailTransport,
        W: Write,
    {
        if self.password.is_none() && !self.simulate {
            warn!("No password was provided, so no email is delivered.");
            return Ok(None);
        }

        let email = &self.config.email;
        let server = ServerSettings {
            host: email.host.clone(),
            port: email.port,
            user_name: email.user_email_address.clone(),
            password: self.password.clone().unwrap_or_default(),
            timeout: email.timeout(),
        };

        let mut bulk = BulkEmail::new(email, transport, sink);
        let summary = bulk.send_emails(
            &self.units,
            self.simulate,
            &server,
            email.return_address(),
            &self.body,
        )?;

        Ok(Some(summary))
    }

    #[must_use]
    pub fn units(&self) -> &[UnitOfWork] {
        &self.units
    }
}

/// What a failed run is blamed on in the failure log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// The spreadsheet columns or templates do not fit together
    Configuration,
    /// The email server kept failing until the retry budget ran out
    RetriesExhausted,
    Other,
}

impl Failure {
    #[must_use]
    pub fn of(error: &anyhow::Error) -> Self {
        match error.downcast_ref::<DeliveryError>() {
            Some(e) if e.is_configuration() => Self::Configuration,
            Some(e) if e.is_retries_exhausted() => Self::RetriesExhausted,
            _ => Self::Other,
        }
    }
}

/// The body file is relative to the configuration file's directory.
fn body_path(configuration: &Path, body_file: &str) -> PathBuf {
    configuration
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(body_file)
}
