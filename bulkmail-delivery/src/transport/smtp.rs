//! SMTP transport built on lettre's blocking client connection.
//!
//! Connection setup:
//! - connect with the configured timeout (implicit TLS on the submissions port)
//! - upgrade with STARTTLS when the server offers it
//! - authenticate with PLAIN or LOGIN when a user name is configured
//!
//! Each message is a full MAIL FROM / RCPT TO / DATA transaction so that
//! refused recipients can be told apart from a broken connection.

use bulkmail_common::{outbound, tracing::debug};
use lettre::{
    Address,
    transport::smtp::{
        self, SUBMISSIONS_PORT,
        authentication::{Credentials, Mechanism},
        client::{SmtpConnection, TlsParameters},
        commands::{Data, Mail, Rcpt, Rset},
        extension::ClientId,
    },
};

use super::{ConnectError, Connection, MailTransport, SendError, ServerSettings};
use crate::message::BuiltMessage;

/// Opens authenticated SMTP sessions.
#[derive(Debug, Clone, Default)]
pub struct SmtpMailer {
    hello: ClientId,
}

impl SmtpMailer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `hello` as the EHLO name instead of the local host name.
    #[must_use]
    pub const fn with_hello(hello: ClientId) -> Self {
        Self { hello }
    }
}

impl MailTransport for SmtpMailer {
    type Connection = SmtpSession;

    fn connect(&self, server: &ServerSettings) -> Result<SmtpSession, ConnectError> {
        let tls = TlsParameters::new(server.host.clone())
            .map_err(|e| ConnectError::ProviderUnavailable(e.to_string()))?;
        let implicit_tls = (server.port == SUBMISSIONS_PORT).then_some(&tls);

        let mut connection = SmtpConnection::connect(
            (server.host.as_str(), server.port),
            Some(server.timeout),
            &self.hello,
            implicit_tls,
            None,
        )
        .map_err(|e| ConnectError::Transient(e.to_string()))?;

        if implicit_tls.is_none() && connection.can_starttls() {
            connection
                .starttls(&tls, &self.hello)
                .map_err(|e| ConnectError::Transient(e.to_string()))?;
        }

        if !server.user_name.is_empty() {
            let credentials = Credentials::new(server.user_name.clone(), server.password.clone());
            connection
                .auth(&[Mechanism::Plain, Mechanism::Login], &credentials)
                .map_err(|e| ConnectError::Transient(e.to_string()))?;
        }

        outbound!(
            level = DEBUG,
            host = %server.host,
            port = server.port,
            encrypted = connection.is_encrypted(),
            "Connected to email server"
        );

        Ok(SmtpSession { connection })
    }
}

/// One live SMTP session.
pub struct SmtpSession {
    connection: SmtpConnection,
}

impl SmtpSession {
    fn command<C: std::fmt::Display>(&mut self, command: C) -> Result<(), SendError> {
        self.connection.command(command).map(drop).map_err(classify)
    }

    /// A permanent reply to MAIL FROM, DATA or the message content refuses
    /// this message for all of its recipients. The session stays usable, so
    /// the open transaction is reset when the server still holds one.
    fn refuse(&mut self, error: smtp::Error, recipients: &[Address], reset: bool) -> SendError {
        if !error.is_permanent() {
            return classify(error);
        }

        debug!(error = %error, "Message refused");
        if reset && let Err(e) = self.command(Rset) {
            return e;
        }

        SendError::Addresses {
            sent: Vec::new(),
            unsent: recipients.iter().map(ToString::to_string).collect(),
        }
    }
}

impl Connection for SmtpSession {
    fn send(&mut self, message: &BuiltMessage) -> Result<(), SendError> {
        let envelope = message.message().envelope();
        if let Err(e) = self.connection.command(Mail::new(envelope.from().cloned(), vec![])) {
            return Err(self.refuse(e, envelope.to(), true));
        }

        let mut sent = Vec::new();
        let mut unsent = Vec::new();
        for address in envelope.to() {
            match self.connection.command(Rcpt::new(address.clone(), vec![])) {
                Ok(_) => sent.push(address.to_string()),
                Err(e) if e.is_permanent() || e.is_transient() => {
                    debug!(error = %e, "Recipient {address} refused");
                    unsent.push(address.to_string());
                }
                Err(e) => return Err(classify(e)),
            }
        }

        if sent.is_empty() {
            self.command(Rset)?;
            return Err(SendError::Addresses { sent, unsent });
        }

        if let Err(e) = self.connection.command(Data) {
            return Err(self.refuse(e, envelope.to(), true));
        }
        if let Err(e) = self.connection.message(&message.message().formatted()) {
            return Err(self.refuse(e, envelope.to(), false));
        }

        if unsent.is_empty() {
            Ok(())
        } else {
            Err(SendError::Addresses { sent, unsent })
        }
    }

    fn close(&mut self) -> Result<(), SendError> {
        self.connection.quit().map(drop).map_err(classify)
    }
}

/// Client-side failures cannot be retried. Anything else, including a reply
/// cut short by a dropped connection, leaves the session unusable.
fn classify(error: smtp::Error) -> SendError {
    if error.is_client() {
        SendError::Unexpected(error.to_string())
    } else {
        SendError::Transport(error.to_string())
    }
}

