//! Mail transport abstraction.
//!
//! The delivery engine never speaks SMTP itself. It asks a [`MailTransport`]
//! for a [`Connection`], pushes built messages through it and closes it. The
//! error types here carry exactly the distinctions the engine acts on:
//!
//! - [`ConnectError::ProviderUnavailable`] - the transport cannot work at all, stop
//! - [`ConnectError::Transient`] - try connecting again after a pause
//! - [`SendError::Addresses`] - some or all recipients were refused, keep going
//! - [`SendError::Transport`] - the connection broke, reconnect and resume
//! - [`SendError::Unexpected`] - anything else, stop the run

pub mod smtp;

use std::time::Duration;

use thiserror::Error;

pub use smtp::SmtpMailer;

use crate::message::BuiltMessage;

/// Coordinates and credentials of the outbound mail server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub user_name: String,
    pub password: String,
    /// Connect and read timeout
    pub timeout: Duration,
}

/// Failures while establishing a connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The transport is misconfigured or unsupported; retrying cannot help.
    #[error("Mail provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The server could not be reached or refused the session for now.
    #[error("Connection failed: {0}")]
    Transient(String),
}

/// Failures while sending one message over a live connection.
#[derive(Debug, Error)]
pub enum SendError {
    /// The server refused some or all recipients.
    ///
    /// When `sent` is non-empty the message was still delivered to those
    /// addresses.
    #[error("Emails sent to '{}' and emails not delivered to '{}'.", sent.join(", "), unsent.join(", "))]
    Addresses { sent: Vec<String>, unsent: Vec<String> },

    /// The protocol exchange failed; the connection is no longer usable.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// A failure that fits none of the above.
    #[error("Unexpected failure: {0}")]
    Unexpected(String),
}

/// Source of connections to the outbound mail server.
pub trait MailTransport {
    type Connection: Connection;

    /// Open and authenticate a new connection.
    ///
    /// # Errors
    ///
    /// See [`ConnectError`] for how failures are classified.
    fn connect(&self, server: &ServerSettings) -> Result<Self::Connection, ConnectError>;
}

/// A live, exclusively owned connection.
pub trait Connection {
    /// Deliver `message` to all of its recipients.
    ///
    /// # Errors
    ///
    /// See [`SendError`] for how failures are classified.
    fn send(&mut self, message: &BuiltMessage) -> Result<(), SendError>;

    /// End the session.
    ///
    /// # Errors
    ///
    /// Callers only log a failure to close.
    fn close(&mut self) -> Result<(), SendError>;
}
