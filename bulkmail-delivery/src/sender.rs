//! Sending a contiguous run of messages over one connection.

use std::{
    io::Write,
    ops::{Deref, DerefMut},
};

use bulkmail_common::{
    outbound,
    tracing::{error, info, warn},
};

use crate::{
    error::DeliveryError,
    message::BuiltMessage,
    progress::{Mark, ProgressReporter},
    transport::{Connection, SendError},
};

/// How a single send attempt ended, holding the failure for the caller to
/// report or propagate.
#[derive(Debug)]
pub enum SendOutcome {
    /// Delivered to every recipient.
    Sent,
    /// Delivered, but `failed_count` recipients were refused.
    PartialAddressFailure {
        failed_count: usize,
        cause: SendError,
    },
    /// Every recipient was refused; nothing was delivered.
    TotalAddressFailure(SendError),
    /// The connection broke; the batch stops here.
    TransportFailure(SendError),
    /// The run stops here.
    FatalFailure(SendError),
}

impl SendOutcome {
    #[must_use]
    pub fn classify(result: Result<(), SendError>) -> Self {
        match result {
            Ok(()) => Self::Sent,
            Err(SendError::Addresses { sent, unsent }) if !sent.is_empty() => {
                Self::PartialAddressFailure {
                    failed_count: unsent.len(),
                    cause: SendError::Addresses { sent, unsent },
                }
            }
            Err(cause @ SendError::Addresses { .. }) => Self::TotalAddressFailure(cause),
            Err(cause @ SendError::Transport(_)) => Self::TransportFailure(cause),
            Err(cause @ SendError::Unexpected(_)) => Self::FatalFailure(cause),
        }
    }
}

/// Result of sending one batch.
#[derive(Debug)]
pub enum BatchOutcome {
    /// Every message in the batch was attempted.
    Completed {
        /// Messages delivered to all of their recipients
        sent: usize,
    },
    /// The connection broke before the batch finished.
    Aborted {
        /// Index, relative to the batch start, of the message that failed
        failed_index: usize,
        /// Messages delivered to all of their recipients before the failure
        sent: usize,
        group_id: String,
        cause: SendError,
    },
}

/// Closes the wrapped connection when dropped.
pub struct ConnectionGuard<C: Connection> {
    connection: C,
}

impl<C: Connection> ConnectionGuard<C> {
    pub const fn new(connection: C) -> Self {
        Self { connection }
    }
}

impl<C: Connection> Deref for ConnectionGuard<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.connection
    }
}

impl<C: Connection> DerefMut for ConnectionGuard<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.connection
    }
}

impl<C: Connection> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        if let Err(e) = self.connection.close() {
            warn!(error = %e, "Unable to close connection to email server");
        }
    }
}

/// Send `messages[start..]` in order over `connection`, closing it before
/// returning.
///
/// Address refusals are reported and skipped. A transport failure stops the
/// batch with [`BatchOutcome::Aborted`] so the caller can reconnect and
/// resume at the failed message.
///
/// # Errors
///
/// [`DeliveryError::UnknownSendFailure`] when the transport reports a failure
/// it could not classify.
pub fn send_batch<C, W>(
    connection: C,
    messages: &[BuiltMessage],
    start: usize,
    reporter: &mut ProgressReporter<W>,
) -> Result<BatchOutcome, DeliveryError>
where
    C: Connection,
    W: Write,
{
    let mut connection = ConnectionGuard::new(connection);
    let mut sent = 0;

    for (index, message) in messages.iter().enumerate().skip(start) {
        let record = index + 1;
        match SendOutcome::classify(connection.send(message)) {
            SendOutcome::Sent => {
                sent += 1;
                reporter.report(record, Mark::Sent);
                info!(
                    group = message.group_id(),
                    "Sent message of record {record} to email addresses {}.",
                    message.recipient_list()
                );
            }
            SendOutcome::PartialAddressFailure {
                failed_count,
                cause,
            } => {
                reporter.report(record, Mark::PartialAddressFailure);
                error!(group = message.group_id(), unsent = failed_count, "{cause}");
            }
            SendOutcome::TotalAddressFailure(cause) => {
                reporter.report(record, Mark::TotalAddressFailure);
                error!(
                    group = message.group_id(),
                    error = %cause,
                    "Email server refused every address of record {record}: {}. The email was not sent.",
                    message.recipient_list()
                );
            }
            SendOutcome::TransportFailure(cause) => {
                outbound!(
                    level = WARN,
                    group = message.group_id(),
                    error = %cause,
                    "Connection lost while sending record {record}"
                );
                return Ok(BatchOutcome::Aborted {
                    failed_index: index - start,
                    sent,
                    group_id: message.group_id().to_string(),
                    cause,
                });
            }
            SendOutcome::FatalFailure(cause) => {
                return Err(DeliveryError::UnknownSendFailure {
                    record,
                    recipients: message.recipient_list(),
                    source: cause,
                });
            }
        }
    }

    Ok(BatchOutcome::Completed { sent })
}
