//! Delivering a list of messages with progress-preserving retry.
//!
//! Each pass connects, sends from the earliest unconfirmed message and, when
//! the connection breaks, resumes at the failed message on a fresh
//! connection. Only passes that make no progress consume the retry budget.

use std::io::Write;

use bulkmail_common::{config::email::RetryPolicy, internal, tracing::warn};

use crate::{
    connector,
    error::DeliveryError,
    message::BuiltMessage,
    progress::{Mark, ProgressReporter},
    sender::{self, BatchOutcome},
    transport::{MailTransport, ServerSettings},
};

/// Where the retry loop stands after a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    Retrying,
    Succeeded,
    FailedPermanently,
}

/// Progress of one [`deliver`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryState {
    /// Index of the first message not yet attempted to completion
    pub next_index: usize,
    /// Passes that ended without attempting a single message
    pub retries_used: u32,
    /// Messages delivered to all of their recipients
    pub total_sent: usize,
}

impl DeliveryState {
    /// Fold a batch outcome into the state and return the next phase.
    pub fn advance(&mut self, outcome: &BatchOutcome, policy: &RetryPolicy) -> Phase {
        match *outcome {
            BatchOutcome::Completed { sent } => {
                self.total_sent += sent;
                Phase::Succeeded
            }
            BatchOutcome::Aborted {
                failed_index, sent, ..
            } => {
                self.next_index += failed_index;
                self.total_sent += sent;
                if failed_index == 0 {
                    self.retries_used += 1;
                }

                if policy.should_retry(self.retries_used) {
                    Phase::Retrying
                } else {
                    Phase::FailedPermanently
                }
            }
        }
    }
}

/// Deliver `messages` in order and return how many were fully sent.
///
/// # Errors
///
/// Connector failures propagate unchanged. Running out of retries yields
/// [`DeliveryError::SendRetriesExhausted`] for the message that kept failing.
pub fn deliver<T, W>(
    transport: &T,
    server: &ServerSettings,
    messages: &[BuiltMessage],
    policy: &RetryPolicy,
    reporter: &mut ProgressReporter<W>,
) -> Result<usize, DeliveryError>
where
    T: MailTransport,
    W: Write,
{
    let mut state = DeliveryState::default();
    if messages.is_empty() {
        return Ok(state.total_sent);
    }

    let mut phase = Phase::Running;
    loop {
        internal!(
            level = DEBUG,
            next_index = state.next_index,
            retries_used = state.retries_used,
            "Delivery pass {phase:?}"
        );

        let connection = connector::connect(transport, server, policy, reporter)?;
        let outcome = sender::send_batch(connection, messages, state.next_index, reporter)?;
        phase = state.advance(&outcome, policy);

        let BatchOutcome::Aborted {
            group_id, cause, ..
        } = outcome
        else {
            return Ok(state.total_sent);
        };

        reporter.report(state.next_index, Mark::SendRetry);
        warn!(
            group = %group_id,
            error = %cause,
            "Sending interrupted at record {}, reconnecting",
            state.next_index + 1
        );

        if phase == Phase::FailedPermanently {
            return Err(DeliveryError::SendRetriesExhausted {
                group_id,
                retries: state.retries_used,
                source: cause,
            });
        }

        std::thread::sleep(policy.wait);
    }
}
