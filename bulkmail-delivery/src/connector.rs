//! Opening a connection with a bounded, fixed-delay retry.

use std::io::Write;

use bulkmail_common::{config::email::RetryPolicy, internal, tracing::warn};

use crate::{
    error::DeliveryError,
    progress::{Mark, ProgressReporter},
    transport::{ConnectError, MailTransport, ServerSettings},
};

/// Connect to `server`, retrying transient failures.
///
/// Each failed attempt prints [`Mark::ConnectRetry`] with the attempt number
/// as counter. The budget of `policy.retries` attempts is local to this call.
///
/// # Errors
///
/// [`DeliveryError::ProviderUnavailable`] at once when the transport cannot
/// be used, and [`DeliveryError::ConnectRetriesExhausted`] carrying the last
/// failure when no attempt succeeded.
pub fn connect<T, W>(
    transport: &T,
    server: &ServerSettings,
    policy: &RetryPolicy,
    reporter: &mut ProgressReporter<W>,
) -> Result<T::Connection, DeliveryError>
where
    T: MailTransport,
    W: Write,
{
    let mut attempt = 0;

    loop {
        attempt += 1;
        internal!(
            level = DEBUG,
            host = %server.host,
            port = server.port,
            remaining = policy.remaining_attempts(attempt),
            "Connection attempt {attempt}"
        );

        let error = match transport.connect(server) {
            Ok(connection) => return Ok(connection),
            Err(e @ ConnectError::ProviderUnavailable(_)) => {
                return Err(DeliveryError::ProviderUnavailable(e));
            }
            Err(e @ ConnectError::Transient(_)) => e,
        };

        warn!(attempt, error = %error, "Unable to connect to email server");
        reporter.report(attempt as usize, Mark::ConnectRetry);

        if !policy.should_retry(attempt) {
            return Err(DeliveryError::ConnectRetriesExhausted {
                retries: attempt,
                source: error,
            });
        }

        std::thread::sleep(policy.wait);
    }
}
