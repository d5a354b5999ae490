//! Scripted mail transport for testing delivery scenarios
//!
//! The transport can:
//! - Fail a number of connection attempts, after letting some succeed
//! - Report the provider as unavailable instead of failing transiently
//! - Fail a number of sends, after letting some succeed, either by breaking
//!   the connection or by refusing the last recipient of the message
//! - Fail when closing a connection
//!
//! Every connect, send and close is recorded for verification. Clones share
//! the same script and records.
#![allow(dead_code)] // Test utility module - not all methods used in every test

use std::{cell::RefCell, rc::Rc};

use bulkmail_delivery::{
    BuiltMessage, ConnectError, Connection, MailTransport, SendError, ServerSettings,
};

/// A message the mock accepted, at least for some recipients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub group_id: String,
    pub recipients: Vec<String>,
    pub subject: String,
}

/// How scripted send failures present themselves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SendFailure {
    /// The connection breaks.
    #[default]
    Transport,
    /// The last recipient is refused.
    Address,
    /// Something the transport cannot classify.
    Unexpected,
}

#[derive(Debug, Default)]
struct Script {
    connection_failures: u32,
    connection_failure_delay: u32,
    provider_unavailable: bool,
    send_failures: u32,
    send_failure_delay: u32,
    send_failure: SendFailure,
    /// Fail once after every this many successful sends, forever
    repeating_failure_period: Option<u32>,
    sends: u32,
    failing_close: bool,
}

#[derive(Debug, Default)]
struct Records {
    connects: u32,
    closes: u32,
    delivered: Vec<Delivered>,
}

#[derive(Debug, Default)]
struct State {
    script: Script,
    records: Records,
}

#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Rc<RefCell<State>>,
}

impl MockTransport {
    #[must_use]
    pub fn builder() -> MockTransportBuilder {
        MockTransportBuilder::default()
    }

    /// Number of connection attempts, successful or not
    #[must_use]
    pub fn connects(&self) -> u32 {
        self.state.borrow().records.connects
    }

    /// Number of connections closed
    #[must_use]
    pub fn closes(&self) -> u32 {
        self.state.borrow().records.closes
    }

    #[must_use]
    pub fn delivered(&self) -> Vec<Delivered> {
        self.state.borrow().records.delivered.clone()
    }
}

impl MailTransport for MockTransport {
    type Connection = MockConnection;

    fn connect(&self, _server: &ServerSettings) -> Result<MockConnection, ConnectError> {
        let mut state = self.state.borrow_mut();
        state.records.connects += 1;

        let script = &mut state.script;
        if script.connection_failure_delay > 0 {
            script.connection_failure_delay -= 1;
        } else if script.connection_failures > 0 {
            script.connection_failures -= 1;
            return Err(if script.provider_unavailable {
                ConnectError::ProviderUnavailable("missing provider".to_string())
            } else {
                ConnectError::Transient("cannot connect".to_string())
            });
        }

        Ok(MockConnection {
            state: Rc::clone(&self.state),
        })
    }
}

pub struct MockConnection {
    state: Rc<RefCell<State>>,
}

impl Connection for MockConnection {
    fn send(&mut self, message: &BuiltMessage) -> Result<(), SendError> {
        let mut state = self.state.borrow_mut();
        let recipients = message
            .recipients()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        assert!(!recipients.is_empty(), "messages always have recipients");

        let script = &mut state.script;
        script.sends += 1;
        let failure = if let Some(period) = script.repeating_failure_period {
            (script.sends % (period + 1) == 0).then_some(script.send_failure)
        } else if script.send_failure_delay > 0 {
            script.send_failure_delay -= 1;
            None
        } else if script.send_failures > 0 {
            script.send_failures -= 1;
            Some(script.send_failure)
        } else {
            None
        };

        match failure {
            None => {
                state.records.delivered.push(Delivered {
                    group_id: message.group_id().to_string(),
                    recipients,
                    subject: message.subject().to_string(),
                });
                Ok(())
            }
            Some(SendFailure::Transport) => Err(SendError::Transport("Read timed out".to_string())),
            Some(SendFailure::Unexpected) => {
                Err(SendError::Unexpected("unable to send message".to_string()))
            }
            Some(SendFailure::Address) => {
                let mut sent = recipients;
                let unsent = sent.split_off(sent.len() - 1);
                if !sent.is_empty() {
                    state.records.delivered.push(Delivered {
                        group_id: message.group_id().to_string(),
                        recipients: sent.clone(),
                        subject: message.subject().to_string(),
                    });
                }
                Err(SendError::Addresses { sent, unsent })
            }
        }
    }

    fn close(&mut self) -> Result<(), SendError> {
        let mut state = self.state.borrow_mut();
        state.records.closes += 1;
        if state.script.failing_close {
            Err(SendError::Transport("connection already closed".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Builder for [`MockTransport`]
#[derive(Debug, Default)]
pub struct MockTransportBuilder {
    script: Script,
}

impl MockTransportBuilder {
    /// Fail `failures` connection attempts once `delay` attempts succeeded
    #[must_use]
    pub const fn with_connection_failures(mut self, failures: u32, delay: u32) -> Self {
        self.script.connection_failures = failures;
        self.script.connection_failure_delay = delay;
        self
    }

    /// Report connection failures as an unavailable provider
    #[must_use]
    pub const fn with_provider_unavailable(mut self) -> Self {
        self.script.provider_unavailable = true;
        self
    }

    /// Fail `failures` sends once `delay` sends succeeded
    #[must_use]
    pub const fn with_send_failures(mut self, failures: u32, delay: u32) -> Self {
        self.script.send_failures = failures;
        self.script.send_failure_delay = delay;
        self
    }

    /// Fail one send after every `period` successful ones
    #[must_use]
    pub const fn with_repeating_send_failures(mut self, period: u32) -> Self {
        self.script.repeating_failure_period = Some(period);
        self
    }

    #[must_use]
    pub const fn with_send_failure(mut self, failure: SendFailure) -> Self {
        self.script.send_failure = failure;
        self
    }

    #[must_use]
    pub const fn with_failing_close(mut self) -> Self {
        self.script.failing_close = true;
        self
    }

    #[must_use]
    pub fn build(self) -> MockTransport {
        MockTransport {
            state: Rc::new(RefCell::new(State {
                script: self.script,
                records: Records::default(),
            })),
        }
    }
}
