//! Mock SMTP server for testing the SMTP transport
//!
//! A blocking, thread-per-connection server that can:
//! - Refuse selected recipients
//! - Refuse the first messages it receives after DATA
//! - Drop the connection after a number of commands
//! - Track received commands for verification
#![allow(dead_code)] // Test utility module - not all methods used in every test

use std::{
    collections::BTreeSet,
    io::{BufRead, BufReader, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

/// SMTP command received by the mock server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpCommand {
    Ehlo(String),
    MailFrom(String),
    RcptTo(String),
    Data,
    /// Message content (after DATA)
    MessageContent(String),
    Rset,
    Quit,
    Other(String),
}

#[derive(Debug, Clone, Default)]
struct MockServerConfig {
    rejected_recipients: BTreeSet<String>,
    drop_after_commands: Option<usize>,
    rejected_messages: usize,
}

/// Mock SMTP server for testing
pub struct MockSmtpServer {
    addr: SocketAddr,
    commands_received: Arc<Mutex<Vec<SmtpCommand>>>,
}

impl MockSmtpServer {
    #[must_use]
    pub fn builder() -> MockSmtpServerBuilder {
        MockSmtpServerBuilder::default()
    }

    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get all commands received by the server
    #[must_use]
    pub fn commands(&self) -> Vec<SmtpCommand> {
        self.commands_received
            .lock()
            .map(|commands| commands.clone())
            .unwrap_or_default()
    }

    fn handle_client(
        stream: TcpStream,
        config: &MockServerConfig,
        commands: &Mutex<Vec<SmtpCommand>>,
        messages_received: &mut usize,
    ) -> std::io::Result<()> {
        stream.set_read_timeout(Some(Duration::from_secs(10)))?;
        let mut writer = stream.try_clone()?;
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        let mut command_count = 0;

        let record = |command: SmtpCommand| {
            if let Ok(mut commands) = commands.lock() {
                commands.push(command);
            }
        };

        writer.write_all(b"220 Mock SMTP Server\r\n")?;
        writer.flush()?;

        loop {
            if config
                .drop_after_commands
                .is_some_and(|limit| command_count >= limit)
            {
                return Ok(());
            }

            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Ok(());
            }
            command_count += 1;

            let command_line = line.trim();
            let (verb, argument) = command_line
                .split_once(' ')
                .unwrap_or((command_line, ""));

            let response: &[u8] = match verb.to_uppercase().as_str() {
                "EHLO" => {
                    record(SmtpCommand::Ehlo(argument.to_string()));
                    b"250-localhost\r\n250 SIZE 10000\r\n"
                }
                "MAIL" => {
                    record(SmtpCommand::MailFrom(argument.to_string()));
                    b"250 OK\r\n"
                }
                "RCPT" => {
                    let address = argument
                        .trim_start_matches("TO:")
                        .trim_start_matches('<')
                        .trim_end_matches('>')
                        .to_string();
                    let rejected = config.rejected_recipients.contains(&address);
                    record(SmtpCommand::RcptTo(address));
                    if rejected {
                        b"550 No such user here\r\n"
                    } else {
                        b"250 OK\r\n"
                    }
                }
                "DATA" => {
                    record(SmtpCommand::Data);
                    writer.write_all(b"354 Start mail input; end with <CRLF>.<CRLF>\r\n")?;
                    writer.flush()?;

                    let mut content = String::new();
                    let mut data_line = String::new();
                    loop {
                        data_line.clear();
                        if reader.read_line(&mut data_line)? == 0 || data_line.trim_end() == "." {
                            break;
                        }
                        content.push_str(&data_line);
                    }
                    record(SmtpCommand::MessageContent(content));
                    *messages_received += 1;
                    if *messages_received <= config.rejected_messages {
                        b"552 Message size exceeds limit\r\n"
                    } else {
                        b"250 OK: Message accepted\r\n"
                    }
                }
                "RSET" => {
                    record(SmtpCommand::Rset);
                    b"250 OK\r\n"
                }
                "QUIT" => {
                    record(SmtpCommand::Quit);
                    writer.write_all(b"221 Bye\r\n")?;
                    writer.flush()?;
                    return Ok(());
                }
                _ => {
                    record(SmtpCommand::Other(command_line.to_string()));
                    b"500 Unknown command\r\n"
                }
            };

            writer.write_all(response)?;
            writer.flush()?;
        }
    }
}

/// Builder for configuring a `MockSmtpServer`
#[derive(Debug, Default)]
pub struct MockSmtpServerBuilder {
    config: MockServerConfig,
}

impl MockSmtpServerBuilder {
    /// Answer RCPT TO for `address` with 550
    #[must_use]
    pub fn with_rejected_recipient(mut self, address: impl Into<String>) -> Self {
        self.config.rejected_recipients.insert(address.into());
        self
    }

    /// Answer the content of the first `count` messages with 552
    #[must_use]
    pub fn with_rejected_messages(mut self, count: usize) -> Self {
        self.config.rejected_messages = count;
        self
    }

    /// Close the connection without a reply once `count` commands were read
    #[must_use]
    pub fn with_drop_after_commands(mut self, count: usize) -> Self {
        self.config.drop_after_commands = Some(count);
        self
    }

    /// Bind to an ephemeral local port and serve connections on a background
    /// thread.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    #[must_use]
    pub fn build(self) -> MockSmtpServer {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");
        let commands_received = Arc::new(Mutex::new(Vec::new()));

        let config = self.config;
        let commands = Arc::clone(&commands_received);
        thread::spawn(move || {
            let mut messages_received = 0;
            for stream in listener.incoming().flatten() {
                let _ = MockSmtpServer::handle_client(
                    stream,
                    &config,
                    &commands,
                    &mut messages_received,
                );
            }
        });

        MockSmtpServer {
            addr,
            commands_received,
        }
    }
}
