//! One character per processed message, for whoever is watching the run.

use std::io::Write;

use bulkmail_common::tracing::debug;

/// Marks are wrapped onto a new line after this many.
pub const LINE_WIDTH: usize = 100;

/// Outcome code printed for a processed message or retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    /// Delivered to every recipient
    Sent,
    /// Some recipients refused
    PartialAddressFailure,
    /// Every recipient refused
    TotalAddressFailure,
    /// Connection attempt failed
    ConnectRetry,
    /// Batch aborted, resending
    SendRetry,
}

impl Mark {
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::Sent => '.',
            Self::PartialAddressFailure => 'a',
            Self::TotalAddressFailure => 'A',
            Self::ConnectRetry => 'R',
            Self::SendRetry => 'r',
        }
    }
}

/// Writes progress marks to an injected sink.
pub struct ProgressReporter<W> {
    sink: W,
}

impl<W: Write> ProgressReporter<W> {
    pub const fn new(sink: W) -> Self {
        Self { sink }
    }

    /// Print `mark`, breaking the line when `count` is a positive multiple
    /// of [`LINE_WIDTH`].
    pub fn report(&mut self, count: usize, mark: Mark) {
        let mut buffer = [0; 4];
        let mut text = String::from(mark.as_char().encode_utf8(&mut buffer));
        if count > 0 && count % LINE_WIDTH == 0 {
            text.push('\n');
        }

        self.write(&text);
    }

    /// Print a whole line of text.
    pub fn line(&mut self, text: &str) {
        self.write(&format!("{text}\n"));
    }

    fn write(&mut self, text: &str) {
        if let Err(e) = self
            .sink
            .write_all(text.as_bytes())
            .and_then(|()| self.sink.flush())
        {
            debug!("Unable to write progress: {e}");
        }
    }

    pub const fn sink(&self) -> &W {
        &self.sink
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}
