//! Bulk email delivery for bulkmail
//!
//! This crate turns units of work into messages and delivers them over a
//! connection-limited mail server:
//! - Build one message per unit, skipping units that cannot be sent
//! - Connect with a bounded, fixed-delay retry
//! - Send in order, resuming at the first unconfirmed message after a broken
//!   connection
//! - Report one progress character per processed message

mod bulk;
pub mod connector;
mod error;
pub mod message;
pub mod orchestrator;
pub mod progress;
pub mod render;
pub mod sender;
pub mod transport;

pub use bulk::{BulkEmail, DeliverySummary};
pub use error::DeliveryError;
pub use message::{BuiltMessage, MessageBuilder};
pub use orchestrator::{DeliveryState, Phase};
pub use progress::{Mark, ProgressReporter};
pub use sender::{BatchOutcome, SendOutcome};
pub use transport::{
    ConnectError, Connection, MailTransport, SendError, ServerSettings, SmtpMailer,
};
