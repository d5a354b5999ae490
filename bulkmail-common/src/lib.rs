//! Shared building blocks for bulkmail: configuration, logging, the
//! unit-of-work model produced by the document pipeline, and template
//! rendering.

pub mod config;
pub mod logging;
pub mod template;
pub mod unit;

pub use tracing;
