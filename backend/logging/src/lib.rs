//! Structured logging setup for devauth.

pub mod logger;

pub use logger::{init_logger, LoggingOptions};
