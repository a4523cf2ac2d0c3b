//! # redecl Utilities
//!
//! Shared utilities, logging, and helpers for redecl.
//!
//! This crate holds the logging setup shared by the command-line tool and
//! anything else embedding `redecl-core`.

pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{init_logging, init_logging_with_level, LogFormat, LogLevel, LoggingError, LoggingGuard};
pub use tracing::{debug, error, info, trace, warn};
