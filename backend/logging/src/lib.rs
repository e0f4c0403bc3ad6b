//! Structured logging for Lecture Buddy.
//!
//! Console and rolling NDJSON file output, typed workflow events, and
//! redaction of tokens and inline image payloads before anything is written.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{EventLogEntry, EventLogger, WorkflowEvent};
pub use logger::{LOG_FILE_NAME, init_logger};
pub use redact::redact_sensitive_data;
