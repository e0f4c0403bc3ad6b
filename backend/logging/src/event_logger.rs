//! Workflow Event Logger
//!
//! Typed wizard events (navigation, step locks, notices, tool runs) emitted on
//! the `workflow_events` target.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::redact::redact_sensitive_data;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    Navigated {
        from: String,
        to: String,
    },
    NavigationDenied {
        target: String,
        reason: String,
    },
    StepLocked {
        step: String,
    },
    StepUnlocked {
        step: String,
    },
    Reset,
    Notice {
        level: String,
        message: String,
    },
    ToolRun {
        tool: String,
        outcome: String,
        detail: Option<String>,
    },
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: WorkflowEvent,
}

pub struct EventLogger;

impl EventLogger {
    /// Redacts free-text fields, then emits the event.
    pub fn log_event(session_id: &str, event: WorkflowEvent) -> EventLogEntry {
        let event = match event {
            WorkflowEvent::Notice { level, message } => WorkflowEvent::Notice {
                level,
                message: redact_sensitive_data(&message),
            },
            WorkflowEvent::ToolRun {
                tool,
                outcome,
                detail,
            } => WorkflowEvent::ToolRun {
                tool,
                outcome,
                detail: detail.map(|d| redact_sensitive_data(&d)),
            },
            other => other,
        };

        let entry = EventLogEntry {
            session_id: session_id.into(),
            timestamp: Utc::now(),
            event,
        };

        match serde_json::to_string(&entry.event) {
            Ok(json) => info!(target: "workflow_events", session = %entry.session_id, event = %json, "workflow event"),
            Err(_) => info!(target: "workflow_events", session = %entry.session_id, event = ?entry.event, "workflow event"),
        }
        entry
    }
}
