use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A transient, user-visible notification (toast).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Notice {
    pub fn new(level: NoticeLevel, title: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            detail: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach a detail line. An empty detail is dropped.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        self.detail = (!detail.is_empty()).then_some(detail);
        self
    }
}

/// Fan-out for notices. Every notice is also traced; a notifier without a
/// receiver only traces.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    tx: Option<mpsc::UnboundedSender<Notice>>,
}

impl Notifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A notifier that only logs.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Error | NoticeLevel::Warning => {
                warn!(target: "notices", title = %notice.title, detail = ?notice.detail, "notice")
            }
            _ => info!(target: "notices", title = %notice.title, "notice"),
        }
        if let Some(tx) = &self.tx {
            // Receiver gone means the UI shut down; nothing left to show.
            let _ = tx.send(notice);
        }
    }

    pub fn success(&self, title: impl Into<String>) {
        self.notify(Notice::new(NoticeLevel::Success, title));
    }

    pub fn info(&self, title: impl Into<String>) {
        self.notify(Notice::new(NoticeLevel::Info, title));
    }

    pub fn warning(&self, title: impl Into<String>) {
        self.notify(Notice::new(NoticeLevel::Warning, title));
    }

    pub fn error(&self, title: impl Into<String>, detail: impl Into<String>) {
        self.notify(Notice::new(NoticeLevel::Error, title).with_detail(detail));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notices_reach_receiver() {
        let (notifier, mut rx) = Notifier::channel();
        notifier.success("Image uploaded successfully");
        notifier.error("OCR processing failed", "engine missing");

        let first = rx.recv().await.unwrap();
        assert_eq!(first.level, NoticeLevel::Success);
        assert_eq!(first.title, "Image uploaded successfully");

        let second = rx.recv().await.unwrap();
        assert_eq!(second.level, NoticeLevel::Error);
        assert_eq!(second.detail.as_deref(), Some("engine missing"));
    }

    #[test]
    fn silent_notifier_does_not_panic() {
        Notifier::silent().warning("nobody listening");
    }
}
