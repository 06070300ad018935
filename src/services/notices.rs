//! User-facing notices (toasts and inline status lines).
//!
//! Controllers emit a [`Notice`] whenever an operation finishes in a way the
//! user should hear about. A frontend subscribes through [`NoticeSink::channel`].

use serde::Serialize;
use tokio::sync::mpsc;

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// Payload for notice events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

/// Where notices go. Cloning shares the same receiver.
#[derive(Debug, Clone, Default)]
pub struct NoticeSink {
    tx: Option<mpsc::UnboundedSender<Notice>>,
}

impl NoticeSink {
    /// A sink that drops everything.
    pub fn discard() -> Self {
        Self { tx: None }
    }

    /// A sink paired with the receiver a frontend listens on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn emit(&self, notice: Notice) {
        if let Some(tx) = &self.tx {
            // Receiver gone means nobody is listening anymore
            let _ = tx.send(notice);
        }
    }
}
