//! User-facing notices.

use std::fmt;

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "success",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Receives notices from the flows.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);

    fn info(&self, message: &str) {
        self.notify(Notice::new(NoticeLevel::Info, message));
    }

    fn success(&self, message: &str) {
        self.notify(Notice::new(NoticeLevel::Success, message));
    }

    fn warning(&self, message: &str) {
        self.notify(Notice::new(NoticeLevel::Warning, message));
    }

    fn error(&self, message: &str) {
        self.notify(Notice::new(NoticeLevel::Error, message));
    }
}

/// Forwards notices to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Error => tracing::error!(text = %notice.message, "notice"),
            NoticeLevel::Warning => tracing::warn!(text = %notice.message, "notice"),
            NoticeLevel::Info | NoticeLevel::Success => {
                tracing::info!(kind = %notice.level, text = %notice.message, "notice")
            }
        }
    }
}

/// Keeps every notice in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn messages(&self, level: NoticeLevel) -> Vec<String> {
        self.notices
            .lock()
            .iter()
            .filter(|n| n.level == level)
            .map(|n| n.message.clone())
            .collect()
    }

    pub fn last(&self) -> Option<Notice> {
        self.notices.lock().last().cloned()
    }

    pub fn clear(&self) {
        self.notices.lock().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_notifier_filters_by_level() {
        let rec = RecordingNotifier::new();
        rec.success("bought");
        rec.warning("slow");
        rec.error("nope");
        assert_eq!(rec.notices().len(), 3);
        assert_eq!(rec.messages(NoticeLevel::Warning), vec!["slow".to_string()]);
        assert_eq!(rec.last().unwrap().level, NoticeLevel::Error);
        LogNotifier.info("forwarded");
    }
}
