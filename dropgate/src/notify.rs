//! User-facing notification seam.
//!
//! The original flow raised toasts through hooks attached to a global
//! object. Here every component that needs to surface a message holds a
//! [`Notifier`] reference injected at construction; hosts decide how the
//! message reaches the user.

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Neutral progress information.
    Info,
    /// A completed operation.
    Success,
    /// A recoverable problem the user should know about.
    Warning,
    /// A failed operation.
    Error,
}

/// Sink for transient user-facing notifications.
pub trait Notifier: Send + Sync {
    /// Delivers one notification.
    fn notify(&self, level: NoticeLevel, message: &str);

    /// Delivers an informational notification.
    fn info(&self, message: &str) {
        self.notify(NoticeLevel::Info, message);
    }

    /// Delivers a success notification.
    fn success(&self, message: &str) {
        self.notify(NoticeLevel::Success, message);
    }

    /// Delivers a warning notification.
    fn warning(&self, message: &str) {
        self.notify(NoticeLevel::Warning, message);
    }

    /// Delivers an error notification.
    fn error(&self, message: &str) {
        self.notify(NoticeLevel::Error, message);
    }
}

/// Notifier that forwards messages to `tracing`.
///
/// Suitable default for headless hosts and tests that don't assert on
/// notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info | NoticeLevel::Success => tracing::info!(target: "dropgate::notify", "{message}"),
            NoticeLevel::Warning => tracing::warn!(target: "dropgate::notify", "{message}"),
            NoticeLevel::Error => tracing::error!(target: "dropgate::notify", "{message}"),
        }
    }
}
