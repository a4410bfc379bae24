use std::sync::Arc;

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// The notification dialog seam. Background workers report through this,
/// so implementations must be shareable across threads.
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NotificationLevel, message: &str);

    fn info(&self, message: &str) {
        self.notify(NotificationLevel::Info, message);
    }

    fn warning(&self, message: &str) {
        self.notify(NotificationLevel::Warning, message);
    }

    fn error(&self, message: &str) {
        self.notify(NotificationLevel::Error, message);
    }
}

/// Headless notifier that routes everything to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, level: NotificationLevel, message: &str) {
        match level {
            NotificationLevel::Info => tklog::info!(message),
            NotificationLevel::Warning => tklog::warn!(message),
            NotificationLevel::Error => tklog::error!(message),
        }
    }
}

/// The password dialog seam. Returning `None` means the user cancelled.
pub trait PasswordPrompt {
    fn request_password(&self, title: &str) -> Option<String>;
}

impl<P: PasswordPrompt + ?Sized> PasswordPrompt for Arc<P> {
    fn request_password(&self, title: &str) -> Option<String> {
        (**self).request_password(title)
    }
}

/// Prompt for contexts with nobody to ask; every request is a cancel.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

impl PasswordPrompt for NoPrompt {
    fn request_password(&self, _title: &str) -> Option<String> {
        None
    }
}
