use thiserror::Error;

/// Everything that can go wrong between a user action and the engines.
///
/// Inner layers propagate these with `?`; the [`crate::viewer::Viewer`]
/// operation boundary converts them into user-facing notifications, so no
/// variant ever escapes far enough to crash the application.
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("password required")]
    PasswordRequired,
    #[error("incorrect password")]
    IncorrectPassword,
    #[error("could not open document: {0}")]
    Open(String),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: usize, page_count: usize },
    #[error("failed to lock document: {0}")]
    Lock(String),
    #[error("failed to unlock document: {0}")]
    Unlock(String),
    #[error("conversion failed: {0}")]
    Conversion(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
