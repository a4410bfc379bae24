pub mod config;
pub mod convert;
pub mod document;
pub mod engine;
pub mod error;
pub mod logger;
pub mod notify;
pub mod render;
pub mod security;
pub mod session;
pub mod test_utils;
pub mod viewer;

pub use config::ViewerConfig;
pub use document::DocumentHandle;
pub use error::ViewerError;
pub use render::{RenderedPage, Viewport};
pub use security::SecurityGateway;
pub use session::{SessionRegistry, TabId, TabSession};
pub use viewer::Viewer;
