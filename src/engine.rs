pub mod pdfium;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::error::ViewerError;

/// Encryption algorithm revision requested from the security engine.
pub const ENCRYPTION_REVISION: u8 = 6;

/// Where a document is loaded from.
#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// Allow-set handed to the security engine when locking a document.
///
/// The viewer only ever requests allow-all; the individual flags are kept so
/// a dialog can populate them, but backends are free to ignore them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions {
    pub print: bool,
    pub copy: bool,
    pub modify: bool,
    pub annotate: bool,
}

impl Permissions {
    pub fn allow_all() -> Self {
        Self {
            print: true,
            copy: true,
            modify: true,
            annotate: true,
        }
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::allow_all()
    }
}

/// Parameters for [`SecurityEngine::encrypt_to`].
#[derive(Debug, Clone)]
pub struct EncryptionSpec {
    pub owner_password: String,
    pub user_password: String,
    pub revision: u8,
    pub permissions: Permissions,
}

impl EncryptionSpec {
    pub fn revision_6(
        owner_password: impl Into<String>,
        user_password: impl Into<String>,
        permissions: Permissions,
    ) -> Self {
        Self {
            owner_password: owner_password.into(),
            user_password: user_password.into(),
            revision: ENCRYPTION_REVISION,
            permissions,
        }
    }
}

/// One opened, renderable document inside a rendering engine.
pub trait DocumentBackend {
    fn page_count(&self) -> usize;

    /// Width of a page in PDF points, if the page exists.
    fn page_width_pt(&self, index: usize) -> Option<f32>;

    /// Best-effort document information; missing tags are simply absent.
    fn metadata(&self) -> BTreeMap<String, String>;

    /// Rasterize one page at the given scale. The returned image has no
    /// alpha channel; backends strip it before handing pixels out.
    fn render_page(&self, index: usize, scale: f32) -> Result<RgbImage, ViewerError>;

    /// Release the underlying engine resource. Called at most once by
    /// [`crate::document::DocumentHandle`].
    fn close(&mut self);
}

/// The rendering engine collaborator (pdfium in production).
pub trait RenderEngine {
    /// Opens a document, failing with [`ViewerError::PasswordRequired`] when
    /// the file is encrypted and no password was given, and with
    /// [`ViewerError::IncorrectPassword`] when the given one is wrong.
    fn open(
        &self,
        source: OpenSource,
        password: Option<&str>,
    ) -> Result<Box<dyn DocumentBackend>, ViewerError>;
}

/// The structure-aware encryption engine collaborator.
///
/// Both operations write a new file and never mutate the source in place.
pub trait SecurityEngine: Send + Sync {
    /// Open `src` with `password` and re-save it without encryption at `dst`.
    fn decrypt_to(&self, src: &Path, password: &str, dst: &Path) -> Result<(), ViewerError>;

    /// Save an encrypted copy of `src` at `dst`.
    fn encrypt_to(&self, src: &Path, dst: &Path, spec: &EncryptionSpec) -> Result<(), ViewerError>;
}
