use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use image::RgbImage;

use crate::debug_log;
use crate::engine::{DocumentBackend, OpenSource, RenderEngine, SecurityEngine};
use crate::error::ViewerError;

/// Fallback render scale when the first page width matches no known bucket.
pub const DEFAULT_BASE_ZOOM: f32 = 2.5;

static DECRYPT_TEMP_SEQ: AtomicUsize = AtomicUsize::new(0);

/// One opened PDF. Owned by exactly one tab; opening the same file twice
/// produces two independent handles.
pub struct DocumentHandle {
    path: PathBuf,
    base_zoom: f32,
    backend: Option<Box<dyn DocumentBackend>>,
}

impl std::fmt::Debug for DocumentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentHandle")
            .field("path", &self.path)
            .field("base_zoom", &self.base_zoom)
            .field("backend", &self.backend.as_ref().map(|_| "dyn DocumentBackend"))
            .finish()
    }
}

impl DocumentHandle {
    /// Opens `path`, trying the rendering engine directly first.
    ///
    /// Some encrypted files are rejected by the renderer even with the right
    /// password; those are decrypted to a temporary copy by the security
    /// engine and opened from bytes. The copy is best-effort deleted right
    /// after; a leftover file in the temp dir is harmless.
    pub fn open(
        render: &dyn RenderEngine,
        security: &dyn SecurityEngine,
        path: &Path,
        password: Option<&str>,
    ) -> Result<Self, ViewerError> {
        let backend = match render.open(OpenSource::from(path), password) {
            Ok(backend) => backend,
            Err(err @ (ViewerError::PasswordRequired | ViewerError::IncorrectPassword)) => {
                return Err(err);
            }
            Err(err) => match password {
                Some(password) => {
                    debug_log!(
                        "[doc] direct open failed for {}, retrying via decrypted copy: {err}",
                        path.display()
                    );
                    open_via_decrypted_copy(render, security, path, password)?
                }
                None => return Err(err),
            },
        };

        Ok(Self::from_backend(path.to_path_buf(), backend))
    }

    fn from_backend(path: PathBuf, backend: Box<dyn DocumentBackend>) -> Self {
        let base_zoom = base_zoom_for(backend.as_ref());
        Self {
            path,
            base_zoom,
            backend: Some(backend),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn base_zoom(&self) -> f32 {
        self.base_zoom
    }

    pub fn page_count(&self) -> usize {
        self.backend.as_ref().map_or(0, |backend| backend.page_count())
    }

    pub fn metadata(&self) -> BTreeMap<String, String> {
        self.backend
            .as_ref()
            .map(|backend| backend.metadata())
            .unwrap_or_default()
    }

    /// Rasterizes one page at `base_zoom * zoom_factor`.
    pub fn render_page(&self, index: usize, zoom_factor: f32) -> Result<RgbImage, ViewerError> {
        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| ViewerError::Open("document is closed".to_string()))?;

        let page_count = backend.page_count();
        if index >= page_count {
            return Err(ViewerError::PageOutOfRange {
                page: index,
                page_count,
            });
        }

        backend.render_page(index, self.base_zoom * zoom_factor)
    }

    pub fn is_closed(&self) -> bool {
        self.backend.is_none()
    }

    /// Releases the engine resource. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            backend.close();
            debug_log!("[doc] closed {}", self.path.display());
        }
    }
}

impl Drop for DocumentHandle {
    fn drop(&mut self) {
        self.close();
    }
}

fn base_zoom_for(backend: &dyn DocumentBackend) -> f32 {
    let Some(width_pt) = backend.page_width_pt(0) else {
        return DEFAULT_BASE_ZOOM;
    };

    // Bucket the first page width down to hundreds of points.
    match (width_pt as i32 / 100) * 100 {
        800 => 0.8,
        700 => 0.6,
        500 | 600 => 1.0,
        _ => DEFAULT_BASE_ZOOM,
    }
}

fn open_via_decrypted_copy(
    render: &dyn RenderEngine,
    security: &dyn SecurityEngine,
    path: &Path,
    password: &str,
) -> Result<Box<dyn DocumentBackend>, ViewerError> {
    let temp_path = decrypt_temp_path();
    security.decrypt_to(path, password, &temp_path)?;

    let bytes = fs::read(&temp_path);
    let _ = fs::remove_file(&temp_path);

    render.open(OpenSource::from(bytes?), None)
}

fn decrypt_temp_path() -> PathBuf {
    let seq = DECRYPT_TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "pdfdeck-decrypted-{}-{seq}.pdf",
        std::process::id()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeDocSpec, FakeEngine};

    fn open_with(engine: &FakeEngine, path: &Path, password: Option<&str>) -> Result<DocumentHandle, ViewerError> {
        DocumentHandle::open(engine, engine, path, password)
    }

    #[test]
    fn base_zoom_follows_width_buckets() {
        let engine = FakeEngine::new();
        for (width, expected) in [
            (840.0, 0.8),
            (792.0, 0.6),
            (612.0, 1.0),
            (595.0, 1.0),
            (1234.0, DEFAULT_BASE_ZOOM),
        ] {
            let path = PathBuf::from(format!("/docs/w{width}.pdf"));
            engine.insert(
                path.clone(),
                FakeDocSpec {
                    page_width_pt: width,
                    ..FakeDocSpec::plain(3)
                },
            );
            let doc = open_with(&engine, &path, None).unwrap();
            assert_eq!(doc.base_zoom(), expected, "width {width}");
        }
    }

    #[test]
    fn empty_document_uses_default_base_zoom() {
        let engine = FakeEngine::new();
        engine.insert(PathBuf::from("/docs/empty.pdf"), FakeDocSpec::plain(0));
        let doc = open_with(&engine, Path::new("/docs/empty.pdf"), None).unwrap();
        assert_eq!(doc.base_zoom(), DEFAULT_BASE_ZOOM);
        assert_eq!(doc.page_count(), 0);
    }

    #[test]
    fn encrypted_open_without_password_fails() {
        let engine = FakeEngine::new();
        engine.insert(
            PathBuf::from("/docs/locked.pdf"),
            FakeDocSpec::protected(5, "secret"),
        );
        let err = open_with(&engine, Path::new("/docs/locked.pdf"), None).unwrap_err();
        assert!(matches!(err, ViewerError::PasswordRequired));
    }

    #[test]
    fn wrong_password_is_reported_not_retried() {
        let engine = FakeEngine::new();
        engine.insert(
            PathBuf::from("/docs/locked.pdf"),
            FakeDocSpec::protected(5, "secret"),
        );
        let err = open_with(&engine, Path::new("/docs/locked.pdf"), Some("nope")).unwrap_err();
        assert!(matches!(err, ViewerError::IncorrectPassword));
    }

    #[test]
    fn falls_back_to_decrypted_copy_when_renderer_rejects() {
        let engine = FakeEngine::new();
        engine.insert(
            PathBuf::from("/docs/awkward.pdf"),
            FakeDocSpec {
                direct_open_supported: false,
                ..FakeDocSpec::protected(7, "secret")
            },
        );

        let doc = open_with(&engine, Path::new("/docs/awkward.pdf"), Some("secret")).unwrap();
        assert_eq!(doc.page_count(), 7);
    }

    #[test]
    fn no_fallback_without_a_password() {
        let engine = FakeEngine::new();
        engine.insert(
            PathBuf::from("/docs/broken.pdf"),
            FakeDocSpec {
                direct_open_supported: false,
                ..FakeDocSpec::plain(7)
            },
        );

        let err = open_with(&engine, Path::new("/docs/broken.pdf"), None).unwrap_err();
        assert!(matches!(err, ViewerError::Open(_)));
    }

    #[test]
    fn render_page_checks_bounds() {
        let engine = FakeEngine::new();
        engine.insert(PathBuf::from("/docs/a.pdf"), FakeDocSpec::plain(3));
        let doc = open_with(&engine, Path::new("/docs/a.pdf"), None).unwrap();

        assert!(doc.render_page(2, 1.0).is_ok());
        let err = doc.render_page(3, 1.0).unwrap_err();
        assert!(matches!(
            err,
            ViewerError::PageOutOfRange { page: 3, page_count: 3 }
        ));
    }

    #[test]
    fn close_is_idempotent_and_releases_once() {
        let engine = FakeEngine::new();
        let path = PathBuf::from("/docs/a.pdf");
        engine.insert(path.clone(), FakeDocSpec::plain(3));

        let mut doc = open_with(&engine, &path, None).unwrap();
        assert!(!doc.is_closed());
        doc.close();
        assert!(doc.is_closed());
        doc.close();
        drop(doc);

        assert_eq!(engine.close_count(&path), 1);
    }
}
