//! In-memory collaborator fakes for exercising the session core without
//! pdfium, real files, or a UI.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::convert::{ConversionKind, DocumentConverter};
use crate::engine::{
    DocumentBackend, EncryptionSpec, OpenSource, RenderEngine, SecurityEngine,
};
use crate::error::ViewerError;
use crate::notify::{NotificationLevel, Notifier, PasswordPrompt};

/// Shape of one fake document. Serialized to JSON when a fake "file" has to
/// exist on disk (the decrypted-copy fallback reads real bytes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FakeDocSpec {
    pub page_count: usize,
    pub page_width_pt: f32,
    pub page_height_pt: f32,
    pub user_password: Option<String>,
    pub owner_password: Option<String>,
    /// When false, opening by path fails even with the right password and
    /// the handle must go through the decrypted-copy fallback.
    pub direct_open_supported: bool,
    pub metadata: BTreeMap<String, String>,
}

impl Default for FakeDocSpec {
    fn default() -> Self {
        Self {
            page_count: 10,
            page_width_pt: 600.0,
            page_height_pt: 800.0,
            user_password: None,
            owner_password: None,
            direct_open_supported: true,
            metadata: BTreeMap::new(),
        }
    }
}

impl FakeDocSpec {
    pub fn plain(page_count: usize) -> Self {
        Self {
            page_count,
            ..Self::default()
        }
    }

    pub fn protected(page_count: usize, password: &str) -> Self {
        Self {
            page_count,
            user_password: Some(password.to_string()),
            owner_password: Some(password.to_string()),
            ..Self::default()
        }
    }
}

/// Fake rendering + encryption engine over an in-memory path registry.
#[derive(Default)]
pub struct FakeEngine {
    docs: Mutex<HashMap<PathBuf, FakeDocSpec>>,
    close_counts: Mutex<HashMap<PathBuf, std::sync::Arc<AtomicUsize>>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: PathBuf, spec: FakeDocSpec) {
        self.docs.lock().unwrap().insert(path, spec);
    }

    pub fn spec(&self, path: &Path) -> Option<FakeDocSpec> {
        self.docs.lock().unwrap().get(path).cloned()
    }

    /// How many times a backend opened from `path` has been closed.
    pub fn close_count(&self, path: &Path) -> usize {
        self.close_counts
            .lock()
            .unwrap()
            .get(path)
            .map_or(0, |counter| counter.load(Ordering::Relaxed))
    }

    fn counter_for(&self, path: &Path) -> std::sync::Arc<AtomicUsize> {
        self.close_counts
            .lock()
            .unwrap()
            .entry(path.to_path_buf())
            .or_default()
            .clone()
    }

    fn check_password(spec: &FakeDocSpec, password: Option<&str>) -> Result<(), ViewerError> {
        match (&spec.user_password, password) {
            (None, _) => Ok(()),
            (Some(_), None) => Err(ViewerError::PasswordRequired),
            (Some(expected), Some(given)) => {
                if expected == given || spec.owner_password.as_deref() == Some(given) {
                    Ok(())
                } else {
                    Err(ViewerError::IncorrectPassword)
                }
            }
        }
    }
}

impl RenderEngine for FakeEngine {
    fn open(
        &self,
        source: OpenSource,
        password: Option<&str>,
    ) -> Result<Box<dyn DocumentBackend>, ViewerError> {
        let (spec, origin) = match source {
            OpenSource::Path(path) => {
                let spec = self.spec(&path).ok_or_else(|| {
                    ViewerError::Open(format!("no such document: {}", path.display()))
                })?;
                (spec, Some(path))
            }
            OpenSource::Bytes(bytes) => {
                let spec: FakeDocSpec = serde_json::from_slice(&bytes)
                    .map_err(|err| ViewerError::Open(err.to_string()))?;
                (spec, None)
            }
        };

        Self::check_password(&spec, password)?;
        if !spec.direct_open_supported && origin.is_some() {
            return Err(ViewerError::Open("unsupported encryption scheme".to_string()));
        }

        let closes = origin
            .map(|path| self.counter_for(&path))
            .unwrap_or_default();
        Ok(Box::new(FakeBackend { spec, closes }))
    }
}

impl SecurityEngine for FakeEngine {
    fn decrypt_to(&self, src: &Path, password: &str, dst: &Path) -> Result<(), ViewerError> {
        let spec = self
            .spec(src)
            .ok_or_else(|| ViewerError::Unlock(format!("no such document: {}", src.display())))?;
        Self::check_password(&spec, Some(password))?;

        let mut unlocked = spec;
        unlocked.user_password = None;
        unlocked.owner_password = None;
        unlocked.direct_open_supported = true;

        let bytes = serde_json::to_vec(&unlocked)
            .map_err(|err| ViewerError::Unlock(err.to_string()))?;
        fs::write(dst, bytes)?;
        self.insert(dst.to_path_buf(), unlocked);
        Ok(())
    }

    fn encrypt_to(&self, src: &Path, dst: &Path, spec: &EncryptionSpec) -> Result<(), ViewerError> {
        let source = self
            .spec(src)
            .ok_or_else(|| ViewerError::Lock(format!("no such document: {}", src.display())))?;
        if source.user_password.is_some() {
            return Err(ViewerError::Lock("source is already encrypted".to_string()));
        }

        let mut locked = source;
        locked.user_password = Some(spec.user_password.clone());
        locked.owner_password = Some(spec.owner_password.clone());
        self.insert(dst.to_path_buf(), locked);
        Ok(())
    }
}

struct FakeBackend {
    spec: FakeDocSpec,
    closes: std::sync::Arc<AtomicUsize>,
}

impl DocumentBackend for FakeBackend {
    fn page_count(&self) -> usize {
        self.spec.page_count
    }

    fn page_width_pt(&self, index: usize) -> Option<f32> {
        (index < self.spec.page_count).then_some(self.spec.page_width_pt)
    }

    fn metadata(&self) -> BTreeMap<String, String> {
        self.spec.metadata.clone()
    }

    fn render_page(&self, index: usize, scale: f32) -> Result<RgbImage, ViewerError> {
        if index >= self.spec.page_count {
            return Err(ViewerError::PageOutOfRange {
                page: index,
                page_count: self.spec.page_count,
            });
        }
        let width = (self.spec.page_width_pt * scale).round().max(1.0) as u32;
        let height = (self.spec.page_height_pt * scale).round().max(1.0) as u32;
        Ok(RgbImage::new(width, height))
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::Relaxed);
    }
}

/// Notifier that records every event for later assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(NotificationLevel, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(NotificationLevel, String)> {
        self.events.lock().unwrap().clone()
    }

    pub fn infos(&self) -> Vec<String> {
        self.messages_at(NotificationLevel::Info)
    }

    pub fn errors(&self) -> Vec<String> {
        self.messages_at(NotificationLevel::Error)
    }

    fn messages_at(&self, level: NotificationLevel) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(event_level, _)| *event_level == level)
            .map(|(_, message)| message.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: NotificationLevel, message: &str) {
        self.events.lock().unwrap().push((level, message.to_string()));
    }
}

/// Password prompt that answers from a fixed script. An exhausted script
/// cancels.
pub struct ScriptedPrompt {
    responses: Mutex<VecDeque<Option<String>>>,
    requests: AtomicUsize,
}

impl ScriptedPrompt {
    pub fn new(responses: Vec<Option<&str>>) -> Self {
        Self {
            responses: Mutex::new(
                responses
                    .into_iter()
                    .map(|response| response.map(str::to_string))
                    .collect(),
            ),
            requests: AtomicUsize::new(0),
        }
    }

    /// Always answers with the same password.
    pub fn with_password(password: &str) -> Self {
        Self::new(vec![Some(password)])
    }

    /// Always cancels.
    pub fn cancelling() -> Self {
        Self::new(Vec::new())
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }
}

impl PasswordPrompt for ScriptedPrompt {
    fn request_password(&self, _title: &str) -> Option<String> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.responses.lock().unwrap().pop_front().flatten()
    }
}

/// Converter that records calls and optionally fails.
pub struct FakeConverter {
    fail: bool,
    calls: Mutex<Vec<(ConversionKind, PathBuf, PathBuf)>>,
}

impl FakeConverter {
    pub fn succeeding() -> Self {
        Self {
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(ConversionKind, PathBuf, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, kind: ConversionKind, src: &Path, dst: &Path) -> Result<(), ViewerError> {
        self.calls
            .lock()
            .unwrap()
            .push((kind, src.to_path_buf(), dst.to_path_buf()));
        if self.fail {
            Err(ViewerError::Conversion("converter exploded".to_string()))
        } else {
            Ok(())
        }
    }
}

impl DocumentConverter for FakeConverter {
    fn pdf_to_word(&self, src: &Path, dst: &Path) -> Result<(), ViewerError> {
        self.record(ConversionKind::PdfToWord, src, dst)
    }

    fn word_to_pdf(&self, src: &Path, dst: &Path) -> Result<(), ViewerError> {
        self.record(ConversionKind::WordToPdf, src, dst)
    }
}
