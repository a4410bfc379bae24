use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::config::ViewerConfig;
use crate::convert::{ConversionKind, DocumentConverter, spawn_conversion};
use crate::debug_log;
use crate::engine::Permissions;
use crate::notify::{Notifier, PasswordPrompt};
use crate::render::{self, RenderedPage, Viewport};
use crate::security::SecurityGateway;
use crate::session::{SessionRegistry, TabId};

/// The multi-document viewer session: owns the registry and the engine
/// collaborators, and is the boundary where every error turns into a
/// user-facing notification instead of propagating.
///
/// All state transitions happen on the thread that owns this value;
/// conversions are the only work pushed onto background threads, and those
/// never touch the registry.
pub struct Viewer {
    config: ViewerConfig,
    viewport: Viewport,
    registry: SessionRegistry,
    gateway: SecurityGateway,
    converter: Arc<dyn DocumentConverter>,
    prompt: Box<dyn PasswordPrompt>,
    notifier: Arc<dyn Notifier>,
}

impl Viewer {
    pub fn new(
        config: ViewerConfig,
        gateway: SecurityGateway,
        converter: Arc<dyn DocumentConverter>,
        prompt: Box<dyn PasswordPrompt>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let viewport = config.initial_viewport();
        Self {
            config,
            viewport,
            registry: SessionRegistry::new(),
            gateway,
            converter,
            prompt,
            notifier,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// The active-tab focus signal and other direct session access for the
    /// UI layer.
    pub fn registry_mut(&mut self) -> &mut SessionRegistry {
        &mut self.registry
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Resize signal from the UI collaborator.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = Viewport::new(width, height);
    }

    /// Opens a file into a new tab, prompting for a password when needed
    /// (one retry). Returns `None` when the user cancelled or the open
    /// failed; failures are reported through the notifier.
    pub fn open_file(&mut self, path: &Path) -> Option<TabId> {
        match self.gateway.open_with_prompt(path, self.prompt.as_ref()) {
            Ok(Some(document)) => {
                debug_log!(
                    "[viewer] opened {} ({} pages)",
                    path.display(),
                    document.page_count()
                );
                let tab_id = self.registry.create_tab(document);
                self.render_tab(tab_id);
                Some(tab_id)
            }
            Ok(None) => None,
            Err(err) => {
                self.notifier
                    .error(&format!("Could not open {}: {err}", path.display()));
                None
            }
        }
    }

    /// Re-renders the focused tab, e.g. after a viewport change.
    pub fn render_active(&mut self) -> Option<RenderedPage> {
        let tab_id = self.registry.active_tab()?;
        self.render_tab(tab_id)
    }

    fn render_tab(&mut self, tab_id: TabId) -> Option<RenderedPage> {
        let viewport = self.viewport;
        let session = self.registry.get_mut(tab_id)?;
        match render::render_current_page(session, viewport) {
            Ok(page) => Some(page),
            Err(err) => {
                self.notifier.error(&format!("Failed to render page: {err}"));
                None
            }
        }
    }

    /// Moves the focused tab by `delta` pages. Out-of-range targets are
    /// rejected outright (no clamping to the nearest bound, no rerender).
    pub fn shift_page(&mut self, delta: isize) -> Option<RenderedPage> {
        let session = self.registry.active_session_mut()?;
        let tab_id = session.id;

        let page_count = session.document.page_count() as isize;
        let target = session.current_page as isize + delta;
        if target < 0 || target >= page_count {
            return None;
        }

        session.current_page = target as usize;
        self.render_tab(tab_id)
    }

    pub fn next_page(&mut self) -> Option<RenderedPage> {
        self.shift_page(1)
    }

    pub fn prev_page(&mut self) -> Option<RenderedPage> {
        self.shift_page(-1)
    }

    /// Jumps to a 1-based page number taken from a text field. Non-numeric
    /// or out-of-range input is ignored without a notification.
    pub fn jump_to(&mut self, input: &str) -> Option<RenderedPage> {
        let session = self.registry.active_session_mut()?;
        let tab_id = session.id;

        let requested: usize = input.trim().parse().ok()?;
        if requested < 1 || requested > session.document.page_count() {
            return None;
        }

        session.current_page = requested - 1;
        self.render_tab(tab_id)
    }

    fn apply_zoom(&mut self, zoom_in: bool) -> Option<RenderedPage> {
        let (step, min, max) = (self.config.zoom_step, self.config.zoom_min, self.config.zoom_max);
        let session = self.registry.active_session_mut()?;
        let tab_id = session.id;

        let next = if zoom_in {
            session.zoom_factor * step
        } else {
            session.zoom_factor / step
        };
        if next < min || next > max {
            return None;
        }

        session.zoom_factor = next;
        self.render_tab(tab_id)
    }

    pub fn zoom_in(&mut self) -> Option<RenderedPage> {
        self.apply_zoom(true)
    }

    pub fn zoom_out(&mut self) -> Option<RenderedPage> {
        self.apply_zoom(false)
    }

    /// Closes a tab, releasing its document. Unknown ids are ignored.
    pub fn close_tab(&mut self, tab_id: TabId) {
        self.registry.close_tab(tab_id);
    }

    pub fn close_active_tab(&mut self) {
        if let Some(tab_id) = self.registry.active_tab() {
            self.close_tab(tab_id);
        }
    }

    /// Writes a locked copy of the focused tab's file at `dst`.
    pub fn lock_active(
        &mut self,
        dst: &Path,
        owner_password: &str,
        user_password: &str,
        permissions: Permissions,
    ) -> Option<PathBuf> {
        let Some(src) = self.active_path() else {
            self.notifier.warning("No document open to lock.");
            return None;
        };
        self.lock_path(&src, dst, owner_password, user_password, permissions)
    }

    pub fn lock_path(
        &mut self,
        src: &Path,
        dst: &Path,
        owner_password: &str,
        user_password: &str,
        permissions: Permissions,
    ) -> Option<PathBuf> {
        match self
            .gateway
            .lock(src, dst, owner_password, user_password, permissions)
        {
            Ok(output) => {
                self.notifier
                    .info(&format!("PDF locked successfully: {}", output.display()));
                Some(output)
            }
            Err(err) => {
                self.notifier.error(&err.to_string());
                None
            }
        }
    }

    /// Writes an unlocked copy of the focused tab's file at `dst` and opens
    /// it in a new tab.
    pub fn unlock_active(&mut self, password: &str, dst: &Path) -> Option<TabId> {
        let Some(src) = self.active_path() else {
            self.notifier.warning("No document open to unlock.");
            return None;
        };

        let output = match self.gateway.unlock(&src, password, dst) {
            Ok(output) => output,
            Err(err) => {
                self.notifier.error(&err.to_string());
                return None;
            }
        };

        self.notifier
            .info(&format!("PDF unlocked successfully: {}", output.display()));
        self.open_file(&output)
    }

    /// Converts a PDF to Word on a background worker. The handle may be
    /// dropped; the worker reports through the notifier.
    pub fn convert_to_word(&self, src: &Path, dst: &Path) -> JoinHandle<()> {
        spawn_conversion(
            Arc::clone(&self.converter),
            ConversionKind::PdfToWord,
            src.to_path_buf(),
            dst.to_path_buf(),
            Arc::clone(&self.notifier),
        )
    }

    /// Converts a Word document to PDF on a background worker.
    pub fn convert_to_pdf(&self, src: &Path, dst: &Path) -> JoinHandle<()> {
        spawn_conversion(
            Arc::clone(&self.converter),
            ConversionKind::WordToPdf,
            src.to_path_buf(),
            dst.to_path_buf(),
            Arc::clone(&self.notifier),
        )
    }

    fn active_path(&self) -> Option<PathBuf> {
        self.registry
            .active_session()
            .map(|session| session.document.path().to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        FakeConverter, FakeDocSpec, FakeEngine, RecordingNotifier, ScriptedPrompt,
    };

    struct Harness {
        engine: Arc<FakeEngine>,
        notifier: Arc<RecordingNotifier>,
        prompt: Arc<ScriptedPrompt>,
        converter: Arc<FakeConverter>,
        viewer: Viewer,
    }

    fn harness(prompt: ScriptedPrompt) -> Harness {
        let engine = Arc::new(FakeEngine::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let prompt = Arc::new(prompt);
        let converter = Arc::new(FakeConverter::succeeding());
        let gateway = SecurityGateway::new(engine.clone(), engine.clone());
        let viewer = Viewer::new(
            ViewerConfig::default(),
            gateway,
            converter.clone(),
            Box::new(prompt.clone()),
            notifier.clone(),
        );
        Harness {
            engine,
            notifier,
            prompt,
            converter,
            viewer,
        }
    }

    fn harness_with_doc(name: &str, spec: FakeDocSpec) -> (Harness, PathBuf) {
        let h = harness(ScriptedPrompt::cancelling());
        let path = PathBuf::from(format!("/docs/{name}"));
        h.engine.insert(path.clone(), spec);
        (h, path)
    }

    #[test]
    fn opening_a_plain_file_never_prompts() {
        let (mut h, path) = harness_with_doc("plain.pdf", FakeDocSpec::plain(4));
        let tab_id = h.viewer.open_file(&path).unwrap();

        assert_eq!(h.prompt.request_count(), 0);
        assert_eq!(h.viewer.registry().active_tab(), Some(tab_id));
    }

    #[test]
    fn encrypted_open_retries_once_and_succeeds() {
        let mut h = harness(ScriptedPrompt::with_password("secret"));
        let path = PathBuf::from("/docs/locked.pdf");
        h.engine.insert(path.clone(), FakeDocSpec::protected(9, "secret"));

        let tab_id = h.viewer.open_file(&path).unwrap();
        let session = h.viewer.registry().get(tab_id).unwrap();
        assert_eq!(session.document.page_count(), 9);
        assert_eq!(h.prompt.request_count(), 1);
        assert!(h.notifier.errors().is_empty());
    }

    #[test]
    fn two_bad_passwords_notify_and_open_nothing() {
        let mut h = harness(ScriptedPrompt::with_password("wrong"));
        let path = PathBuf::from("/docs/locked.pdf");
        h.engine.insert(path.clone(), FakeDocSpec::protected(9, "secret"));

        assert!(h.viewer.open_file(&path).is_none());
        assert!(!h.viewer.registry().has_tabs());
        let errors = h.notifier.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("incorrect password"));
    }

    #[test]
    fn cancelled_prompt_opens_nothing_silently() {
        let (mut h, path) = harness_with_doc("locked.pdf", FakeDocSpec::protected(2, "pw"));
        assert!(h.viewer.open_file(&path).is_none());
        assert!(h.notifier.events().is_empty());
    }

    #[test]
    fn navigation_stays_within_bounds() {
        let (mut h, path) = harness_with_doc("nav.pdf", FakeDocSpec::plain(3));
        let tab_id = h.viewer.open_file(&path).unwrap();

        // Previous on page 0 is a no-op.
        assert!(h.viewer.prev_page().is_none());
        assert_eq!(h.viewer.registry().get(tab_id).unwrap().current_page, 0);

        assert!(h.viewer.next_page().is_some());
        assert!(h.viewer.next_page().is_some());
        // Next on the last page is a no-op.
        assert!(h.viewer.next_page().is_none());
        assert_eq!(h.viewer.registry().get(tab_id).unwrap().current_page, 2);
    }

    #[test]
    fn jump_ignores_invalid_input() {
        let (mut h, path) = harness_with_doc("jump.pdf", FakeDocSpec::plain(10));
        let tab_id = h.viewer.open_file(&path).unwrap();

        for input in ["seven", "", "0", "-3", "11"] {
            assert!(h.viewer.jump_to(input).is_none(), "input {input:?}");
            assert_eq!(h.viewer.registry().get(tab_id).unwrap().current_page, 0);
        }

        let rendered = h.viewer.jump_to("7").unwrap();
        assert_eq!(h.viewer.registry().get(tab_id).unwrap().current_page, 6);
        assert_eq!(rendered.page_label, "7/10");
    }

    #[test]
    fn zoom_round_trips_within_tolerance() {
        let (mut h, path) = harness_with_doc("zoom.pdf", FakeDocSpec::plain(2));
        let tab_id = h.viewer.open_file(&path).unwrap();

        for _ in 0..5 {
            h.viewer.zoom_in();
        }
        for _ in 0..5 {
            h.viewer.zoom_out();
        }

        let zoom = h.viewer.registry().get(tab_id).unwrap().zoom_factor;
        assert!((zoom - 1.0).abs() < 1e-5, "zoom drifted to {zoom}");
    }

    #[test]
    fn zoom_requests_leaving_the_range_are_rejected() {
        let (mut h, path) = harness_with_doc("zoom.pdf", FakeDocSpec::plain(2));
        let tab_id = h.viewer.open_file(&path).unwrap();

        // 1.1^25 > 10, so the factor stops growing before the cap.
        for _ in 0..40 {
            h.viewer.zoom_in();
        }
        let capped = h.viewer.registry().get(tab_id).unwrap().zoom_factor;
        assert!(capped <= 10.0);

        for _ in 0..80 {
            h.viewer.zoom_out();
        }
        let floored = h.viewer.registry().get(tab_id).unwrap().zoom_factor;
        assert!(floored >= 0.1);
    }

    #[test]
    fn zoom_without_tabs_is_a_no_op() {
        let mut h = harness(ScriptedPrompt::cancelling());
        assert!(h.viewer.zoom_in().is_none());
        assert!(h.viewer.next_page().is_none());
        assert!(h.viewer.jump_to("1").is_none());
    }

    #[test]
    fn conversion_worker_reports_back() {
        let (h, _path) = harness_with_doc("c.pdf", FakeDocSpec::plain(1));
        let handle = h
            .viewer
            .convert_to_word(Path::new("/docs/c.pdf"), Path::new("/out/c.docx"));
        handle.join().unwrap();

        assert_eq!(h.converter.calls().len(), 1);
        assert_eq!(h.notifier.infos().len(), 1);
    }

    #[test]
    fn lock_failure_is_notified_not_propagated() {
        let (mut h, path) = harness_with_doc("locked.pdf", FakeDocSpec::protected(2, "pw"));
        let out = h.viewer.lock_path(
            &path,
            Path::new("/out/locked.pdf"),
            "owner",
            "user",
            Permissions::allow_all(),
        );
        assert!(out.is_none());
        assert_eq!(h.notifier.errors().len(), 1);
    }

    #[test]
    fn unlock_active_opens_the_unlocked_copy() {
        let mut h = harness(ScriptedPrompt::with_password("secret"));
        let path = PathBuf::from("/docs/locked.pdf");
        h.engine.insert(path.clone(), FakeDocSpec::protected(6, "secret"));

        let locked_tab = h.viewer.open_file(&path).unwrap();
        let dst = std::env::temp_dir().join("pdfdeck-viewer-unlock.pdf");
        let unlocked_tab = h.viewer.unlock_active("secret", &dst).unwrap();

        assert_ne!(locked_tab, unlocked_tab);
        assert_eq!(
            h.viewer
                .registry()
                .get(unlocked_tab)
                .unwrap()
                .document
                .page_count(),
            6
        );
        let _ = std::fs::remove_file(&dst);
    }

    #[test]
    fn end_to_end_report_scenario() {
        let (mut h, path) = harness_with_doc("report.pdf", FakeDocSpec::plain(10));

        let tab_id = h.viewer.open_file(&path).unwrap();
        h.viewer.jump_to("7");
        assert_eq!(h.viewer.registry().get(tab_id).unwrap().current_page, 6);

        for _ in 0..3 {
            h.viewer.zoom_in();
        }
        let zoom = h.viewer.registry().get(tab_id).unwrap().zoom_factor;
        assert!((zoom - 1.1f32.powi(3)).abs() < 1e-5);

        h.viewer.close_tab(tab_id);
        assert!(!h.viewer.registry().contains(tab_id));
        assert!(!h.viewer.registry().has_tabs());
        assert_eq!(h.engine.close_count(&path), 1);
    }
}
