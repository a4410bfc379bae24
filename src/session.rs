use std::sync::Arc;

use image::RgbImage;

use crate::document::DocumentHandle;

/// Opaque identifier for one open tab. Never reused within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TabId(usize);

/// One open document plus its view state.
pub struct TabSession {
    pub id: TabId,
    pub document: DocumentHandle,
    /// Invariant: `0 <= current_page < page_count` (pinned to 0 for empty
    /// documents).
    pub current_page: usize,
    /// Invariant: `> 0`; adjusted multiplicatively by the zoom controller.
    pub zoom_factor: f32,
    /// Keeps the displayed bitmap alive while it is on screen. Not a cache:
    /// replaced wholesale on every render.
    pub last_rendered: Option<Arc<RgbImage>>,
}

impl TabSession {
    fn new(id: TabId, document: DocumentHandle) -> Self {
        Self {
            id,
            document,
            current_page: 0,
            zoom_factor: 1.0,
            last_rendered: None,
        }
    }

    pub fn file_name(&self) -> String {
        self.document
            .path()
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.document.path().to_string_lossy().to_string())
    }
}

/// All open tabs, in display order, plus which one the UI has focused.
#[derive(Default)]
pub struct SessionRegistry {
    tabs: Vec<TabSession>,
    active_tab_id: Option<TabId>,
    next_tab_id: usize,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session for a freshly opened document (page 0, zoom 1.0) and
    /// focuses it.
    pub fn create_tab(&mut self, document: DocumentHandle) -> TabId {
        let id = TabId(self.next_tab_id);
        self.next_tab_id += 1;
        self.tabs.push(TabSession::new(id, document));
        self.active_tab_id = Some(id);
        id
    }

    /// Closes the document, then removes the entry. Unknown ids are ignored.
    pub fn close_tab(&mut self, tab_id: TabId) {
        let Some(index) = self.tabs.iter().position(|tab| tab.id == tab_id) else {
            return;
        };

        self.tabs[index].document.close();
        self.tabs.remove(index);

        if self.active_tab_id == Some(tab_id) {
            self.active_tab_id = if self.tabs.is_empty() {
                None
            } else if index < self.tabs.len() {
                Some(self.tabs[index].id)
            } else {
                Some(self.tabs[self.tabs.len() - 1].id)
            };
        }
    }

    /// The tab the UI currently has focused, if any.
    pub fn active_tab(&self) -> Option<TabId> {
        self.active_tab_id
    }

    /// Focus signal from the UI collaborator. Rejects unknown ids.
    pub fn set_active_tab(&mut self, tab_id: TabId) -> bool {
        if self.tabs.iter().any(|tab| tab.id == tab_id) {
            self.active_tab_id = Some(tab_id);
            true
        } else {
            false
        }
    }

    pub fn get(&self, tab_id: TabId) -> Option<&TabSession> {
        self.tabs.iter().find(|tab| tab.id == tab_id)
    }

    pub fn get_mut(&mut self, tab_id: TabId) -> Option<&mut TabSession> {
        self.tabs.iter_mut().find(|tab| tab.id == tab_id)
    }

    pub fn active_session(&self) -> Option<&TabSession> {
        self.active_tab_id.and_then(|id| self.get(id))
    }

    pub fn active_session_mut(&mut self) -> Option<&mut TabSession> {
        let id = self.active_tab_id?;
        self.get_mut(id)
    }

    pub fn contains(&self, tab_id: TabId) -> bool {
        self.tabs.iter().any(|tab| tab.id == tab_id)
    }

    /// Tab ids in display order.
    pub fn tab_ids(&self) -> Vec<TabId> {
        self.tabs.iter().map(|tab| tab.id).collect()
    }

    pub fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    pub fn has_tabs(&self) -> bool {
        !self.tabs.is_empty()
    }
}
