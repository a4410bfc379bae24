use std::sync::Arc;

use image::RgbImage;

use crate::error::ViewerError;
use crate::session::TabSession;

/// Canvas dimensions supplied by the UI collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1400, 800)
    }
}

/// Result of rendering one page: the bitmap, where to place it so it sits
/// centered in the viewport, and the "page n of m" label.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub image: Arc<RgbImage>,
    pub offset_x: u32,
    pub offset_y: u32,
    pub page_label: String,
}

/// Rasterizes the session's current page at its current zoom.
///
/// The bitmap is also stored in `session.last_rendered` so it outlives the
/// call while the UI displays it.
pub fn render_current_page(
    session: &mut TabSession,
    viewport: Viewport,
) -> Result<RenderedPage, ViewerError> {
    let image = session
        .document
        .render_page(session.current_page, session.zoom_factor)?;
    let image = Arc::new(image);
    session.last_rendered = Some(Arc::clone(&image));

    let offset_x = viewport.width.saturating_sub(image.width()) / 2;
    let offset_y = viewport.height.saturating_sub(image.height()) / 2;
    let page_label = format!(
        "{}/{}",
        session.current_page + 1,
        session.document.page_count()
    );

    Ok(RenderedPage {
        image,
        offset_x,
        offset_y,
        page_label,
    })
}
