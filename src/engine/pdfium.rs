use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context as _, Result};
use image::RgbImage;
use pdfium_render::prelude::*;

use crate::engine::{DocumentBackend, EncryptionSpec, OpenSource, RenderEngine, SecurityEngine};
use crate::error::ViewerError;

static PDFIUM_INSTANCE: OnceLock<Result<Pdfium, String>> = OnceLock::new();

fn shared_pdfium() -> Result<&'static Pdfium, ViewerError> {
    match PDFIUM_INSTANCE.get_or_init(|| init_pdfium().map_err(|err| format!("{err:#}"))) {
        Ok(pdfium) => Ok(pdfium),
        Err(message) => Err(ViewerError::Open(message.clone())),
    }
}

fn init_pdfium() -> Result<Pdfium> {
    let lib_path = "./lib";
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(lib_path));
    if let Err(err) = &bindings {
        eprintln!("[pdfium] {} failed: {}", lib_path, err);
    }
    let bindings = bindings
        .or_else(|_| Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./")))
        .or_else(|_| Pdfium::bind_to_system_library());

    let bindings =
        bindings.context("Pdfium dynamic library not found (tried ./lib, ./ and system paths)")?;

    Ok(Pdfium::new(bindings))
}

fn map_load_error(err: PdfiumError, had_password: bool) -> ViewerError {
    match err {
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
            if had_password {
                ViewerError::IncorrectPassword
            } else {
                ViewerError::PasswordRequired
            }
        }
        other => ViewerError::Open(other.to_string()),
    }
}

/// Production rendering engine backed by the pdfium dynamic library.
///
/// The library is bound once per process; documents borrow the shared
/// instance for their whole lifetime, as the viewer keeps every handle on
/// the owner thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumEngine;

impl PdfiumEngine {
    pub fn new() -> Self {
        Self
    }
}

struct PdfiumDocument {
    document: PdfDocument<'static>,
}

impl RenderEngine for PdfiumEngine {
    fn open(
        &self,
        source: OpenSource,
        password: Option<&str>,
    ) -> Result<Box<dyn DocumentBackend>, ViewerError> {
        let pdfium = shared_pdfium()?;
        let loaded = match source {
            OpenSource::Path(path) => pdfium.load_pdf_from_file(&path, password),
            OpenSource::Bytes(bytes) => pdfium.load_pdf_from_byte_vec(bytes, password),
        };

        match loaded {
            Ok(document) => Ok(Box::new(PdfiumDocument { document })),
            Err(err) => Err(map_load_error(err, password.is_some())),
        }
    }
}

impl DocumentBackend for PdfiumDocument {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_width_pt(&self, index: usize) -> Option<f32> {
        if index > u16::MAX as usize {
            return None;
        }
        self.document
            .pages()
            .get((index as u16).into())
            .ok()
            .map(|page| page.width().value)
    }

    fn metadata(&self) -> BTreeMap<String, String> {
        let tags = [
            ("title", PdfDocumentMetadataTagType::Title),
            ("author", PdfDocumentMetadataTagType::Author),
            ("subject", PdfDocumentMetadataTagType::Subject),
            ("keywords", PdfDocumentMetadataTagType::Keywords),
            ("creator", PdfDocumentMetadataTagType::Creator),
            ("producer", PdfDocumentMetadataTagType::Producer),
        ];

        let metadata = self.document.metadata();
        let mut map = BTreeMap::new();
        for (key, tag_type) in tags {
            if let Some(tag) = metadata.get(tag_type) {
                let value = tag.value();
                if !value.is_empty() {
                    map.insert(key.to_string(), value.to_string());
                }
            }
        }
        map
    }

    fn render_page(&self, index: usize, scale: f32) -> Result<RgbImage, ViewerError> {
        let page_count = self.page_count();
        if index >= page_count || index > u16::MAX as usize {
            return Err(ViewerError::PageOutOfRange {
                page: index,
                page_count,
            });
        }

        let page = self
            .document
            .pages()
            .get((index as u16).into())
            .map_err(|err| ViewerError::Open(err.to_string()))?;

        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|err| ViewerError::Open(err.to_string()))?;

        // Consumers expect a base-color image; drop the alpha channel here.
        Ok(bitmap
            .as_image()
            .map_err(|err| ViewerError::Open(err.to_string()))?
            .into_rgb8())
    }

    fn close(&mut self) {
        // Pdfium releases the document when the wrapper drops.
    }
}

impl SecurityEngine for PdfiumEngine {
    fn decrypt_to(&self, src: &Path, password: &str, dst: &Path) -> Result<(), ViewerError> {
        let pdfium = shared_pdfium()?;
        let document = pdfium
            .load_pdf_from_file(src, Some(password))
            .map_err(|err| map_load_error(err, true))?;

        document
            .save_to_file(dst)
            .map_err(|err| ViewerError::Unlock(err.to_string()))
    }

    fn encrypt_to(&self, _src: &Path, _dst: &Path, spec: &EncryptionSpec) -> Result<(), ViewerError> {
        // Pdfium can only save unencrypted copies. Locking needs a
        // structure-aware engine plugged in through this trait.
        Err(ViewerError::Lock(format!(
            "revision {} encryption is not supported by the pdfium backend",
            spec.revision
        )))
    }
}
