use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::ViewerError;
use crate::notify::Notifier;

/// The document conversion collaborator. Both calls block; the viewer runs
/// them on one-shot worker threads.
pub trait DocumentConverter: Send + Sync {
    fn pdf_to_word(&self, src: &Path, dst: &Path) -> Result<(), ViewerError>;
    fn word_to_pdf(&self, src: &Path, dst: &Path) -> Result<(), ViewerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionKind {
    PdfToWord,
    WordToPdf,
}

impl ConversionKind {
    fn describe(self) -> &'static str {
        match self {
            Self::PdfToWord => "PDF to Word",
            Self::WordToPdf => "DOCX to PDF",
        }
    }
}

/// Converter that shells out to LibreOffice.
///
/// The binary is `soffice` unless overridden via `PDFDECK_SOFFICE`.
pub struct SofficeConverter {
    binary: OsString,
}

impl SofficeConverter {
    pub fn new() -> Self {
        let binary = std::env::var_os("PDFDECK_SOFFICE").unwrap_or_else(|| OsString::from("soffice"));
        Self { binary }
    }

    fn convert(&self, src: &Path, dst: &Path, target_ext: &str) -> Result<(), ViewerError> {
        let out_dir = dst
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let status = Command::new(&self.binary)
            .arg("--headless")
            .arg("--convert-to")
            .arg(target_ext)
            .arg("--outdir")
            .arg(&out_dir)
            .arg(src)
            .status()
            .map_err(|err| {
                ViewerError::Conversion(format!(
                    "failed to launch {}: {err}",
                    self.binary.to_string_lossy()
                ))
            })?;

        if !status.success() {
            return Err(ViewerError::Conversion(format!(
                "converter exited with status {status}"
            )));
        }

        // soffice names the output after the source stem; move it where the
        // caller asked.
        let stem = src
            .file_stem()
            .ok_or_else(|| ViewerError::Conversion(format!("no file stem in {}", src.display())))?;
        let mut produced_name = stem.to_os_string();
        produced_name.push(".");
        produced_name.push(target_ext);
        let produced = out_dir.join(produced_name);

        if produced != dst {
            fs::rename(&produced, dst)?;
        }
        Ok(())
    }
}

impl Default for SofficeConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentConverter for SofficeConverter {
    fn pdf_to_word(&self, src: &Path, dst: &Path) -> Result<(), ViewerError> {
        self.convert(src, dst, "docx")
    }

    fn word_to_pdf(&self, src: &Path, dst: &Path) -> Result<(), ViewerError> {
        self.convert(src, dst, "pdf")
    }
}

/// Runs one conversion on its own thread and reports the outcome through
/// the notifier. Fire-and-forget: the caller may drop the handle; there is
/// no cancellation and no retry. The worker only touches its own paths.
pub fn spawn_conversion(
    converter: Arc<dyn DocumentConverter>,
    kind: ConversionKind,
    src: PathBuf,
    dst: PathBuf,
    notifier: Arc<dyn Notifier>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let result = match kind {
            ConversionKind::PdfToWord => converter.pdf_to_word(&src, &dst),
            ConversionKind::WordToPdf => converter.word_to_pdf(&src, &dst),
        };

        match result {
            Ok(()) => notifier.info(&format!(
                "{} conversion finished: {}",
                kind.describe(),
                dst.display()
            )),
            Err(err) => notifier.error(&format!("{} conversion failed: {err}", kind.describe())),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotificationLevel;
    use crate::test_utils::{FakeConverter, RecordingNotifier};

    #[test]
    fn worker_reports_success_through_the_notifier() {
        let converter = Arc::new(FakeConverter::succeeding());
        let notifier = Arc::new(RecordingNotifier::new());

        let handle = spawn_conversion(
            converter.clone(),
            ConversionKind::PdfToWord,
            PathBuf::from("/in/report.pdf"),
            PathBuf::from("/out/report.docx"),
            notifier.clone(),
        );
        handle.join().unwrap();

        assert_eq!(
            converter.calls(),
            vec![(
                ConversionKind::PdfToWord,
                PathBuf::from("/in/report.pdf"),
                PathBuf::from("/out/report.docx")
            )]
        );
        let events = notifier.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, NotificationLevel::Info);
        assert!(events[0].1.contains("report.docx"));
    }

    #[test]
    fn worker_reports_failure_and_terminates() {
        let converter = Arc::new(FakeConverter::failing());
        let notifier = Arc::new(RecordingNotifier::new());

        let handle = spawn_conversion(
            converter,
            ConversionKind::WordToPdf,
            PathBuf::from("/in/memo.docx"),
            PathBuf::from("/out/memo.pdf"),
            notifier.clone(),
        );
        handle.join().unwrap();

        let errors = notifier.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("DOCX to PDF"));
    }

    #[test]
    fn workers_run_concurrently_without_a_queue() {
        let converter = Arc::new(FakeConverter::succeeding());
        let notifier = Arc::new(RecordingNotifier::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                spawn_conversion(
                    converter.clone(),
                    ConversionKind::PdfToWord,
                    PathBuf::from(format!("/in/{i}.pdf")),
                    PathBuf::from(format!("/out/{i}.docx")),
                    notifier.clone(),
                )
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(converter.calls().len(), 8);
        assert_eq!(notifier.events().len(), 8);
    }
}
