use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::json;

use pdfdeck::config::ViewerConfig;
use pdfdeck::convert::{DocumentConverter as _, SofficeConverter};
use pdfdeck::engine::Permissions;
use pdfdeck::engine::pdfium::PdfiumEngine;
use pdfdeck::notify::{LogNotifier, Notifier as _};
use pdfdeck::security::{SecurityGateway, confirm_password};
use pdfdeck::{debug_log, logger};

#[derive(Parser)]
#[command(name = "pdfdeck", version, about = "PDF session tools")]
struct Cli {
    /// Path to a JSON config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write debug logs to the log file.
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print document information as JSON.
    Info {
        file: PathBuf,
        #[arg(long)]
        password: Option<String>,
    },
    /// Rasterize one page to a PNG file.
    Render {
        file: PathBuf,
        /// 1-based page number.
        #[arg(long, default_value_t = 1)]
        page: usize,
        /// Zoom factor on top of the document base zoom.
        #[arg(long, default_value_t = 1.0)]
        zoom: f32,
        #[arg(long, short)]
        output: PathBuf,
        #[arg(long)]
        password: Option<String>,
    },
    /// Write a password-protected copy.
    Lock {
        src: PathBuf,
        dst: PathBuf,
        #[arg(long)]
        password: String,
        /// Repeat of the password; must match when given.
        #[arg(long)]
        confirm: Option<String>,
    },
    /// Write an unprotected copy.
    Unlock {
        src: PathBuf,
        dst: PathBuf,
        #[arg(long)]
        password: String,
    },
    /// Convert a PDF to a DOCX file.
    ToWord { src: PathBuf, dst: PathBuf },
    /// Convert a DOCX file to a PDF.
    ToPdf { src: PathBuf, dst: PathBuf },
}

fn main() {
    logger::initialize();

    let cli = Cli::parse();
    if cli.log_file {
        logger::enable_file_logging();
    }

    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::default(),
    };

    let engine = Arc::new(PdfiumEngine::new());
    let gateway = SecurityGateway::new(engine.clone(), engine);
    let notifier = LogNotifier;

    match cli.command {
        Commands::Info { file, password } => {
            let document = gateway.open(&file, password.as_deref())?;
            let info = json!({
                "path": document.path(),
                "page_count": document.page_count(),
                "base_zoom": document.base_zoom(),
                "metadata": document.metadata(),
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Commands::Render {
            file,
            page,
            zoom,
            output,
            password,
        } => {
            if page == 0 {
                bail!("pages are numbered from 1");
            }
            if zoom < config.zoom_min || zoom > config.zoom_max {
                bail!(
                    "zoom {zoom} is outside [{}, {}]",
                    config.zoom_min,
                    config.zoom_max
                );
            }

            let document = gateway.open(&file, password.as_deref())?;
            let image = document.render_page(page - 1, zoom)?;
            image
                .save(&output)
                .with_context(|| format!("cannot write {}", output.display()))?;
            debug_log!("[cli] rendered page {page} of {} to {}", file.display(), output.display());
        }
        Commands::Lock {
            src,
            dst,
            password,
            confirm,
        } => {
            if let Some(confirmation) = &confirm
                && confirm_password(&password, confirmation).is_none()
            {
                bail!("passwords do not match");
            }
            gateway.lock(&src, &dst, &password, &password, Permissions::allow_all())?;
            notifier.info(&format!("locked copy written to {}", dst.display()));
        }
        Commands::Unlock { src, dst, password } => {
            gateway.unlock(&src, &password, &dst)?;
            notifier.info(&format!("unlocked copy written to {}", dst.display()));
        }
        Commands::ToWord { src, dst } => {
            SofficeConverter::new().pdf_to_word(&src, &dst)?;
            notifier.info(&format!("wrote {}", dst.display()));
        }
        Commands::ToPdf { src, dst } => {
            SofficeConverter::new().word_to_pdf(&src, &dst)?;
            notifier.info(&format!("wrote {}", dst.display()));
        }
    }

    Ok(())
}
