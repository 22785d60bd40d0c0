//! The export trigger: validate, lay out, render, write.

use chrono::{Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::calc;
use crate::error::ExportError;
use crate::format::Locale;
use crate::layout::{self, LayoutOptions, PageGeometry, Theme};
use crate::logo;
use crate::model::QuoteDocument;
use crate::render::{self, Canvas, LopdfCanvas};
use crate::validate;

static PATH_HOSTILE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[/\\:*?"<>|\x00-\x1f]"#).unwrap());

/// Writes next to `path` first and renames into place, so a reader never
/// sees a half-written PDF. The partial file is removed on failure.
fn write_replacing(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    fs::write(&partial, bytes).and_then(|()| fs::rename(&partial, path)).map_err(|source| {
        if let Err(e) = fs::remove_file(&partial) {
            log::debug!("cannot remove {}: {}", partial.display(), e);
        }
        ExportError::Io { path: path.to_path_buf(), source }
    })
}

/// `Devis-{quote number}.pdf`, or `Devis-{YYYY-MM-DD}.pdf` when unnumbered.
pub fn quote_file_name(doc: &QuoteDocument, today: NaiveDate) -> String {
    let number = doc.quote_details.quote_number.trim();
    let stem = if number.is_empty() {
        today.format("%Y-%m-%d").to_string()
    } else {
        PATH_HOSTILE.replace_all(number, "-").into_owned()
    };
    format!("Devis-{}.pdf", stem)
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub theme: Theme,
    pub locale: Locale,
    pub geometry: PageGeometry,
    pub logo_timeout: Duration,
    pub out_dir: PathBuf,
}

impl ExportOptions {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            theme: Theme::default(),
            locale: Locale::default(),
            geometry: PageGeometry::default(),
            logo_timeout: Duration::from_millis(3000),
            out_dir: out_dir.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportedQuote {
    pub path: PathBuf,
    pub pages: usize,
    pub bytes: usize,
}

/// Runs one export at a time.
#[derive(Debug, Default)]
pub struct Exporter {
    in_flight: AtomicBool,
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Exporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn acquire(&self) -> Result<InFlight<'_>, ExportError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ExportError::AlreadyRunning)?;
        Ok(InFlight(&self.in_flight))
    }

    /// Writes the quote as a PDF into `options.out_dir`.
    pub async fn export(&self, doc: &QuoteDocument, options: &ExportOptions) -> Result<ExportedQuote, ExportError> {
        self.export_with(doc, options, &mut LopdfCanvas::new()).await
    }

    /// Same as [`Exporter::export`] with a caller-supplied canvas. Nothing is
    /// written unless every page rendered.
    pub async fn export_with<C: Canvas + ?Sized>(
        &self,
        doc: &QuoteDocument,
        options: &ExportOptions,
        canvas: &mut C,
    ) -> Result<ExportedQuote, ExportError> {
        let _guard = self.acquire()?;
        validate::validate(doc)?;

        let totals = calc::aggregate(&doc.lines);
        log::info!(
            "exporting quote {:?}: {} line(s), {:.2} TTC",
            doc.quote_details.quote_number,
            doc.lines.len(),
            totals.total_ttc
        );

        let logo = logo::try_load_logo(doc.sender.logo.as_deref(), options.logo_timeout).await;

        let layout_options = LayoutOptions {
            theme: options.theme,
            locale: options.locale,
            geometry: options.geometry,
        };
        let laid_out = layout::layout_quote(doc, &totals, logo.as_ref(), &layout_options)?;
        let bytes = render::render_quote(&laid_out, logo.as_ref(), canvas)?;

        fs::create_dir_all(&options.out_dir)
            .map_err(|source| ExportError::Io { path: options.out_dir.clone(), source })?;
        let path = options.out_dir.join(quote_file_name(doc, Local::now().date_naive()));
        write_replacing(&path, &bytes)?;

        log::info!("wrote {} ({} pages, {} bytes)", path.display(), laid_out.page_count(), bytes.len());
        Ok(ExportedQuote {
            path,
            pages: laid_out.page_count(),
            bytes: bytes.len(),
        })
    }
}
