//! PDF parsing collaborator: bytes in, ordered [`Document`] out.
//!
//! [`PdfBackend`] is the seam the [`crate::pipeline::acquire::TextAcquirer`]
//! talks to. The production implementation, [`PdfiumBackend`], reads each
//! page's embedded text layer and rasterises a page **only** when that layer
//! is empty, so fully digital documents never pay for rendering.
//!
//! Per-page failures do not abort the document: they come back as
//! [`PageContent::Failed`] and the acquirer decides what to do with them.
//! Only document-level problems (corrupt file, wrong password, no pdfium)
//! are returned as `Err`.
//!
//! pdfium keeps thread-local state and must not run on an async worker, so
//! callers invoke [`PdfBackend::load`] from `spawn_blocking`.

use crate::config::PageSelection;
use crate::error::ExtractionError;
use crate::output::{Document, Page, PageContent};
use crate::pipeline::postprocess;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Options for one [`PdfBackend::load`] call.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub password: Option<String>,
    pub pages: PageSelection,
    /// Rasterise pages with no embedded text (needed for OCR).
    pub render_textless: bool,
    /// Longest edge of a rendered page, in pixels.
    pub max_rendered_pixels: u32,
}

/// Parses PDF bytes into pages.
///
/// Implementations are blocking.
pub trait PdfBackend: Send + Sync {
    fn load(&self, bytes: &[u8], options: &LoadOptions) -> Result<Document, ExtractionError>;
}

/// [`PdfBackend`] over the pdfium C++ library via `pdfium-render`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumBackend;

impl PdfBackend for PdfiumBackend {
    fn load(&self, bytes: &[u8], options: &LoadOptions) -> Result<Document, ExtractionError> {
        let pdfium = bind_pdfium()?;

        let document = pdfium
            .load_pdf_from_byte_slice(bytes, options.password.as_deref())
            .map_err(|e| classify_load_error(e, options.password.is_some()))?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("PDF loaded: {} pages", total_pages);

        let indices = options.pages.to_indices(total_pages);
        if indices.is_empty() {
            return Err(ExtractionError::PageOutOfRange { total: total_pages });
        }

        let render_config = PdfRenderConfig::new()
            .set_target_width(options.max_rendered_pixels as i32)
            .set_maximum_height(options.max_rendered_pixels as i32);

        let mut out = Vec::with_capacity(indices.len());
        for idx in indices {
            let page_num = idx + 1;
            let content = match pages.get(idx as u16) {
                Ok(page) => read_page(&page, page_num, options.render_textless, &render_config),
                Err(e) => {
                    warn!("Page {}: could not open page: {:?}", page_num, e);
                    PageContent::Failed(format!("could not open page: {e:?}"))
                }
            };
            out.push(Page {
                index: page_num,
                content,
            });
        }

        Ok(Document {
            total_pages,
            pages: out,
        })
    }
}

/// Embedded text if any, otherwise (optionally) a rendered image.
fn read_page(
    page: &PdfPage<'_>,
    page_num: usize,
    render_textless: bool,
    render_config: &PdfRenderConfig,
) -> PageContent {
    let text = match page.text() {
        Ok(text) => text.all(),
        Err(e) => {
            warn!("Page {}: text layer unreadable: {:?}", page_num, e);
            return PageContent::Failed(format!("text extraction failed: {e:?}"));
        }
    };

    if postprocess::has_visible_text(&text) {
        debug!("Page {}: {} chars of embedded text", page_num, text.len());
        return PageContent::Text(text);
    }

    if !render_textless {
        return PageContent::Blank;
    }

    match page.render_with_config(render_config) {
        Ok(bitmap) => {
            let image = bitmap.as_image();
            debug!(
                "Page {}: no text layer, rendered {}x{} px for OCR",
                page_num,
                image.width(),
                image.height()
            );
            PageContent::Image(image)
        }
        Err(e) => {
            warn!("Page {}: rasterisation failed: {:?}", page_num, e);
            PageContent::Failed(format!("rasterisation failed: {e:?}"))
        }
    }
}

fn classify_load_error(e: PdfiumError, password_given: bool) -> ExtractionError {
    let detail = format!("{:?}", e);
    if detail.contains("Password") || detail.contains("password") {
        if password_given {
            ExtractionError::WrongPassword
        } else {
            ExtractionError::PasswordRequired
        }
    } else {
        ExtractionError::CorruptPdf { detail }
    }
}

/// Bind to libpdfium.
///
/// Search order:
/// 1. `PDFIUM_LIB_PATH`: the library file itself, or the directory holding it
/// 2. The current directory
/// 3. System library paths
pub fn bind_pdfium() -> Result<Pdfium, ExtractionError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(p) if !p.is_empty() => {
            let path = PathBuf::from(p);
            if path.is_dir() {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&path))
            } else {
                Pdfium::bind_to_library(&path)
            }
        }
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| ExtractionError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_errors_classified() {
        let e = PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError);
        assert!(matches!(
            classify_load_error(e, false),
            ExtractionError::PasswordRequired
        ));

        let e = PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError);
        assert!(matches!(
            classify_load_error(e, true),
            ExtractionError::WrongPassword
        ));
    }

    #[test]
    fn other_load_errors_are_corrupt() {
        let e = PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::FormatError);
        assert!(matches!(
            classify_load_error(e, false),
            ExtractionError::CorruptPdf { .. }
        ));
    }

    #[test]
    fn default_options_do_not_render() {
        let opts = LoadOptions::default();
        assert!(!opts.render_textless);
        assert!(opts.password.is_none());
    }
}
