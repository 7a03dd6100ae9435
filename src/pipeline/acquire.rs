//! Text acquisition: PDF bytes → one ordered text blob.
//!
//! ```text
//! bytes ──▶ PdfBackend::load (spawn_blocking)
//!              │ per page, ascending
//!              ├─ Text(t)      → keep t
//!              ├─ Image(img)   → OcrEngine::recognize(img)   (may be "")
//!              ├─ Blank        → skip, warning               (OCR disabled)
//!              └─ Failed(why)  → skip, warning
//!          ──▶ join non-empty page texts with the page separator
//! ```
//!
//! A page problem never aborts the document. The only whole-document
//! outcome besides a load error is [`ExtractionError::EmptyDocument`], when
//! nothing readable came out of any page.

use crate::config::SummaryConfig;
use crate::error::ExtractionError;
use crate::output::{AcquiredText, Document, PageContent, PageText, TextSource};
use crate::pipeline::ocr::OcrEngine;
use crate::pipeline::pdf::{LoadOptions, PdfBackend};
use crate::pipeline::postprocess;
use crate::progress::ProgressCallback;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Walks a PDF's pages and resolves each to text.
pub struct TextAcquirer {
    backend: Arc<dyn PdfBackend>,
    ocr: Option<Arc<dyn OcrEngine>>,
    options: LoadOptions,
    separator: String,
    progress: Option<ProgressCallback>,
}

impl TextAcquirer {
    /// An acquirer with no OCR engine: textless pages are skipped.
    pub fn new(backend: Arc<dyn PdfBackend>) -> Self {
        Self {
            backend,
            ocr: None,
            options: LoadOptions {
                max_rendered_pixels: 2000,
                ..LoadOptions::default()
            },
            separator: "\n".to_string(),
            progress: None,
        }
    }

    /// Build from a request config. `ocr` is the engine selected by
    /// [`SummaryConfig::ocr`], or `None` when OCR is disabled.
    pub fn from_config(
        config: &SummaryConfig,
        backend: Arc<dyn PdfBackend>,
        ocr: Option<Arc<dyn OcrEngine>>,
    ) -> Self {
        Self {
            backend,
            ocr,
            options: LoadOptions {
                password: config.password.clone(),
                pages: config.pages.clone(),
                render_textless: false,
                max_rendered_pixels: config.max_rendered_pixels,
            },
            separator: config.page_separator.as_str().to_string(),
            progress: config.progress_callback.clone(),
        }
    }

    pub fn with_ocr(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(engine);
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn with_progress(mut self, cb: ProgressCallback) -> Self {
        self.progress = Some(cb);
        self
    }

    /// Extract the text of every selected page, in page order.
    pub async fn acquire(&self, bytes: Vec<u8>) -> Result<AcquiredText, ExtractionError> {
        let backend = Arc::clone(&self.backend);
        let mut options = self.options.clone();
        // Pages are only rasterised when something can read the image.
        options.render_textless = self.ocr.is_some();

        let document = tokio::task::spawn_blocking(move || backend.load(&bytes, &options))
            .await
            .map_err(|e| ExtractionError::Internal(format!("parse task panicked: {e}")))??;

        self.resolve(document).await
    }

    async fn resolve(&self, document: Document) -> Result<AcquiredText, ExtractionError> {
        let page_count = document.pages.len();
        info!(
            "Acquiring text from {} of {} pages",
            page_count, document.total_pages
        );
        if let Some(ref cb) = self.progress {
            cb.on_acquire_start(page_count);
        }

        let mut contributions: Vec<String> = Vec::with_capacity(page_count);
        let mut pages = Vec::with_capacity(page_count);
        let mut warnings = Vec::new();

        for page in document.pages {
            let page_num = page.index;
            let (text, source) = match page.content {
                PageContent::Text(raw) => (postprocess::normalise_text(&raw), TextSource::Embedded),
                PageContent::Image(image) => match self.ocr {
                    Some(ref engine) => {
                        warn!(
                            "Page {}: no embedded text, falling back to {} OCR",
                            page_num,
                            engine.name()
                        );
                        self.notify_warning(page_num, "no embedded text, using OCR");
                        match engine.recognize(page_num, &image).await {
                            Ok(raw) => (postprocess::normalise_text(&raw), TextSource::Ocr),
                            Err(e) => {
                                self.skip(page_num, format!("OCR failed: {e}"), &mut warnings);
                                (String::new(), TextSource::Skipped)
                            }
                        }
                    }
                    None => {
                        self.skip(page_num, "no embedded text (OCR disabled)".into(), &mut warnings);
                        (String::new(), TextSource::Skipped)
                    }
                },
                PageContent::Blank => {
                    self.skip(page_num, "no embedded text (OCR disabled)".into(), &mut warnings);
                    (String::new(), TextSource::Skipped)
                }
                PageContent::Failed(detail) => {
                    self.skip(page_num, detail, &mut warnings);
                    (String::new(), TextSource::Skipped)
                }
            };

            let chars = text.chars().count();
            if source == TextSource::Ocr && chars == 0 {
                debug!("Page {}: OCR found no text", page_num);
            }
            if let Some(ref cb) = self.progress {
                cb.on_page_extracted(page_num, source, chars);
            }
            pages.push(PageText {
                page: page_num,
                source,
                chars,
            });
            if !text.is_empty() {
                contributions.push(text);
            }
        }

        let text = contributions.join(&self.separator);
        if text.trim().is_empty() {
            return Err(ExtractionError::EmptyDocument { pages: page_count });
        }

        info!(
            "Acquired {} chars ({} embedded, {} OCR, {} skipped pages)",
            text.chars().count(),
            pages.iter().filter(|p| p.source == TextSource::Embedded).count(),
            pages.iter().filter(|p| p.source == TextSource::Ocr).count(),
            warnings.len()
        );

        Ok(AcquiredText {
            text,
            pages,
            warnings,
            truncated: false,
        })
    }

    fn skip(&self, page_num: usize, detail: String, warnings: &mut Vec<ExtractionError>) {
        let failure = ExtractionError::PageFailure {
            page: page_num,
            detail,
        };
        warn!("{}", failure);
        self.notify_warning(page_num, &failure.to_string());
        warnings.push(failure);
    }

    fn notify_warning(&self, page_num: usize, message: &str) {
        if let Some(ref cb) = self.progress {
            cb.on_page_warning(page_num, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OcrError;
    use crate::output::Page;
    use crate::progress::SummaryProgressCallback;
    use async_trait::async_trait;
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::sync::Mutex;

    /// Per-page script for the fake backend.
    #[derive(Clone)]
    enum Fake {
        Text(&'static str),
        Textless,
        Broken,
    }

    struct FakeBackend(Vec<Fake>);

    impl PdfBackend for FakeBackend {
        fn load(&self, _bytes: &[u8], options: &LoadOptions) -> Result<Document, ExtractionError> {
            let pages = self
                .0
                .iter()
                .enumerate()
                .map(|(i, f)| Page {
                    index: i + 1,
                    content: match f {
                        Fake::Text(t) => PageContent::Text(t.to_string()),
                        Fake::Textless if options.render_textless => PageContent::Image(
                            DynamicImage::ImageRgba8(RgbaImage::from_pixel(
                                4,
                                4,
                                Rgba([255, 255, 255, 255]),
                            )),
                        ),
                        Fake::Textless => PageContent::Blank,
                        Fake::Broken => PageContent::Failed("bad content stream".into()),
                    },
                })
                .collect();
            Ok(Document {
                total_pages: self.0.len(),
                pages,
            })
        }
    }

    struct FailingBackend;

    impl PdfBackend for FailingBackend {
        fn load(&self, _bytes: &[u8], _options: &LoadOptions) -> Result<Document, ExtractionError> {
            Err(ExtractionError::PasswordRequired)
        }
    }

    /// Records every page it is asked to read and answers from a script.
    struct FakeOcr {
        calls: Mutex<Vec<usize>>,
        reply: fn(usize) -> Result<String, OcrError>,
    }

    impl FakeOcr {
        fn new(reply: fn(usize) -> Result<String, OcrError>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                reply,
            })
        }

        fn calls(&self) -> Vec<usize> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl OcrEngine for FakeOcr {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn recognize(&self, page_num: usize, _image: &DynamicImage) -> Result<String, OcrError> {
            self.calls.lock().unwrap().push(page_num);
            (self.reply)(page_num)
        }
    }

    fn acquirer(pages: Vec<Fake>, ocr: Option<Arc<FakeOcr>>) -> TextAcquirer {
        let mut a = TextAcquirer::new(Arc::new(FakeBackend(pages))).with_separator("<<PAGE>>");
        if let Some(engine) = ocr {
            a = a.with_ocr(engine);
        }
        a
    }

    #[tokio::test]
    async fn embedded_pages_never_touch_ocr() {
        let ocr = FakeOcr::new(|_| Ok("SHOULD NOT APPEAR".into()));
        let pages = vec![Fake::Text("alpha"), Fake::Text("beta"), Fake::Text("gamma")];
        let out = acquirer(pages, Some(ocr.clone()))
            .acquire(b"%PDF".to_vec())
            .await
            .unwrap();

        assert_eq!(out.text, "alpha<<PAGE>>beta<<PAGE>>gamma");
        assert_eq!(out.text.matches("<<PAGE>>").count(), 2);
        assert!(ocr.calls().is_empty());
        assert_eq!(out.count(TextSource::Embedded), 3);
        assert!(out.warnings.is_empty());
    }

    #[tokio::test]
    async fn textless_pages_use_ocr_once_each_in_order() {
        let ocr = FakeOcr::new(|p| Ok(format!("scanned {p}")));
        let pages = vec![Fake::Textless, Fake::Textless, Fake::Textless];
        let out = acquirer(pages, Some(ocr.clone()))
            .acquire(b"%PDF".to_vec())
            .await
            .unwrap();

        assert_eq!(ocr.calls(), vec![1, 2, 3]);
        assert_eq!(out.text, "scanned 1<<PAGE>>scanned 2<<PAGE>>scanned 3");
        assert_eq!(out.count(TextSource::Ocr), 3);
    }

    #[tokio::test]
    async fn broken_page_is_skipped_and_order_kept() {
        let pages = vec![
            Fake::Text("one"),
            Fake::Broken,
            Fake::Text("three"),
            Fake::Text("four"),
        ];
        let out = acquirer(pages, None).acquire(b"%PDF".to_vec()).await.unwrap();

        assert_eq!(out.text, "one<<PAGE>>three<<PAGE>>four");
        assert_eq!(out.warnings.len(), 1);
        assert!(matches!(
            out.warnings[0],
            ExtractionError::PageFailure { page: 2, .. }
        ));
        assert_eq!(out.pages.len(), 4);
        assert_eq!(out.pages[1].source, TextSource::Skipped);
    }

    #[tokio::test]
    async fn empty_ocr_result_is_accepted() {
        let ocr = FakeOcr::new(|_| Ok(String::new()));
        let pages = vec![Fake::Text("body"), Fake::Textless];
        let out = acquirer(pages, Some(ocr.clone()))
            .acquire(b"%PDF".to_vec())
            .await
            .unwrap();

        assert_eq!(out.text, "body");
        assert_eq!(out.pages[1].source, TextSource::Ocr);
        assert_eq!(out.pages[1].chars, 0);
        assert!(out.warnings.is_empty());
    }

    #[tokio::test]
    async fn ocr_failure_is_a_page_failure() {
        let ocr = FakeOcr::new(|_| Err(OcrError::Processing("segfault".into())));
        let pages = vec![Fake::Textless, Fake::Text("tail")];
        let out = acquirer(pages, Some(ocr))
            .acquire(b"%PDF".to_vec())
            .await
            .unwrap();

        assert_eq!(out.text, "tail");
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].to_string().contains("segfault"));
    }

    #[tokio::test]
    async fn all_whitespace_document_is_empty() {
        let ocr = FakeOcr::new(|_| Ok("   \n\t ".into()));
        let pages = vec![Fake::Textless, Fake::Textless];
        let err = acquirer(pages, Some(ocr))
            .acquire(b"%PDF".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::EmptyDocument { pages: 2 }));
    }

    #[tokio::test]
    async fn textless_without_ocr_is_empty_document() {
        let pages = vec![Fake::Textless];
        let err = acquirer(pages, None)
            .acquire(b"%PDF".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::EmptyDocument { pages: 1 }));
    }

    #[tokio::test]
    async fn load_errors_propagate() {
        let err = TextAcquirer::new(Arc::new(FailingBackend))
            .acquire(b"%PDF".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::PasswordRequired));
    }

    #[tokio::test]
    async fn embedded_text_is_normalised() {
        let pages = vec![Fake::Text("line one   \r\nline\u{200B} two\r\n")];
        let out = acquirer(pages, None).acquire(b"%PDF".to_vec()).await.unwrap();
        assert_eq!(out.text, "line one\nline two");
    }

    #[derive(Default)]
    struct Recorder {
        extracted: Mutex<Vec<(usize, TextSource)>>,
        warnings: Mutex<Vec<usize>>,
    }

    impl SummaryProgressCallback for Recorder {
        fn on_page_extracted(&self, page_num: usize, source: TextSource, _chars: usize) {
            self.extracted.lock().unwrap().push((page_num, source));
        }

        fn on_page_warning(&self, page_num: usize, _message: &str) {
            self.warnings.lock().unwrap().push(page_num);
        }
    }

    #[tokio::test]
    async fn progress_sees_every_page_and_warning() {
        let recorder = Arc::new(Recorder::default());
        let ocr = FakeOcr::new(|_| Ok("ocr".into()));
        let pages = vec![Fake::Text("a"), Fake::Textless, Fake::Broken];
        acquirer(pages, Some(ocr))
            .with_progress(recorder.clone())
            .acquire(b"%PDF".to_vec())
            .await
            .unwrap();

        assert_eq!(
            *recorder.extracted.lock().unwrap(),
            vec![
                (1, TextSource::Embedded),
                (2, TextSource::Ocr),
                (3, TextSource::Skipped)
            ]
        );
        // OCR fallback notice on page 2, skip on page 3.
        assert_eq!(*recorder.warnings.lock().unwrap(), vec![2, 3]);
    }
}
