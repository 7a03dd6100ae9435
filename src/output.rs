//! Data passed between pipeline stages and returned to callers.
//!
//! [`Document`] and [`Page`] exist only for the duration of text acquisition.
//! [`AcquiredText`], [`Summary`] and [`SummaryOutput`] are what callers see;
//! the latter two serialise to JSON for `pdfsum --json`.

use crate::error::ExtractionError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// A parsed PDF: pages in ascending index order.
#[derive(Debug, Default)]
pub struct Document {
    /// Total pages in the file, including unselected ones.
    pub total_pages: usize,
    pub pages: Vec<Page>,
}

/// One page as delivered by the PDF backend.
#[derive(Debug)]
pub struct Page {
    /// 1-based page number in the source file.
    pub index: usize,
    pub content: PageContent,
}

/// What the PDF backend could get out of a page.
#[derive(Debug)]
pub enum PageContent {
    /// Non-empty embedded text.
    Text(String),
    /// No embedded text; the page was rendered for OCR.
    Image(DynamicImage),
    /// No embedded text and rendering was not requested.
    Blank,
    /// Reading or rendering the page raised.
    Failed(String),
}

/// Where a page's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    Embedded,
    Ocr,
    /// Page contributed nothing (failed, or textless with OCR disabled).
    Skipped,
}

/// Per-page breakdown of the acquired text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    /// 1-based page number.
    pub page: usize,
    pub source: TextSource,
    /// Characters this page contributed.
    pub chars: usize,
}

/// The ordered text of a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquiredText {
    /// Page texts joined by the page separator.
    pub text: String,
    /// One entry per walked page, ascending.
    pub pages: Vec<PageText>,
    /// Non-fatal problems, in page order.
    pub warnings: Vec<ExtractionError>,
    /// Set when [`AcquiredText::truncate`] cut the text.
    pub truncated: bool,
}

impl AcquiredText {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn count(&self, source: TextSource) -> usize {
        self.pages.iter().filter(|p| p.source == source).count()
    }

    /// Cut the text to at most `max_chars` characters.
    ///
    /// Returns `true` (and sets [`AcquiredText::truncated`]) when text was
    /// dropped. Cuts on a char boundary.
    pub fn truncate(&mut self, max_chars: usize) -> bool {
        match self.text.char_indices().nth(max_chars) {
            Some((byte_idx, _)) => {
                self.text.truncate(byte_idx);
                self.truncated = true;
                true
            }
            None => false,
        }
    }
}

/// A successful summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub text: String,
    /// Remote attempts it took, 1 when the first call succeeded.
    pub attempts: u32,
}

/// Everything the presentation layer needs after a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryOutput {
    pub summary: String,
    pub pages: Vec<PageText>,
    pub warnings: Vec<String>,
    pub stats: SummaryStats,
}

/// Counters and timings for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_pages: usize,
    pub embedded_pages: usize,
    pub ocr_pages: usize,
    pub skipped_pages: usize,
    pub input_chars: usize,
    pub summary_chars: usize,
    pub truncated: bool,
    pub attempts: u32,
    pub acquire_duration_ms: u64,
    pub summary_duration_ms: u64,
    pub total_duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acquired(text: &str) -> AcquiredText {
        AcquiredText {
            text: text.to_string(),
            pages: vec![],
            warnings: vec![],
            truncated: false,
        }
    }

    #[test]
    fn truncate_cuts_on_char_boundary() {
        let mut a = acquired("héllo wörld");
        assert!(a.truncate(4));
        assert_eq!(a.text, "héll");
        assert!(a.truncated);
    }

    #[test]
    fn truncate_noop_when_short() {
        let mut a = acquired("short");
        assert!(!a.truncate(5));
        assert!(!a.truncated);
        assert_eq!(a.text, "short");
    }

    #[test]
    fn text_source_serialises_snake_case() {
        let json = serde_json::to_string(&TextSource::Ocr).unwrap();
        assert_eq!(json, "\"ocr\"");
    }
}
