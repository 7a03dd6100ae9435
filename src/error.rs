//! Error types for the edgequake-pdfsum library.
//!
//! Errors are split by the stage that produces them, then gathered into one
//! fatal type for the top-level entry points:
//!
//! * [`ExtractionError`]: text acquisition. Most variants are fatal (the
//!   document cannot be opened, or nothing readable was found). The
//!   [`ExtractionError::PageFailure`] variant is **non-fatal**: it is recorded
//!   on [`crate::output::AcquiredText::warnings`] and the document continues.
//!
//! * [`ConfigError`]: configuration and credentials. Raised before any page
//!   is touched so a missing API key never costs a full extraction pass.
//!
//! * [`SummaryFailure`]: terminal outcome of the retry loop.
//!
//! * [`RemoteError`] / [`OcrError`]: what the summarization and OCR
//!   collaborators report back. `RemoteError` carries the retryable /
//!   terminal classification the retry loop acts on.
//!
//! * [`PdfSumError`]: everything fatal, returned as `Err` by the
//!   `summarize*` functions.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdfsum library.
#[derive(Debug, Error)]
pub enum PdfSumError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Stage errors ──────────────────────────────────────────────────────
    /// Text acquisition failed for the whole document.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Configuration or credentials are missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The summary could not be produced.
    #[error(transparent)]
    Summary(#[from] SummaryFailure),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the summary artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while turning PDF bytes into text.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ExtractionError {
    /// No page yielded any text, embedded or OCR.
    #[error(
        "No text could be extracted from any of the {pages} page(s).\n\
The PDF may be blank, or scanned with OCR disabled or unavailable."
    )]
    EmptyDocument { pages: usize },

    /// One page could not be read. Non-fatal: the page contributes no text.
    #[error("Skipping page {page}: {detail}")]
    PageFailure { page: usize, detail: String },

    /// The bytes do not start with the `%PDF` magic.
    #[error("Input is not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { magic: [u8; 4] },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired,

    /// A password was provided but it is wrong.
    #[error("Wrong password for encrypted PDF")]
    WrongPassword,

    /// Selected page numbers fall outside the document.
    #[error("No selected page is within the document ({total} pages)")]
    PageOutOfRange { total: usize },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
pdfsum links libpdfium dynamically. You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium (file or directory).\n\
  • Place libpdfium next to the binary or in the working directory.\n\
  • Install it system-wide so the dynamic loader can find it.\n"
    )]
    PdfiumBindingFailed(String),

    /// The blocking parse task died.
    #[error("PDF parsing task failed: {0}")]
    Internal(String),
}

/// Configuration errors. Always reported before extraction starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No credential (API key) for the summarization provider.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    MissingCredential { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Terminal failure of a summarization request.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum SummaryFailure {
    /// The acquired text was empty; the remote service was never contacted.
    #[error("Nothing to summarise: the extracted text is empty")]
    EmptyInput,

    /// Every attempt was rate limited.
    #[error(
        "Rate limit still exceeded after {attempts} attempt(s).\n\
Wait a few minutes, or raise --max-attempts / --initial-delay-ms."
    )]
    RateLimitExhausted { attempts: u32 },

    /// Non-retryable service failure (auth, malformed request, server error).
    #[error("Summarization API error: {detail}")]
    RemoteError { detail: String },

    /// The caller abandoned the request.
    #[error("Summarization cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },
}

/// Classified error reported by a [`crate::pipeline::llm::Summarizer`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Quota exceeded (HTTP 429 and friends). Transient, retried with backoff.
    #[error("rate limited: {detail}")]
    RateLimited {
        detail: String,
        retry_after: Option<Duration>,
    },

    /// Anything else. Not retried.
    #[error("{0}")]
    Service(String),
}

impl RemoteError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, RemoteError::RateLimited { .. })
    }
}

/// Genuine OCR processing failure. "No text found" is `Ok(String::new())`.
#[derive(Debug, Clone, Error)]
pub enum OcrError {
    /// The OCR engine could not be started (binary missing, provider down).
    #[error("OCR engine unavailable: {0}")]
    Unavailable(String),

    /// The engine ran but failed on this image.
    #[error("OCR failed: {0}")]
    Processing(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_display() {
        let e = ExtractionError::EmptyDocument { pages: 4 };
        assert!(e.to_string().contains("4 page"), "got: {e}");
    }

    #[test]
    fn page_failure_display() {
        let e = ExtractionError::PageFailure {
            page: 3,
            detail: "bad xobject".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("page 3"));
        assert!(msg.contains("bad xobject"));
    }

    #[test]
    fn rate_limit_exhausted_display() {
        let e = SummaryFailure::RateLimitExhausted { attempts: 5 };
        assert!(e.to_string().contains("5 attempt"));
    }

    #[test]
    fn missing_credential_display() {
        let e = ConfigError::MissingCredential {
            provider: "openai".into(),
            hint: "Set OPENAI_API_KEY".into(),
        };
        assert!(e.to_string().contains("openai"));
        assert!(e.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn stage_errors_convert_into_fatal() {
        let e: PdfSumError = SummaryFailure::EmptyInput.into();
        assert!(matches!(e, PdfSumError::Summary(SummaryFailure::EmptyInput)));

        let e: PdfSumError = ExtractionError::PasswordRequired.into();
        assert!(e.to_string().contains("--password"));
    }

    #[test]
    fn remote_error_classification() {
        let rl = RemoteError::RateLimited {
            detail: "429".into(),
            retry_after: None,
        };
        assert!(rl.is_rate_limit());
        assert!(!RemoteError::Service("401".into()).is_rate_limit());
    }
}
