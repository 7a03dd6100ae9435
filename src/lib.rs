//! # edgequake-pdfsum
//!
//! Summarise PDF documents with an LLM.
//!
//! Text is read from the PDF's content stream where it exists. Scanned pages
//! with no embedded text are rendered and passed through OCR (local
//! `tesseract` or a vision model). The collected text is sent to a chat model
//! for summarisation, with bounded exponential backoff when the provider
//! rate-limits the request.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Credential  resolve the LLM provider; fail fast when no key is set
//!  ├─ 2. Input       local file, URL download, or in-memory bytes
//!  ├─ 3. Acquire     embedded text per page, OCR fallback, skip bad pages
//!  ├─ 4. Budget      optional truncation, always reported
//!  ├─ 5. Summarise   whole text or chunked, retried on rate limits
//!  └─ 6. Output      summary + per-page sources + stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdfsum::{summarize, SummaryConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = SummaryConfig::default();
//!     let output = summarize("document.pdf", &config, &CancellationToken::new()).await?;
//!     println!("{}", output.summary);
//!     eprintln!(
//!         "{} pages ({} via OCR), {} attempt(s)",
//!         output.stats.total_pages, output.stats.ocr_pages, output.stats.attempts
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfsum` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdfsum = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod summarize;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ChunkStrategy, OcrBackend, PageSelection, PageSeparator, RetryPolicy, SummaryConfig,
    SummaryConfigBuilder, Truncation,
};
pub use error::{ConfigError, ExtractionError, PdfSumError, RemoteError, SummaryFailure};
pub use output::{AcquiredText, PageText, Summary, SummaryOutput, SummaryStats, TextSource};
pub use pipeline::acquire::TextAcquirer;
pub use pipeline::llm::Summarizer;
pub use pipeline::retry::{RetryState, SummaryRetrier};
pub use progress::{NoopProgressCallback, ProgressCallback, SummaryProgressCallback};
pub use summarize::{
    extract_text, resolve_provider, summarize, summarize_bytes, summarize_sync, summarize_to_file,
};
