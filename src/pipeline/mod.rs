//! Pipeline stages for PDF summarisation.
//!
//! Each submodule implements one step, and the external collaborators (PDF
//! parser, OCR engine, summarization model) sit behind traits so every stage
//! can be tested with fakes.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ pdf ──▶ acquire ──────────────▶ retry ──▶ llm
//! (path/URL) (pdfium) (text per page)        (backoff)  (chat model)
//!                      └─▶ encode ──▶ ocr
//!                          (PNG)      (tesseract / vision)
//! ```
//!
//! 1. [`input`]   resolve a path or URL to bytes, check the `%PDF` magic
//! 2. [`pdf`]     parse with pdfium, embedded text per page, render textless
//!    pages; blocking, so callers run it in `spawn_blocking`
//! 3. [`acquire`] walk the pages in order, OCR fallback, skip failures
//! 4. [`encode`]  PNG/base64 for the OCR engines
//! 5. [`ocr`]     image to text
//! 6. [`retry`]   bounded exponential backoff on rate limits, cancellable
//! 7. [`llm`]     one summarization call, error classification, chunking
//! 8. [`postprocess`] deterministic cleanup of page text and model output

pub mod acquire;
pub mod encode;
pub mod input;
pub mod llm;
pub mod ocr;
pub mod pdf;
pub mod postprocess;
pub mod retry;
