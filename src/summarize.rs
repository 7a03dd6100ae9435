//! Top-level entry points.
//!
//! Every request runs the same steps:
//!
//! 1. Resolve the LLM provider. A missing credential fails here, before the
//!    PDF is read.
//! 2. Resolve the input (path, URL or bytes) and check the `%PDF` magic.
//! 3. Acquire the text (embedded, OCR fallback, page skips).
//! 4. Apply the configured truncation, if any, and report it.
//! 5. Summarise through the retry loop.

use crate::config::{ChunkStrategy, OcrBackend, SummaryConfig, Truncation};
use crate::error::{ConfigError, PdfSumError, SummaryFailure};
use crate::output::{AcquiredText, SummaryOutput, SummaryStats, TextSource};
use crate::pipeline::acquire::TextAcquirer;
use crate::pipeline::input;
use crate::pipeline::llm::{ChunkedSummarizer, LlmSummarizer, Summarizer};
use crate::pipeline::ocr::{OcrEngine, TesseractOcr, VisionOcr};
use crate::pipeline::pdf::{PdfBackend, PdfiumBackend};
use crate::pipeline::retry::SummaryRetrier;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Summarise a PDF file or URL.
///
/// # Errors
/// * [`PdfSumError::Config`] when no provider credential is available. This
///   is checked before the input is opened.
/// * Input errors (missing file, failed download, not a PDF).
/// * [`PdfSumError::Extraction`] when the document cannot be opened or no
///   page yields text.
/// * [`PdfSumError::Summary`] for the terminal outcomes of the retry loop,
///   including cancellation.
///
/// Pages that fail individually do not error; they are listed in
/// [`SummaryOutput::warnings`].
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdfsum::{summarize, SummaryConfig};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = SummaryConfig::builder().max_attempts(5).build()?;
/// let output = summarize("report.pdf", &config, &CancellationToken::new()).await?;
/// println!("{}", output.summary);
/// # Ok(())
/// # }
/// ```
pub async fn summarize(
    input_str: impl AsRef<str>,
    config: &SummaryConfig,
    cancel: &CancellationToken,
) -> Result<SummaryOutput, PdfSumError> {
    let started = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting summary: {}", input_str);

    let provider = resolve_provider(config)?;
    let bytes = input::resolve_input(input_str, config.download_timeout_secs).await?;

    run_pdfium(bytes, provider, config, cancel, started).await
}

/// Summarise PDF bytes already in memory (an upload, a database blob).
pub async fn summarize_bytes(
    bytes: Vec<u8>,
    config: &SummaryConfig,
    cancel: &CancellationToken,
) -> Result<SummaryOutput, PdfSumError> {
    let started = Instant::now();
    let provider = resolve_provider(config)?;
    input::check_pdf_magic(&bytes)?;

    run_pdfium(bytes, provider, config, cancel, started).await
}

/// Summarise a PDF and write the summary text to `output_path`.
///
/// The file is written atomically (temp file + rename), so a failed or
/// cancelled request never leaves a partial summary behind.
pub async fn summarize_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &SummaryConfig,
    cancel: &CancellationToken,
) -> Result<SummaryOutput, PdfSumError> {
    let output = summarize(input_str, config, cancel).await?;
    write_atomic(output_path.as_ref(), &output.summary).await?;
    Ok(output)
}

/// Synchronous wrapper around [`summarize`].
///
/// Creates a temporary tokio runtime internally. The request cannot be
/// cancelled.
pub fn summarize_sync(
    input_str: impl AsRef<str>,
    config: &SummaryConfig,
) -> Result<SummaryOutput, PdfSumError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PdfSumError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(summarize(input_str, config, &CancellationToken::new()))
}

/// Acquire the text of a PDF without summarising it.
///
/// Needs no LLM credential unless the OCR backend is [`OcrBackend::Vision`].
/// [`SummaryConfig::truncation`] is not applied.
pub async fn extract_text(
    input_str: impl AsRef<str>,
    config: &SummaryConfig,
) -> Result<AcquiredText, PdfSumError> {
    let provider = match config.ocr {
        OcrBackend::Vision => Some(resolve_provider(config)?),
        _ => None,
    };
    let bytes = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;

    let acquirer = TextAcquirer::from_config(
        config,
        Arc::new(PdfiumBackend),
        ocr_engine(config, provider.as_ref()),
    );
    Ok(acquirer.acquire(bytes).await?)
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run_pdfium(
    bytes: Vec<u8>,
    provider: Arc<dyn LLMProvider>,
    config: &SummaryConfig,
    cancel: &CancellationToken,
    started: Instant,
) -> Result<SummaryOutput, PdfSumError> {
    let ocr = ocr_engine(config, Some(&provider));
    let summarizer: Arc<dyn Summarizer> = Arc::new(LlmSummarizer::from_config(provider, config));
    run(
        bytes,
        Arc::new(PdfiumBackend),
        ocr,
        summarizer,
        config,
        cancel,
        started,
    )
    .await
}

/// Acquire, truncate, summarise, and assemble the output.
async fn run(
    bytes: Vec<u8>,
    backend: Arc<dyn PdfBackend>,
    ocr: Option<Arc<dyn OcrEngine>>,
    summarizer: Arc<dyn Summarizer>,
    config: &SummaryConfig,
    cancel: &CancellationToken,
    started: Instant,
) -> Result<SummaryOutput, PdfSumError> {
    if cancel.is_cancelled() {
        return Err(SummaryFailure::Cancelled { attempts: 0 }.into());
    }

    // ── Acquire ──────────────────────────────────────────────────────────
    let acquire_start = Instant::now();
    let mut acquired = TextAcquirer::from_config(config, backend, ocr)
        .acquire(bytes)
        .await?;
    let acquire_duration_ms = acquire_start.elapsed().as_millis() as u64;

    let mut warnings: Vec<String> = acquired.warnings.iter().map(|w| w.to_string()).collect();
    if let Some(note) = apply_truncation(&mut acquired, config) {
        warnings.push(note);
    }

    // ── Summarise ────────────────────────────────────────────────────────
    // The timeout bounds each remote call, so a chunked pass gets it per slice.
    let call_timeout = Duration::from_secs(config.api_timeout_secs);
    let mut retrier = match config.chunking {
        ChunkStrategy::WholeText => SummaryRetrier::new(summarizer, config.retry.clone())
            .with_call_timeout(call_timeout),
        ChunkStrategy::Chunked { chunk_chars } => {
            let chunked =
                ChunkedSummarizer::new(summarizer, chunk_chars).with_call_timeout(call_timeout);
            SummaryRetrier::new(Arc::new(chunked), config.retry.clone())
        }
    };
    if let Some(ref cb) = config.progress_callback {
        retrier = retrier.with_progress(Arc::clone(cb));
    }

    let summary_start = Instant::now();
    let summary = retrier.run(&acquired.text, cancel).await?;
    let summary_duration_ms = summary_start.elapsed().as_millis() as u64;

    // ── Assemble ─────────────────────────────────────────────────────────
    let stats = SummaryStats {
        total_pages: acquired.pages.len(),
        embedded_pages: acquired.count(TextSource::Embedded),
        ocr_pages: acquired.count(TextSource::Ocr),
        skipped_pages: acquired.count(TextSource::Skipped),
        input_chars: acquired.char_count(),
        summary_chars: summary.text.chars().count(),
        truncated: acquired.truncated,
        attempts: summary.attempts,
        acquire_duration_ms,
        summary_duration_ms,
        total_duration_ms: started.elapsed().as_millis() as u64,
    };

    info!(
        "Summary complete: {} pages, {} → {} chars, {} attempt(s), {}ms total",
        stats.total_pages,
        stats.input_chars,
        stats.summary_chars,
        stats.attempts,
        stats.total_duration_ms
    );

    Ok(SummaryOutput {
        summary: summary.text,
        pages: acquired.pages,
        warnings,
        stats,
    })
}

/// Apply [`SummaryConfig::truncation`]. Returns a user-facing note when text
/// was dropped.
fn apply_truncation(acquired: &mut AcquiredText, config: &SummaryConfig) -> Option<String> {
    let Truncation::MaxChars(max_chars) = config.truncation else {
        return None;
    };
    let total = acquired.char_count();
    if !acquired.truncate(max_chars) {
        return None;
    }

    let note = format!(
        "Text truncated to {} of {} characters before summarising",
        max_chars, total
    );
    warn!("{}", note);
    if let Some(ref cb) = config.progress_callback {
        cb.on_truncated(max_chars, total);
    }
    Some(note)
}

fn ocr_engine(
    config: &SummaryConfig,
    provider: Option<&Arc<dyn LLMProvider>>,
) -> Option<Arc<dyn OcrEngine>> {
    match config.ocr {
        OcrBackend::Tesseract { ref language } => Some(Arc::new(TesseractOcr::new(language.clone()))),
        OcrBackend::Vision => provider
            .map(|p| Arc::new(VisionOcr::new(Arc::clone(p))) as Arc<dyn OcrEngine>),
        OcrBackend::Disabled => None,
    }
}

async fn write_atomic(path: &Path, summary: &str) -> Result<(), PdfSumError> {
    let write_err = |e| PdfSumError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, format!("{}\n", summary.trim_end()))
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

fn create_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, ConfigError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ConfigError::MissingCredential {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`). The factory reads
///    that provider's API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    when both are set.
/// 4. **OpenAI** when `OPENAI_API_KEY` is set, so it wins over other keys.
/// 5. **Auto-detection** (`ProviderFactory::from_env`).
///
/// Any failure is [`ConfigError::MissingCredential`].
pub fn resolve_provider(config: &SummaryConfig) -> Result<Arc<dyn LLMProvider>, ConfigError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ConfigError::MissingCredential {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    // Auto-detection falls back to the mock provider when nothing is configured.
    let mock_requested = std::env::var("EDGEQUAKE_LLM_PROVIDER")
        .map(|p| p.eq_ignore_ascii_case("mock"))
        .unwrap_or(false);
    if llm_provider.name() == "mock" && !mock_requested {
        return Err(ConfigError::MissingCredential {
            provider: "auto".to_string(),
            hint: "No LLM credential found in the environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY, or pass --provider."
                .to_string(),
        });
    }

    Ok(llm_provider)
}
