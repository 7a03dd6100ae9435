//! Configuration types for PDF summarisation.
//!
//! All behaviour is controlled through [`SummaryConfig`], built via its
//! [`SummaryConfigBuilder`]. Retry tuning lives in [`RetryPolicy`] rather than
//! in constants so every caller (CLI, library, tests) drives the same loop
//! with its own numbers.
//!
//! Credentials are never read here. The entry points in [`crate::summarize`]
//! resolve the provider once, up front, and hand it to the summarizer.

use crate::error::ConfigError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for one PDF summarisation request.
///
/// # Example
/// ```rust
/// use edgequake_pdfsum::{SummaryConfig, RetryPolicy};
/// use std::time::Duration;
///
/// let config = SummaryConfig::builder()
///     .model("gpt-4.1-mini")
///     .retry(RetryPolicy {
///         max_attempts: 5,
///         initial_delay: Duration::from_secs(2),
///         backoff_multiplier: 2.0,
///         max_delay: Some(Duration::from_secs(60)),
///     })
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct SummaryConfig {
    /// Bounded retry with exponential backoff around rate-limit errors.
    pub retry: RetryPolicy,

    /// How text is submitted to the model. Default: [`ChunkStrategy::WholeText`].
    pub chunking: ChunkStrategy,

    /// Optional character budget applied to the acquired text before
    /// summarisation. Default: [`Truncation::None`].
    ///
    /// When a limit cuts text it is always reported (log line, progress
    /// callback, `SummaryStats::truncated`), never applied silently.
    pub truncation: Truncation,

    /// OCR engine used for pages without an embedded text layer.
    pub ocr: OcrBackend,

    /// Maximum rendered image dimension (width or height) in pixels for OCR. Default: 2000.
    ///
    /// Only pages with no embedded text are rendered at all.
    pub max_rendered_pixels: u32,

    /// Page selection. Default: All pages.
    pub pages: PageSelection,

    /// Marker placed between page texts in the acquired blob. Default: newline.
    pub page_separator: PageSeparator,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// LLM model identifier, e.g. "gpt-4.1-nano". If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.3.
    pub temperature: f32,

    /// Upper bound on generated summary tokens. Default: 1024.
    pub max_tokens: usize,

    /// Custom system prompt. If None, uses built-in default.
    pub system_prompt: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-LLM-call timeout in seconds. Default: 120.
    ///
    /// A call that exceeds it is a terminal remote error, not a retry.
    pub api_timeout_secs: u64,

    /// Presentation hook for warnings, progress and retries.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            chunking: ChunkStrategy::default(),
            truncation: Truncation::default(),
            ocr: OcrBackend::default(),
            max_rendered_pixels: 2000,
            pages: PageSelection::default(),
            page_separator: PageSeparator::default(),
            password: None,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.3,
            max_tokens: 1024,
            system_prompt: None,
            download_timeout_secs: 120,
            api_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for SummaryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SummaryConfig")
            .field("retry", &self.retry)
            .field("chunking", &self.chunking)
            .field("truncation", &self.truncation)
            .field("ocr", &self.ocr)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("pages", &self.pages)
            .field("page_separator", &self.page_separator)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl SummaryConfig {
    /// Create a new builder for `SummaryConfig`.
    pub fn builder() -> SummaryConfigBuilder {
        SummaryConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`SummaryConfig`].
pub struct SummaryConfigBuilder {
    config: SummaryConfig,
}

impl fmt::Debug for SummaryConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SummaryConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl SummaryConfigBuilder {
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.retry.max_attempts = n;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.config.retry.initial_delay = delay;
        self
    }

    pub fn backoff_multiplier(mut self, m: f64) -> Self {
        self.config.retry.backoff_multiplier = m;
        self
    }

    pub fn max_delay(mut self, delay: Option<Duration>) -> Self {
        self.config.retry.max_delay = delay;
        self
    }

    pub fn chunking(mut self, strategy: ChunkStrategy) -> Self {
        self.config.chunking = strategy;
        self
    }

    pub fn truncation(mut self, t: Truncation) -> Self {
        self.config.truncation = t;
        self
    }

    pub fn ocr(mut self, backend: OcrBackend) -> Self {
        self.config.ocr = backend;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn page_separator(mut self, sep: PageSeparator) -> Self {
        self.config.page_separator = sep;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SummaryConfig, ConfigError> {
        self.config.retry.validate()?;
        if let ChunkStrategy::Chunked { chunk_chars: 0 } = self.config.chunking {
            return Err(ConfigError::Invalid("chunk size must be ≥ 1 character".into()));
        }
        if let Truncation::MaxChars(0) = self.config.truncation {
            return Err(ConfigError::Invalid(
                "truncation limit must be ≥ 1 character".into(),
            ));
        }
        if self.config.max_tokens == 0 {
            return Err(ConfigError::Invalid("max_tokens must be ≥ 1".into()));
        }
        if self.config.api_timeout_secs == 0 {
            return Err(ConfigError::Invalid("API timeout must be ≥ 1s".into()));
        }
        Ok(self.config)
    }
}

// ── Retry ────────────────────────────────────────────────────────────────

/// Tuning for the rate-limit retry loop.
///
/// With the defaults the waits between attempts are 1 s → 2 s → 4 s, so a
/// request gives up after roughly 7 s of sustained throttling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first. Must be ≥ 1. Default: 4.
    pub max_attempts: u32,
    /// Wait before the second attempt. Must be > 0. Default: 1 s.
    pub initial_delay: Duration,
    /// Factor applied to the wait after every retry. Must be > 1. Default: 2.0.
    pub backoff_multiplier: f64,
    /// Ceiling on a single wait. Default: 60 s.
    pub max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_delay: Some(Duration::from_secs(60)),
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be ≥ 1".into()));
        }
        if self.initial_delay.is_zero() {
            return Err(ConfigError::Invalid("initial_delay must be > 0".into()));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier <= 1.0 {
            return Err(ConfigError::Invalid(format!(
                "backoff_multiplier must be a finite number > 1, got {}",
                self.backoff_multiplier
            )));
        }
        if let Some(max) = self.max_delay {
            if max < self.initial_delay {
                return Err(ConfigError::Invalid(format!(
                    "max_delay ({max:?}) must not be below initial_delay ({:?})",
                    self.initial_delay
                )));
            }
        }
        Ok(())
    }

    /// The delay that follows `current`, capped by `max_delay`.
    ///
    /// A product too large for [`Duration`] saturates to `Duration::MAX`
    /// before the cap applies.
    pub fn next_delay(&self, current: Duration) -> Duration {
        let next = Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff_multiplier)
            .unwrap_or(Duration::MAX);
        match self.max_delay {
            Some(max) => next.min(max),
            None => next,
        }
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the acquired text is handed to the summarization model.
///
/// The two strategies are not equivalent: chunking summarises each slice in
/// isolation and concatenates the results, which loses cross-section context
/// but fits models with small input windows.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChunkStrategy {
    /// Submit the whole text in one call. (default)
    #[default]
    WholeText,
    /// Split into chunks of at most `chunk_chars` characters, summarise each,
    /// join the partial summaries.
    Chunked { chunk_chars: usize },
}

/// Character budget applied before summarisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Truncation {
    /// Keep all text. (default)
    #[default]
    None,
    /// Keep at most this many characters.
    MaxChars(usize),
}

/// OCR engine for pages that carry no embedded text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OcrBackend {
    /// Local `tesseract` binary with the given language pack(s), e.g. "eng" or "eng+deu".
    Tesseract { language: String },
    /// Transcribe the rendered page with the configured vision LLM.
    Vision,
    /// Never OCR; textless pages contribute nothing.
    Disabled,
}

impl Default for OcrBackend {
    fn default() -> Self {
        OcrBackend::Tesseract {
            language: "eng".to_string(),
        }
    }
}

/// Specifies which pages of the PDF to read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSelection {
    /// All pages (default).
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

/// Page-boundary marker in the acquired text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSeparator {
    /// A single newline. (default)
    #[default]
    Newline,
    /// A blank line between pages.
    BlankLine,
    /// Form feed, the traditional page break in plain text.
    FormFeed,
    /// Custom string placed between pages.
    Custom(String),
}

impl PageSeparator {
    pub fn as_str(&self) -> &str {
        match self {
            PageSeparator::Newline => "\n",
            PageSeparator::BlankLine => "\n\n",
            PageSeparator::FormFeed => "\n\u{000C}\n",
            PageSeparator::Custom(s) => s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build() {
        let config = SummaryConfig::builder().build().expect("defaults are valid");
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.chunking, ChunkStrategy::WholeText);
        assert_eq!(config.truncation, Truncation::None);
    }

    #[test]
    fn zero_attempts_rejected() {
        let err = SummaryConfig::builder().max_attempts(0).build().unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn zero_initial_delay_rejected() {
        let err = SummaryConfig::builder()
            .initial_delay(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("initial_delay"));
    }

    #[test]
    fn multiplier_must_exceed_one() {
        for m in [1.0, 0.5, f64::NAN, f64::INFINITY] {
            assert!(
                SummaryConfig::builder().backoff_multiplier(m).build().is_err(),
                "multiplier {m} should be rejected"
            );
        }
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let result = SummaryConfig::builder()
            .chunking(ChunkStrategy::Chunked { chunk_chars: 0 })
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn next_delay_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_delay: Duration::from_millis(500),
            backoff_multiplier: 3.0,
            max_delay: Some(Duration::from_secs(2)),
        };
        let d1 = policy.next_delay(policy.initial_delay);
        assert_eq!(d1, Duration::from_millis(1500));
        let d2 = policy.next_delay(d1);
        assert_eq!(d2, Duration::from_secs(2));
        assert_eq!(policy.next_delay(d2), Duration::from_secs(2));
    }

    #[test]
    fn next_delay_saturates_instead_of_overflowing() {
        let capped = RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 1e20,
            max_delay: Some(Duration::from_secs(60)),
        };
        assert!(capped.validate().is_ok());
        assert_eq!(
            capped.next_delay(capped.initial_delay),
            Duration::from_secs(60)
        );

        let uncapped = RetryPolicy {
            max_delay: None,
            ..capped
        };
        assert_eq!(uncapped.next_delay(Duration::MAX), Duration::MAX);
    }

    #[test]
    fn page_selection_to_indices() {
        assert_eq!(PageSelection::All.to_indices(5), vec![0, 1, 2, 3, 4]);
        assert_eq!(PageSelection::Single(3).to_indices(5), vec![2]);
        assert_eq!(PageSelection::Single(6).to_indices(5), Vec::<usize>::new());
        assert_eq!(PageSelection::Range(2, 4).to_indices(5), vec![1, 2, 3]);
        assert_eq!(
            PageSelection::Set(vec![3, 1, 3]).to_indices(5),
            vec![0, 2]
        );
    }

    #[test]
    fn separator_strings() {
        assert_eq!(PageSeparator::Newline.as_str(), "\n");
        assert_eq!(PageSeparator::Custom("<hr>".into()).as_str(), "<hr>");
    }
}
