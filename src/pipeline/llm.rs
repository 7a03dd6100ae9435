//! Summarization collaborator: text in, summary out, one remote call.
//!
//! [`Summarizer`] is the seam the retry loop drives. It makes exactly one
//! attempt and classifies any failure as [`RemoteError::RateLimited`]
//! (transient) or [`RemoteError::Service`] (terminal). Retrying is not its
//! job; see [`crate::pipeline::retry`].
//!
//! * [`LlmSummarizer`] talks to an `edgequake-llm` provider.
//! * [`ChunkedSummarizer`] wraps another summarizer, summarises fixed-size
//!   slices of the text one by one and joins the partial summaries. Finished
//!   slices are remembered, so when the retry loop calls it again after a
//!   rate limit it resumes at the slice that failed.

use crate::config::SummaryConfig;
use crate::error::RemoteError;
use crate::pipeline::postprocess;
use crate::prompts::{chunk_request, summary_request, CHUNK_SUMMARY_PROMPT, DEFAULT_SUMMARY_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, LlmError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

/// Produces a summary of a text in a single attempt.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String, RemoteError>;

    /// Summarise slice `index` (0-based) of `total` consecutive slices.
    async fn summarize_excerpt(
        &self,
        text: &str,
        index: usize,
        total: usize,
    ) -> Result<String, RemoteError> {
        let _ = (index, total);
        self.summarize(text).await
    }
}

// ── LLM-backed summarizer ────────────────────────────────────────────────────

/// [`Summarizer`] backed by a chat-completion provider.
pub struct LlmSummarizer {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    temperature: f32,
    max_tokens: usize,
}

impl LlmSummarizer {
    pub fn from_config(provider: Arc<dyn LLMProvider>, config: &SummaryConfig) -> Self {
        Self {
            provider,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SUMMARY_PROMPT.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    async fn complete(&self, system: &str, user: String) -> Result<String, RemoteError> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
        let options = CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| classify_error(&e))?;

        debug!(
            "Summary call: {} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );

        let summary = postprocess::clean_summary(&response.content);
        if summary.is_empty() {
            return Err(RemoteError::Service(
                "model returned an empty summary".to_string(),
            ));
        }
        Ok(summary)
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, text: &str) -> Result<String, RemoteError> {
        self.complete(&self.system_prompt, summary_request(text)).await
    }

    async fn summarize_excerpt(
        &self,
        text: &str,
        index: usize,
        total: usize,
    ) -> Result<String, RemoteError> {
        self.complete(CHUNK_SUMMARY_PROMPT, chunk_request(text, index, total))
            .await
    }
}

// ── Error classification ─────────────────────────────────────────────────────

static RE_RETRY_AFTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:try again in|retry[- ]after:?|retry in)\s*(\d+(?:\.\d+)?)\s*(ms|s|sec|secs|seconds)?\b")
        .expect("static regex")
});

/// `429` in a status position: leading, parenthesised, or after
/// "status"/"HTTP"/"error". A bare 429 inside an id or a count does not match.
static RE_STATUS_429: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|\(|\bstatus(?:\s*code)?\s*[:=]?\s*|\bhttp\s*|\berror:?\s+)429\b")
        .expect("static regex")
});

const RATE_LIMIT_PHRASES: &[&str] = &[
    "rate limit",
    "rate_limit",
    "ratelimit",
    "too many requests",
    "resource_exhausted",
    "quota exceeded",
];

/// Classify a provider error.
///
/// `LlmError::RateLimited` is transient. Untyped API and provider errors
/// carry the HTTP status and body in their message, so those fall back to
/// text matching. Everything else (auth, invalid request, unknown model,
/// network, timeout) is terminal. Billing exhaustion (`insufficient_quota`)
/// looks like a 429 but will not clear by waiting, so it is terminal too.
pub fn classify_error(err: &LlmError) -> RemoteError {
    let detail = err.to_string();
    match err {
        LlmError::RateLimited(message) if !is_billing(message) => RemoteError::RateLimited {
            retry_after: parse_retry_after(message),
            detail,
        },
        LlmError::ApiError(message) | LlmError::ProviderError(message) => {
            classify_message(message, detail)
        }
        _ => RemoteError::Service(detail),
    }
}

fn classify_message(message: &str, detail: String) -> RemoteError {
    let lower = message.to_lowercase();
    if is_billing(&lower) {
        return RemoteError::Service(detail);
    }

    let rate_limited = RE_STATUS_429.is_match(message)
        || RATE_LIMIT_PHRASES.iter().any(|p| lower.contains(p));
    if rate_limited {
        RemoteError::RateLimited {
            retry_after: parse_retry_after(message),
            detail,
        }
    } else {
        RemoteError::Service(detail)
    }
}

fn is_billing(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("insufficient_quota") || lower.contains("billing")
}

/// Extract a server-suggested wait such as "Please try again in 20s".
fn parse_retry_after(message: &str) -> Option<Duration> {
    let caps = RE_RETRY_AFTER.captures(message)?;
    let value: f64 = caps[1].parse().ok()?;
    let secs = match caps.get(2).map(|m| m.as_str().to_lowercase()) {
        Some(unit) if unit == "ms" => value / 1000.0,
        _ => value,
    };
    Duration::try_from_secs_f64(secs).ok()
}

/// Bound one remote call by `limit`. Expiry is a terminal
/// [`RemoteError::Service`].
pub(crate) async fn within<F>(limit: Option<Duration>, call: F) -> Result<String, RemoteError>
where
    F: Future<Output = Result<String, RemoteError>>,
{
    match limit {
        None => call.await,
        Some(limit) => tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
            Err(RemoteError::Service(format!(
                "no response within {}s",
                limit.as_secs_f64()
            )))
        }),
    }
}

// ── Chunked summarizer ───────────────────────────────────────────────────────

/// Summarises text in slices of at most `chunk_chars` characters.
///
/// A single slice is passed straight to [`Summarizer::summarize`]. Several
/// slices each go through [`Summarizer::summarize_excerpt`] and the partial
/// summaries are joined with a blank line. The call timeout bounds each
/// remote call, not the whole pass.
pub struct ChunkedSummarizer {
    inner: Arc<dyn Summarizer>,
    chunk_chars: usize,
    call_timeout: Option<Duration>,
    /// Finished slices keyed by position and text.
    completed: Mutex<HashMap<(usize, String), String>>,
}

impl ChunkedSummarizer {
    pub fn new(inner: Arc<dyn Summarizer>, chunk_chars: usize) -> Self {
        Self {
            inner,
            chunk_chars: chunk_chars.max(1),
            call_timeout: None,
            completed: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    fn remembered(&self, index: usize, chunk: &str) -> Option<String> {
        self.completed
            .lock()
            .ok()
            .and_then(|done| done.get(&(index, chunk.to_string())).cloned())
    }

    fn remember(&self, index: usize, chunk: &str, summary: &str) {
        if let Ok(mut done) = self.completed.lock() {
            done.insert((index, chunk.to_string()), summary.to_string());
        }
    }
}

#[async_trait]
impl Summarizer for ChunkedSummarizer {
    async fn summarize(&self, text: &str) -> Result<String, RemoteError> {
        let chunks = split_chunks(text, self.chunk_chars);
        if chunks.len() <= 1 {
            return within(self.call_timeout, self.inner.summarize(text)).await;
        }

        let total = chunks.len();
        let mut partials = Vec::with_capacity(total);
        for (i, chunk) in chunks.into_iter().enumerate() {
            if let Some(done) = self.remembered(i, chunk) {
                debug!("Chunk {}/{}: reusing earlier summary", i + 1, total);
                partials.push(done);
                continue;
            }
            info!("Summarising chunk {}/{} ({} chars)", i + 1, total, chunk.chars().count());
            let summary =
                within(self.call_timeout, self.inner.summarize_excerpt(chunk, i, total)).await?;
            self.remember(i, chunk, &summary);
            partials.push(summary);
        }
        Ok(partials.join("\n\n"))
    }
}

/// Split `text` into slices of at most `chunk_chars` characters.
///
/// A cut prefers the last whitespace in the back half of the window so words
/// stay whole; a window without one is cut hard. Slices are trimmed and
/// whitespace-only slices are dropped.
pub fn split_chunks(text: &str, chunk_chars: usize) -> Vec<&str> {
    let chunk_chars = chunk_chars.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let end = match rest.char_indices().nth(chunk_chars) {
            None => rest.len(),
            Some((hard, _)) => {
                let window = &rest[..hard];
                match window.rfind(char::is_whitespace) {
                    Some(ws) if window[..ws].chars().count() >= chunk_chars / 2 => {
                        ws + window[ws..].chars().next().map_or(1, char::len_utf8)
                    }
                    _ => hard,
                }
            }
        };
        let (chunk, tail) = rest.split_at(end);
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk);
        }
        rest = tail;
    }
    chunks
}
