//! Bounded retry with exponential backoff around a [`Summarizer`].
//!
//! ```text
//!   empty text ─────────────────────────────────────▶ EmptyInput
//!   loop:
//!     cancelled? ───────────────────────────────────▶ Cancelled
//!     call (races cancel, optional per-call timeout)
//!       Ok(summary) ────────────────────────────────▶ Summary
//!       Service(e) / timeout ───────────────────────▶ RemoteError
//!       RateLimited, attempts == max ───────────────▶ RateLimitExhausted
//!       RateLimited ─▶ sleep(delay) (races cancel) ─▶ delay = next_delay(delay)
//! ```
//!
//! Only rate limits are retried. The wait before retry `k` is
//! `initial_delay * multiplier^(k-1)`, capped by `max_delay`, and never
//! shorter than a wait the server asked for.

use crate::config::RetryPolicy;
use crate::error::{RemoteError, SummaryFailure};
use crate::output::Summary;
use crate::pipeline::llm::{within, Summarizer};
use crate::progress::ProgressCallback;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Progress of one retry loop. Created per request, dropped on exit.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryState {
    /// Attempts started so far.
    pub attempt: u32,
    /// Wait to use after the next rate limit. Never decreases.
    pub delay: Duration,
    pub max_attempts: u32,
}

impl RetryState {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            attempt: 0,
            delay: policy.initial_delay,
            max_attempts: policy.max_attempts,
        }
    }

    /// Whether the attempt just made was the last one allowed.
    pub fn exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    /// Move to the next delay after a wait.
    pub fn advance(&mut self, policy: &RetryPolicy) {
        self.delay = policy.next_delay(self.delay).max(self.delay);
    }
}

/// Drives a [`Summarizer`] until it succeeds, fails terminally, runs out of
/// attempts, or is cancelled.
pub struct SummaryRetrier {
    summarizer: Arc<dyn Summarizer>,
    policy: RetryPolicy,
    call_timeout: Option<Duration>,
    progress: Option<ProgressCallback>,
}

impl SummaryRetrier {
    pub fn new(summarizer: Arc<dyn Summarizer>, policy: RetryPolicy) -> Self {
        Self {
            summarizer,
            policy,
            call_timeout: None,
            progress: None,
        }
    }

    /// Give up on a single call after `timeout`. Not retried.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn with_progress(mut self, cb: ProgressCallback) -> Self {
        self.progress = Some(cb);
        self
    }

    /// Summarise `text`, retrying rate limits per the policy.
    pub async fn run(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<Summary, SummaryFailure> {
        if text.trim().is_empty() {
            return Err(SummaryFailure::EmptyInput);
        }

        let mut state = RetryState::new(&self.policy);
        let max_attempts = state.max_attempts;

        loop {
            if cancel.is_cancelled() {
                info!("Summarization cancelled after {} attempt(s)", state.attempt);
                return Err(SummaryFailure::Cancelled {
                    attempts: state.attempt,
                });
            }

            state.attempt += 1;
            let attempts = state.attempt;
            debug!("Summary attempt {}/{}", attempts, max_attempts);
            if let Some(ref cb) = self.progress {
                cb.on_summary_attempt(attempts, max_attempts);
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Summarization cancelled during attempt {}", attempts);
                    return Err(SummaryFailure::Cancelled { attempts });
                }
                r = self.call(text) => r,
            };

            let retry_after = match outcome {
                Ok(summary) => {
                    info!(
                        "Summary produced after {} attempt(s): {} chars",
                        attempts,
                        summary.chars().count()
                    );
                    if let Some(ref cb) = self.progress {
                        cb.on_summary_complete(summary.chars().count());
                    }
                    return Ok(Summary {
                        text: summary,
                        attempts,
                    });
                }
                Err(RemoteError::Service(detail)) => {
                    warn!("Summary attempt {} failed: {}", attempts, detail);
                    return Err(SummaryFailure::RemoteError { detail });
                }
                Err(RemoteError::RateLimited {
                    detail,
                    retry_after,
                }) => {
                    if state.exhausted() {
                        warn!(
                            "Rate limited on final attempt {}/{}: {}",
                            attempts, max_attempts, detail
                        );
                        return Err(SummaryFailure::RateLimitExhausted { attempts });
                    }
                    debug!("Rate limited: {}", detail);
                    retry_after
                }
            };

            let wait = retry_after.map_or(state.delay, |hint| hint.max(state.delay));
            warn!(
                "Rate limited on attempt {}/{}, retrying in {:?}",
                attempts, max_attempts, wait
            );
            if let Some(ref cb) = self.progress {
                cb.on_retry(attempts, wait);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Summarization cancelled while backing off");
                    return Err(SummaryFailure::Cancelled { attempts });
                }
                _ = tokio::time::sleep(wait) => {}
            }

            state.advance(&self.policy);
        }
    }

    async fn call(&self, text: &str) -> Result<String, RemoteError> {
        within(self.call_timeout, self.summarizer.summarize(text)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SummaryProgressCallback;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Plays back a script of outcomes; `None` means "never answer".
    struct Scripted {
        script: Mutex<VecDeque<Option<Result<String, RemoteError>>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(script: Vec<Option<Result<String, RemoteError>>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Summarizer for Scripted {
        async fn summarize(&self, _text: &str) -> Result<String, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Some(outcome)) => outcome,
                Some(None) => std::future::pending().await,
                None => Err(RemoteError::RateLimited {
                    detail: "429".into(),
                    retry_after: None,
                }),
            }
        }
    }

    fn limited() -> Option<Result<String, RemoteError>> {
        Some(Err(RemoteError::RateLimited {
            detail: "429 Too Many Requests".into(),
            retry_after: None,
        }))
    }

    fn ok(s: &str) -> Option<Result<String, RemoteError>> {
        Some(Ok(s.to_string()))
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_delay: None,
        }
    }

    #[derive(Default)]
    struct Delays(Mutex<Vec<(u32, Duration)>>);

    impl SummaryProgressCallback for Delays {
        fn on_retry(&self, attempt: u32, delay: Duration) {
            self.0.lock().unwrap().push((attempt, delay));
        }
    }

    #[test]
    fn retry_state_delay_never_decreases() {
        let capped = RetryPolicy {
            max_delay: Some(Duration::from_secs(3)),
            ..policy(5)
        };
        let mut state = RetryState::new(&capped);
        let mut seen = vec![state.delay];
        for _ in 0..4 {
            state.advance(&capped);
            seen.push(state.delay);
        }
        assert_eq!(
            seen,
            [1, 2, 3, 3, 3].map(Duration::from_secs).to_vec()
        );
        assert!(!state.exhausted());
        state.attempt = 5;
        assert!(state.exhausted());
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limits_then_success_backs_off_exponentially() {
        let fake = Scripted::new(vec![limited(), limited(), ok("the gist")]);
        let delays = Arc::new(Delays::default());
        let retrier = SummaryRetrier::new(fake.clone(), policy(3)).with_progress(delays.clone());

        let start = Instant::now();
        let summary = retrier.run("some text", &CancellationToken::new()).await.unwrap();

        assert_eq!(summary.text, "the gist");
        assert_eq!(summary.attempts, 3);
        assert_eq!(fake.calls(), 3);
        assert_eq!(
            *delays.0.lock().unwrap(),
            vec![(1, Duration::from_secs(1)), (2, Duration::from_secs(2))]
        );
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_rate_limit_exhausts_attempts() {
        let fake = Scripted::new(vec![limited(), limited(), limited()]);
        let retrier = SummaryRetrier::new(fake.clone(), policy(2));

        let err = retrier.run("text", &CancellationToken::new()).await.unwrap_err();

        assert_eq!(err, SummaryFailure::RateLimitExhausted { attempts: 2 });
        assert_eq!(fake.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_does_not_sleep() {
        let fake = Scripted::new(vec![limited()]);
        let retrier = SummaryRetrier::new(fake.clone(), policy(1));

        let start = Instant::now();
        let err = retrier.run("text", &CancellationToken::new()).await.unwrap_err();

        assert_eq!(err, SummaryFailure::RateLimitExhausted { attempts: 1 });
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn service_error_is_terminal() {
        let fake = Scripted::new(vec![
            Some(Err(RemoteError::Service("401 Unauthorized".into()))),
            ok("never reached"),
        ]);
        let retrier = SummaryRetrier::new(fake.clone(), policy(5));

        let err = retrier.run("text", &CancellationToken::new()).await.unwrap_err();

        assert_eq!(
            err,
            SummaryFailure::RemoteError {
                detail: "401 Unauthorized".into()
            }
        );
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test]
    async fn empty_input_never_calls_remote() {
        let fake = Scripted::new(vec![ok("x")]);
        let retrier = SummaryRetrier::new(fake.clone(), policy(3));

        for text in ["", "   \n\t"] {
            let err = retrier.run(text, &CancellationToken::new()).await.unwrap_err();
            assert_eq!(err, SummaryFailure::EmptyInput);
        }
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let fake = Scripted::new(vec![ok("x")]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = SummaryRetrier::new(fake.clone(), policy(3))
            .run("text", &cancel)
            .await
            .unwrap_err();

        assert_eq!(err, SummaryFailure::Cancelled { attempts: 0 });
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_call_stops_loop() {
        let fake = Scripted::new(vec![None, ok("too late")]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        let err = SummaryRetrier::new(fake.clone(), policy(3))
            .run("text", &cancel)
            .await
            .unwrap_err();

        assert_eq!(err, SummaryFailure::Cancelled { attempts: 1 });
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_backoff_skips_remaining_attempts() {
        let fake = Scripted::new(vec![limited(), ok("too late")]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });

        let err = SummaryRetrier::new(fake.clone(), policy(3))
            .run("text", &cancel)
            .await
            .unwrap_err();

        assert_eq!(err, SummaryFailure::Cancelled { attempts: 1 });
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn server_hint_lengthens_wait() {
        let fake = Scripted::new(vec![
            Some(Err(RemoteError::RateLimited {
                detail: "try again in 7s".into(),
                retry_after: Some(Duration::from_secs(7)),
            })),
            ok("done"),
        ]);
        let delays = Arc::new(Delays::default());
        let summary = SummaryRetrier::new(fake, policy(3))
            .with_progress(delays.clone())
            .run("text", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.attempts, 2);
        assert_eq!(*delays.0.lock().unwrap(), vec![(1, Duration::from_secs(7))]);
    }

    #[tokio::test(start_paused = true)]
    async fn max_delay_caps_backoff() {
        let fake = Scripted::new(vec![limited(), limited(), limited(), ok("done")]);
        let delays = Arc::new(Delays::default());
        let capped = RetryPolicy {
            max_delay: Some(Duration::from_millis(1500)),
            ..policy(4)
        };
        SummaryRetrier::new(fake, capped)
            .with_progress(delays.clone())
            .run("text", &CancellationToken::new())
            .await
            .unwrap();

        let waits: Vec<Duration> = delays.0.lock().unwrap().iter().map(|(_, d)| *d).collect();
        assert_eq!(
            waits,
            vec![
                Duration::from_secs(1),
                Duration::from_millis(1500),
                Duration::from_millis(1500)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn huge_multiplier_is_capped_not_a_panic() {
        let fake = Scripted::new(vec![limited(), limited(), ok("done")]);
        let delays = Arc::new(Delays::default());
        let steep = RetryPolicy {
            backoff_multiplier: 1e20,
            max_delay: Some(Duration::from_secs(60)),
            ..policy(3)
        };
        let summary = SummaryRetrier::new(fake, steep)
            .with_progress(delays.clone())
            .run("text", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.attempts, 3);
        assert_eq!(
            *delays.0.lock().unwrap(),
            vec![(1, Duration::from_secs(1)), (2, Duration::from_secs(60))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn call_timeout_is_terminal() {
        let fake = Scripted::new(vec![None, ok("never")]);
        let err = SummaryRetrier::new(fake.clone(), policy(3))
            .with_call_timeout(Duration::from_secs(2))
            .run("text", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, SummaryFailure::RemoteError { ref detail } if detail.contains("2s")));
        assert_eq!(fake.calls(), 1);
    }
}
