//! Retrying synthesis client.
//!
//! One [`RetryPolicy`] carries the whole retry contract: attempt budget,
//! per-attempt timeout and linear backoff. [`SynthesisClient`] applies it to
//! a generation backend and a response validator.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, instrument, warn};

use consilience_core::defaults;
use consilience_core::{GenerationBackend, ResponseValidator, SynthesisResult, ValidationError};

/// Attempt budget, timeout and backoff for one synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Never below 1.
    pub max_attempts: u32,
    /// Each generation call is cancelled after this long.
    pub attempt_timeout: Duration,
    /// Wait `backoff_base * n` after failed attempt `n` (1-based).
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::SYNTHESIS_MAX_ATTEMPTS,
            attempt_timeout: Duration::from_secs(defaults::SYNTHESIS_ATTEMPT_TIMEOUT_SECS),
            backoff_base: Duration::from_millis(defaults::SYNTHESIS_BACKOFF_BASE_MS),
        }
    }
}

impl RetryPolicy {
    /// Create a policy from environment variables (with defaults).
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `SYNTHESIS_MAX_ATTEMPTS` | `3` |
    /// | `SYNTHESIS_ATTEMPT_TIMEOUT_SECS` | `60` |
    /// | `SYNTHESIS_BACKOFF_BASE_MS` | `1000` |
    pub fn from_env() -> Self {
        let default = Self::default();
        let max_attempts = std::env::var("SYNTHESIS_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(default.max_attempts);
        let attempt_timeout = std::env::var("SYNTHESIS_ATTEMPT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(default.attempt_timeout);
        let backoff_base = std::env::var("SYNTHESIS_BACKOFF_BASE_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(default.backoff_base);

        Self::default()
            .with_max_attempts(max_attempts)
            .with_attempt_timeout(attempt_timeout)
            .with_backoff_base(backoff_base)
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    pub fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = backoff_base;
        self
    }

    /// Wait after failed attempt `attempt` (1-based).
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        self.backoff_base * attempt
    }

    /// Longest a full retry sequence can take: every attempt timing out,
    /// plus the backoff between attempts.
    pub fn max_run_duration(&self) -> Duration {
        let backoff: Duration = (1..self.max_attempts).map(|n| self.backoff_after(n)).sum();
        self.attempt_timeout * self.max_attempts + backoff
    }
}

/// Why a single attempt failed. The display text is what gets persisted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AttemptError {
    /// The generation call did not finish within the attempt timeout.
    #[error("{}", defaults::TIMEOUT_MESSAGE)]
    Timeout,

    /// The backend returned an error.
    #[error("{0}")]
    Generation(String),

    /// The backend answered but the response was unusable.
    #[error("{0}")]
    Validation(#[from] ValidationError),
}

/// A validated result and how many attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesized {
    pub result: SynthesisResult,
    pub attempts: u32,
}

/// All attempts failed.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{last}")]
pub struct Exhausted {
    pub attempts: u32,
    /// The final attempt's failure.
    pub last: AttemptError,
}

/// Drives the model call under a [`RetryPolicy`].
#[derive(Clone)]
pub struct SynthesisClient {
    backend: Arc<dyn GenerationBackend>,
    validator: Arc<dyn ResponseValidator>,
    policy: RetryPolicy,
}

impl SynthesisClient {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        validator: Arc<dyn ResponseValidator>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            backend,
            validator,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn backend(&self) -> &Arc<dyn GenerationBackend> {
        &self.backend
    }

    /// Run one attempt: generation raced against the timeout, then validation.
    async fn attempt(&self, system: &str, prompt: &str) -> Result<SynthesisResult, AttemptError> {
        let generation = self.backend.generate_json_with_system(system, prompt);
        let raw = match timeout(self.policy.attempt_timeout, generation).await {
            Err(_) => return Err(AttemptError::Timeout),
            Ok(Err(e)) => return Err(AttemptError::Generation(e.to_string())),
            Ok(Ok(raw)) => raw,
        };
        debug!(response_len = raw.len(), "Validating model response");
        Ok(self.validator.validate(&raw)?)
    }

    /// Synthesize with the same prompt on every attempt.
    #[instrument(skip(self, system, prompt), fields(subsystem = "synthesis", component = "retry_client", op = "synthesize", model = self.backend.model_name(), prompt_len = prompt.len()))]
    pub async fn synthesize(&self, system: &str, prompt: &str) -> Result<Synthesized, Exhausted> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let start = Instant::now();
            match self.attempt(system, prompt).await {
                Ok(result) => {
                    info!(
                        attempt,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Synthesis attempt succeeded"
                    );
                    return Ok(Synthesized {
                        result,
                        attempts: attempt,
                    });
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts,
                        duration_ms = start.elapsed().as_millis() as u64,
                        error = %e,
                        "Synthesis attempt failed"
                    );
                    if attempt >= max_attempts {
                        return Err(Exhausted {
                            attempts: attempt,
                            last: e,
                        });
                    }
                    sleep(self.policy.backoff_after(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}
