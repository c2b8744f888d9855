//! Synthesis orchestrator: the analysis state machine.
//!
//! `pending|error -> processing -> complete|error`. Input failures (unknown
//! analysis, no documents, cool-down) return before any write. Once the
//! conditional stamp succeeds, every path ends in `complete` or `error`
//! within `run_deadline`.
//!
//! The terminal write is guarded by the stamp this run took. A run that has
//! been superseded, or that finds the analysis already complete, leaves the
//! stored state alone.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, SubsecRound, Utc};
use tracing::{debug, error, info, instrument, warn};

use consilience_core::defaults;
use consilience_core::gate::retry_after_secs;
use consilience_core::{
    admit, Admission, Analysis, AnalysisRepository, DocumentRepository, Error, GateWindows,
    Result, SynthesisResult,
};

use crate::prompt::{build_prompt, SYSTEM_PROMPT};
use crate::retry::{RetryPolicy, SynthesisClient};

/// What to do when `papers_analyzed` disagrees with the document count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PaperCountPolicy {
    /// Log and accept the result.
    #[default]
    Warn,
    /// Treat the result as a terminal failure.
    Reject,
}

impl FromStr for PaperCountPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "warn" => Ok(Self::Warn),
            "reject" => Ok(Self::Reject),
            other => Err(Error::Config(format!("Invalid paper count policy: {other}"))),
        }
    }
}

impl fmt::Display for PaperCountPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warn => write!(f, "warn"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

/// Orchestrator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisConfig {
    pub retry: RetryPolicy,
    /// Minimum spacing between attempts on one analysis.
    pub cooldown: Duration,
    /// Characters of each paper's text included in the prompt.
    pub text_prefix_chars: usize,
    pub paper_count_policy: PaperCountPolicy,
    /// Upper bound on the model phase of one run. On expiry the analysis is
    /// marked `error` with the timeout message.
    pub run_deadline: Duration,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            cooldown: Duration::from_secs(defaults::SYNTHESIS_COOLDOWN_SECS),
            text_prefix_chars: defaults::SYNTHESIS_TEXT_PREFIX_CHARS,
            paper_count_policy: PaperCountPolicy::default(),
            run_deadline: Duration::from_secs(defaults::SYNTHESIS_REQUEST_DEADLINE_SECS),
        }
    }
}

impl SynthesisConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `SYNTHESIS_COOLDOWN_SECS` | `60` |
    /// | `SYNTHESIS_TEXT_PREFIX_CHARS` | `4000` |
    /// | `SYNTHESIS_PAPER_COUNT_POLICY` | `warn` |
    /// | `SYNTHESIS_REQUEST_DEADLINE_SECS` | `60` |
    ///
    /// Retry settings come from [`RetryPolicy::from_env`].
    pub fn from_env() -> Result<Self> {
        let default = Self::default();
        let cooldown = std::env::var("SYNTHESIS_COOLDOWN_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(default.cooldown);
        let text_prefix_chars = std::env::var("SYNTHESIS_TEXT_PREFIX_CHARS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(default.text_prefix_chars);
        let paper_count_policy = match std::env::var("SYNTHESIS_PAPER_COUNT_POLICY") {
            Ok(v) => v.parse()?,
            Err(_) => default.paper_count_policy,
        };
        let run_deadline = std::env::var("SYNTHESIS_REQUEST_DEADLINE_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(default.run_deadline);

        Ok(Self {
            retry: RetryPolicy::from_env(),
            cooldown,
            text_prefix_chars,
            paper_count_policy,
            run_deadline,
        })
    }

    /// How long a `processing` stamp may belong to a live run.
    pub fn in_flight_window(&self) -> Duration {
        self.retry.max_run_duration().min(self.run_deadline)
    }

    pub fn gate_windows(&self) -> GateWindows {
        GateWindows {
            cooldown: self.cooldown,
            in_flight: self.in_flight_window(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_text_prefix_chars(mut self, chars: usize) -> Self {
        self.text_prefix_chars = chars;
        self
    }

    pub fn with_paper_count_policy(mut self, policy: PaperCountPolicy) -> Self {
        self.paper_count_policy = policy;
        self
    }

    pub fn with_run_deadline(mut self, deadline: Duration) -> Self {
        self.run_deadline = deadline;
        self
    }
}

/// Successful outcome of [`Orchestrator::run_synthesis`].
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisOutcome {
    /// The analysis was already complete.
    Served(SynthesisResult),
    /// A new synthesis ran and was persisted.
    Completed { result: SynthesisResult, attempts: u32 },
}

impl SynthesisOutcome {
    pub fn result(&self) -> &SynthesisResult {
        match self {
            Self::Served(result) | Self::Completed { result, .. } => result,
        }
    }

    pub fn into_result(self) -> SynthesisResult {
        match self {
            Self::Served(result) | Self::Completed { result, .. } => result,
        }
    }

    pub fn cached(&self) -> bool {
        matches!(self, Self::Served(_))
    }
}

enum Acquired {
    Served(SynthesisResult),
    Stamped(DateTime<Utc>),
}

/// Runs synthesis for stored analyses.
#[derive(Clone)]
pub struct Orchestrator {
    analyses: Arc<dyn AnalysisRepository>,
    documents: Arc<dyn DocumentRepository>,
    client: SynthesisClient,
    config: SynthesisConfig,
}

impl Orchestrator {
    pub fn new(
        analyses: Arc<dyn AnalysisRepository>,
        documents: Arc<dyn DocumentRepository>,
        client: SynthesisClient,
        config: SynthesisConfig,
    ) -> Self {
        Self {
            analyses,
            documents,
            client,
            config,
        }
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Run synthesis for `analysis_id` at the current time.
    pub async fn run_synthesis(&self, analysis_id: &str) -> Result<SynthesisOutcome> {
        self.run_synthesis_at(analysis_id, Utc::now()).await
    }

    /// Run synthesis for `analysis_id`, evaluating the cool-down at `now`.
    #[instrument(skip_all, fields(subsystem = "synthesis", component = "orchestrator", op = "run_synthesis", analysis_id = %analysis_id))]
    pub async fn run_synthesis_at(
        &self,
        analysis_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SynthesisOutcome> {
        let start = Instant::now();

        let analysis = self.analyses.fetch(analysis_id).await?;
        let documents = self.documents.list_for_analysis(analysis_id).await?;
        if documents.is_empty() {
            return Err(Error::NoDocuments(analysis_id.to_string()));
        }

        let stamp = match self.acquire(&analysis, now).await? {
            Acquired::Served(result) => return Ok(SynthesisOutcome::Served(result)),
            Acquired::Stamped(stamp) => stamp,
        };

        info!(
            document_count = documents.len(),
            "Synthesis started"
        );

        let prompt = build_prompt(analysis_id, &documents, self.config.text_prefix_chars);
        let synthesis = self.client.synthesize(SYSTEM_PROMPT, &prompt);
        let synthesized = match tokio::time::timeout(self.config.run_deadline, synthesis).await {
            Ok(Ok(s)) => s,
            Ok(Err(exhausted)) => {
                let message = exhausted.to_string();
                self.record_failure(analysis_id, stamp, &message).await?;
                warn!(
                    attempts = exhausted.attempts,
                    duration_ms = start.elapsed().as_millis() as u64,
                    error = %message,
                    "Synthesis failed"
                );
                return Err(Error::Synthesis(message));
            }
            Err(_) => {
                let message = defaults::TIMEOUT_MESSAGE.to_string();
                self.record_failure(analysis_id, stamp, &message).await?;
                warn!(
                    deadline_secs = self.config.run_deadline.as_secs(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Synthesis exceeded run deadline"
                );
                return Err(Error::Synthesis(message));
            }
        };

        let result = synthesized.result;
        if let Err(message) = self.check_paper_count(&result, documents.len()) {
            self.record_failure(analysis_id, stamp, &message).await?;
            return Err(Error::Synthesis(message));
        }
        let unknown: Vec<&str> = result
            .referenced_paper_ids()
            .into_iter()
            .filter(|id| !documents.iter().any(|d| d.id == *id))
            .collect();
        if !unknown.is_empty() {
            warn!(?unknown, "Result references papers outside this analysis");
        }

        match self.analyses.complete(analysis_id, stamp, &result).await {
            Ok(true) => {}
            Ok(false) => warn!(
                attempt_stamp = %stamp,
                "Result not persisted, analysis no longer owned by this run"
            ),
            Err(e) => {
                error!(error = %e, "Failed to persist synthesis result");
                if let Err(e2) = self
                    .record_failure(analysis_id, stamp, defaults::SYNTHESIS_FAILED_MESSAGE)
                    .await
                {
                    error!(error = %e2, "Failed to persist synthesis failure");
                }
                return Err(e);
            }
        }

        info!(
            attempts = synthesized.attempts,
            duration_ms = start.elapsed().as_millis() as u64,
            "Synthesis complete"
        );
        Ok(SynthesisOutcome::Completed {
            result,
            attempts: synthesized.attempts,
        })
    }

    /// Mark the analysis `error`, unless another run or a completion owns it now.
    async fn record_failure(&self, analysis_id: &str, stamp: DateTime<Utc>, message: &str) -> Result<()> {
        if !self.analyses.fail(analysis_id, stamp, message).await? {
            warn!(
                attempt_stamp = %stamp,
                error = %message,
                "Failure not persisted, analysis no longer owned by this run"
            );
        }
        Ok(())
    }

    /// Apply the cache gate and, when it admits, win the conditional stamp.
    ///
    /// A lost stamp re-reads the analysis and re-applies the gate once. The
    /// stamp is truncated to microseconds so it compares equal after a
    /// round trip through Postgres.
    async fn acquire(&self, analysis: &Analysis, now: DateTime<Utc>) -> Result<Acquired> {
        let stamp = now.trunc_subsecs(6);
        let windows = self.config.gate_windows();
        let mut current = analysis.clone();
        for round in 0..2 {
            match admit(&current, now, windows) {
                Admission::Serve(result) => {
                    debug!(cached = true, "Serving stored result");
                    return Ok(Acquired::Served(result));
                }
                Admission::Reject { retry_after } => {
                    let retry_after_secs = retry_after_secs(retry_after);
                    debug!(retry_after_secs, "Inside cool-down");
                    return Err(Error::RateLimited { retry_after_secs });
                }
                Admission::Proceed => {}
            }

            if self
                .analyses
                .begin_attempt(&current.id, current.last_attempt_at, stamp)
                .await?
            {
                return Ok(Acquired::Stamped(stamp));
            }

            debug!(round, "Lost attempt stamp; re-reading analysis");
            current = self.analyses.fetch(&current.id).await?;
        }

        Err(Error::RateLimited {
            retry_after_secs: self.config.cooldown.as_secs(),
        })
    }

    fn check_paper_count(
        &self,
        result: &SynthesisResult,
        expected: usize,
    ) -> std::result::Result<(), String> {
        if result.papers_analyzed as usize == expected {
            return Ok(());
        }
        let message = format!(
            "Model reported {} papers analyzed, expected {}",
            result.papers_analyzed, expected
        );
        match self.config.paper_count_policy {
            PaperCountPolicy::Warn => {
                warn!(
                    papers_analyzed = result.papers_analyzed,
                    expected, "Paper count mismatch"
                );
                Ok(())
            }
            PaperCountPolicy::Reject => Err(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_paper_count_policy() {
        assert_eq!("warn".parse::<PaperCountPolicy>().unwrap(), PaperCountPolicy::Warn);
        assert_eq!("REJECT".parse::<PaperCountPolicy>().unwrap(), PaperCountPolicy::Reject);
        assert!("ignore".parse::<PaperCountPolicy>().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = SynthesisConfig::default();
        assert_eq!(config.cooldown, Duration::from_secs(60));
        assert_eq!(config.text_prefix_chars, 4000);
        assert_eq!(config.paper_count_policy, PaperCountPolicy::Warn);
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.run_deadline, Duration::from_secs(60));
    }

    #[test]
    fn test_in_flight_window_is_shorter_of_deadline_and_retry_budget() {
        let config = SynthesisConfig::default();
        assert_eq!(config.in_flight_window(), Duration::from_secs(60));

        let config = config.with_run_deadline(Duration::from_secs(600));
        assert_eq!(config.in_flight_window(), Duration::from_secs(183));
        assert_eq!(
            config.gate_windows(),
            GateWindows {
                cooldown: Duration::from_secs(60),
                in_flight: Duration::from_secs(183),
            }
        );
    }

    #[test]
    fn test_outcome_accessors() {
        let result = consilience_core::demo::caffeine_result();
        let served = SynthesisOutcome::Served(result.clone());
        assert!(served.cached());
        let completed = SynthesisOutcome::Completed {
            result: result.clone(),
            attempts: 2,
        };
        assert!(!completed.cached());
        assert_eq!(completed.result(), &result);
        assert_eq!(completed.into_result(), result);
    }
}
