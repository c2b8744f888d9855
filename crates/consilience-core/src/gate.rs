//! Cache gate: decides whether a synthesis request is served from cache,
//! rejected by the cool-down, or allowed to run.
//!
//! The gate itself is pure. When it says [`Admission::Proceed`] the caller is
//! responsible for the conditional stamp (`AnalysisRepository::begin_attempt`)
//! before any model call is made.
//!
//! Two windows apply. A finished attempt (`pending`/`error`) blocks new ones
//! for `cooldown`. A `processing` stamp blocks for `in_flight` as well, which
//! must cover the longest run the orchestrator allows, so a run is never
//! started while another one can still be talking to the model.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::models::{Analysis, AnalysisStatus, SynthesisResult};

/// Outcome of evaluating the gate for one analysis.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// Analysis is complete; return the stored result.
    Serve(SynthesisResult),
    /// A new attempt may start.
    Proceed,
    /// Last attempt is too recent.
    Reject { retry_after: Duration },
}

/// Windows applied by [`admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateWindows {
    /// Minimum spacing between attempts.
    pub cooldown: Duration,
    /// How long a `processing` stamp keeps the analysis locked.
    pub in_flight: Duration,
}

impl GateWindows {
    /// Window that applies to an analysis in `status`.
    pub fn for_status(&self, status: AnalysisStatus) -> Duration {
        match status {
            AnalysisStatus::Processing => self.cooldown.max(self.in_flight),
            _ => self.cooldown,
        }
    }
}

/// Evaluate the gate at `now`.
///
/// A request arriving exactly at the end of the window is admitted:
/// rejection requires `now - last_attempt_at < window`. A `last_attempt_at`
/// in the future (clock skew) is treated as elapsed zero.
pub fn admit(analysis: &Analysis, now: DateTime<Utc>, windows: GateWindows) -> Admission {
    if analysis.status == AnalysisStatus::Complete {
        if let Some(result) = &analysis.synthesis_result {
            return Admission::Serve(result.clone());
        }
    }

    if let Some(last) = analysis.last_attempt_at {
        let window = windows.for_status(analysis.status);
        let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
        if elapsed < window {
            return Admission::Reject {
                retry_after: window - elapsed,
            };
        }
    }

    Admission::Proceed
}

/// Whole seconds to report to a client, rounded up so a retry never lands early.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs();
    if retry_after.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
