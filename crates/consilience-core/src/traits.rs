//! Core traits for consilience abstractions.
//!
//! These traits define the interfaces that storage and inference backends
//! must satisfy, so the orchestrator can run against Postgres, the in-memory
//! store, or a scripted test backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::*;

// =============================================================================
// ANALYSIS REPOSITORY
// =============================================================================

/// Repository for analysis records.
#[async_trait]
pub trait AnalysisRepository: Send + Sync {
    /// Insert an analysis and all of its documents atomically.
    async fn create(&self, new: NewAnalysis) -> Result<Analysis>;

    /// Fetch an analysis by id. Fails with `Error::AnalysisNotFound`.
    async fn fetch(&self, id: &str) -> Result<Analysis>;

    /// Conditionally move an analysis into `processing`.
    ///
    /// The update applies only when the analysis is not `complete` and its
    /// `last_attempt_at` still equals `expected_last_attempt`. On success it
    /// stamps `last_attempt_at = now`, sets `status = processing` and clears
    /// `error_message`. Returns whether this caller won the update.
    async fn begin_attempt(
        &self,
        id: &str,
        expected_last_attempt: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Persist a successful result and mark the analysis `complete`.
    ///
    /// Applies only while the analysis is still `processing` under `stamp`,
    /// the `now` passed to the winning [`begin_attempt`](Self::begin_attempt).
    /// Returns `false` when another writer got there first; nothing changes then.
    async fn complete(
        &self,
        id: &str,
        stamp: DateTime<Utc>,
        result: &SynthesisResult,
    ) -> Result<bool>;

    /// Persist a terminal failure and mark the analysis `error`.
    ///
    /// Same ownership rule as [`complete`](Self::complete).
    async fn fail(&self, id: &str, stamp: DateTime<Utc>, message: &str) -> Result<bool>;

    /// Insert or replace a full analysis with its documents. Used for seeding.
    async fn upsert(&self, new: NewAnalysis) -> Result<()>;
}

// =============================================================================
// DOCUMENT REPOSITORY
// =============================================================================

/// Read access to the documents of an analysis. Documents are immutable after ingestion.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// All documents of an analysis, ordered by document id.
    async fn list_for_analysis(&self, analysis_id: &str) -> Result<Vec<Document>>;

    /// A single document. Fails with `Error::NotFound`.
    async fn fetch(&self, analysis_id: &str, id: &str) -> Result<Document>;
}

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for text generation.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text given a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate text with system context.
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Generate with system context, asking the backend to constrain output to JSON.
    ///
    /// Backends without a JSON mode fall back to plain generation; callers
    /// validate the output either way.
    async fn generate_json_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.generate_with_system(system, prompt).await
    }

    /// Check whether the backend is reachable.
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}
