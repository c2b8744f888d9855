//! Synthesis endpoints.
//!
//! Synthesis runs inside the request. The orchestrator bounds the model
//! phase by its run deadline, so the response always reflects the stored
//! terminal state.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use consilience_core::SynthesisResult;
use consilience_synthesis::SynthesisOutcome;

use crate::{ApiError, AppState};

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub analysis_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SynthesisResponse {
    pub success: bool,
    pub result: SynthesisResult,
    /// Present, and true, only when the stored result was returned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
}

impl From<SynthesisOutcome> for SynthesisResponse {
    fn from(outcome: SynthesisOutcome) -> Self {
        let cached = outcome.cached().then_some(true);
        Self {
            success: true,
            result: outcome.into_result(),
            cached,
        }
    }
}

/// Synthesize the analysis named in the body.
///
/// # Returns
/// - 200 OK `{success, result, cached?}`
/// - 400 Bad Request when `analysisId` is missing
/// - 404 Not Found
/// - 429 Too Many Requests `{error, retryAfterSeconds}` inside the cool-down
/// - 500 Internal Server Error `{error, details?}` when synthesis failed or
///   ran past its deadline
#[utoipa::path(post, path = "/api/analyze", tag = "synthesis",
    request_body = AnalyzeRequest,
    responses(
        (status = 200, description = "Synthesis result", body = SynthesisResponse),
        (status = 400, description = "Analysis ID is required"),
        (status = 404, description = "Analysis not found"),
        (status = 429, description = "Inside the cool-down window"),
        (status = 500, description = "Synthesis failed or timed out"),
    ))]
pub async fn analyze(
    State(state): State<AppState>,
    body: Option<Json<AnalyzeRequest>>,
) -> Result<Json<SynthesisResponse>, ApiError> {
    let analysis_id = body
        .and_then(|Json(req)| req.analysis_id)
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Analysis ID is required".to_string()))?;

    run(&state, analysis_id).await
}

/// Synthesize the analysis named in the path.
#[utoipa::path(post, path = "/api/v1/analyses/{id}/synthesize", tag = "synthesis",
    params(("id" = String, Path, description = "Analysis id")),
    responses(
        (status = 200, description = "Synthesis result", body = SynthesisResponse),
        (status = 404, description = "Analysis not found"),
        (status = 429, description = "Inside the cool-down window"),
        (status = 500, description = "Synthesis failed or timed out"),
    ))]
pub async fn synthesize_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SynthesisResponse>, ApiError> {
    run(&state, id).await
}

async fn run(state: &AppState, analysis_id: String) -> Result<Json<SynthesisResponse>, ApiError> {
    let outcome = state.orchestrator.run_synthesis(&analysis_id).await?;

    info!(
        subsystem = "api",
        analysis_id = %analysis_id,
        cached = outcome.cached(),
        "Synthesis served"
    );
    Ok(Json(outcome.into()))
}
