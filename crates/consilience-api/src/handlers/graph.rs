//! Evidence graph and what-if exclusion.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use consilience_core::{
    build_graph, what_if, Analysis, AnalysisStatus, EvidenceGraph, SynthesisResult, WhatIfAnalysis,
};

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WhatIfRequest {
    #[serde(default)]
    pub excluded_paper_ids: Vec<String>,
}

async fn completed(state: &AppState, id: &str) -> Result<(Analysis, SynthesisResult), ApiError> {
    let mut analysis = state.analyses.fetch(id).await?;
    match (analysis.status, analysis.synthesis_result.take()) {
        (AnalysisStatus::Complete, Some(result)) => Ok((analysis, result)),
        (status, _) => Err(ApiError::Conflict(format!(
            "Analysis is {status}, graph requires a complete synthesis"
        ))),
    }
}

/// Evidence graph of a completed analysis.
///
/// # Returns
/// - 200 OK with nodes and edges
/// - 404 Not Found
/// - 409 Conflict when the analysis is not complete
#[utoipa::path(get, path = "/api/v1/analyses/{id}/graph", tag = "graph",
    params(("id" = String, Path, description = "Analysis id")),
    responses(
        (status = 200, description = "Evidence graph", body = EvidenceGraph),
        (status = 404, description = "Analysis not found"),
        (status = 409, description = "Analysis not complete"),
    ))]
pub async fn get_graph(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EvidenceGraph>, ApiError> {
    let (analysis, result) = completed(&state, &id).await?;
    Ok(Json(build_graph(&analysis.papers, &result)))
}

/// Recompute the graph with some papers excluded.
///
/// Unknown ids in `excludedPaperIds` are ignored.
#[utoipa::path(post, path = "/api/v1/analyses/{id}/what-if", tag = "graph",
    params(("id" = String, Path, description = "Analysis id")),
    request_body = WhatIfRequest,
    responses(
        (status = 200, description = "Projected graph", body = WhatIfAnalysis),
        (status = 404, description = "Analysis not found"),
        (status = 409, description = "Analysis not complete"),
    ))]
pub async fn what_if_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<WhatIfRequest>,
) -> Result<Json<WhatIfAnalysis>, ApiError> {
    let (analysis, result) = completed(&state, &id).await?;
    Ok(Json(what_if(
        &analysis.papers,
        &result,
        &body.excluded_paper_ids,
    )))
}
