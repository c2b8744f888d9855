//! Analysis ingestion and status polling.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use consilience_core::{Analysis, ExtractedDocument, NewAnalysis, PaperMetadata};

use crate::{ApiError, AppState};

/// Request body for creating an analysis from extracted papers.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAnalysisRequest {
    /// Client-chosen id. A UUIDv7 is generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    /// Two to five extracted papers, in submission order.
    pub papers: Vec<ExtractedDocument>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateAnalysisResponse {
    pub id: String,
    pub papers: Vec<PaperMetadata>,
}

/// Create a pending analysis.
///
/// # Returns
/// - 201 Created with the id and the per-paper summary
/// - 400 Bad Request when the batch has the wrong size or a paper has no title
/// - 409 Conflict when the id is taken
#[utoipa::path(post, path = "/api/v1/analyses", tag = "analyses",
    request_body = CreateAnalysisRequest,
    responses(
        (status = 201, description = "Analysis created", body = CreateAnalysisResponse),
        (status = 400, description = "Invalid batch"),
        (status = 409, description = "Duplicate id"),
    ))]
pub async fn create_analysis(
    State(state): State<AppState>,
    Json(body): Json<CreateAnalysisRequest>,
) -> Result<(StatusCode, Json<CreateAnalysisResponse>), ApiError> {
    let id = match body.id.map(|id| id.trim().to_string()) {
        Some(id) if id.is_empty() => {
            return Err(ApiError::BadRequest("Analysis ID must not be blank".to_string()))
        }
        Some(id) => id,
        None => Uuid::now_v7().to_string(),
    };

    let new = NewAnalysis::from_extracted(id, body.papers, Utc::now())?;
    let created = state.analyses.create(new).await?;

    info!(
        subsystem = "api",
        analysis_id = %created.id,
        document_count = created.papers.len(),
        "Analysis created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateAnalysisResponse {
            id: created.id,
            papers: created.papers,
        }),
    ))
}

/// Fetch an analysis with its status, papers, result and error.
///
/// # Returns
/// - 200 OK with the analysis
/// - 404 Not Found
#[utoipa::path(get, path = "/api/v1/analyses/{id}", tag = "analyses",
    params(("id" = String, Path, description = "Analysis id")),
    responses(
        (status = 200, description = "Analysis", body = Analysis),
        (status = 404, description = "Analysis not found"),
    ))]
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Analysis>, ApiError> {
    let analysis = state.analyses.fetch(&id).await?;
    Ok(Json(analysis))
}
