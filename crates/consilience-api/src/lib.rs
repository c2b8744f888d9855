//! # consilience-api
//!
//! HTTP surface for consilience: ingestion, synthesis, status polling, the
//! evidence graph, and what-if exclusion.

pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use uuid::Uuid;

use consilience_core::{AnalysisRepository, GenerationBackend};
use consilience_synthesis::Orchestrator;

pub use config::{RateLimitConfig, ServerConfig, StorageBackend};
pub use error::ApiError;

/// Largest accepted request body. Five papers of capped text plus tables fit well inside.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Global (unkeyed) request limiter.
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Request ID generator using UUIDv7 (time-ordered).
#[derive(Clone, Copy)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub analyses: Arc<dyn AnalysisRepository>,
    pub orchestrator: Orchestrator,
    pub backend: Arc<dyn GenerationBackend>,
    pub rate_limiter: Option<Arc<GlobalRateLimiter>>,
}

/// Build the global limiter, or `None` when disabled or configured with zeros.
pub fn build_rate_limiter(config: &RateLimitConfig) -> Option<Arc<GlobalRateLimiter>> {
    if !config.enabled {
        return None;
    }
    let burst = NonZeroU32::new(u32::try_from(config.requests).unwrap_or(u32::MAX))?;
    let per_request = config.period.checked_div(burst.get())?;
    let quota = Quota::with_period(per_request)?.allow_burst(burst);
    Some(Arc::new(RateLimiter::direct(quota)))
}

async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    if let Some(limiter) = &state.rate_limiter {
        if limiter.check().is_err() {
            tracing::warn!(subsystem = "api", "Rate limit exceeded");
            return Err((
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": "Too many requests. Please wait before retrying."
                })),
            ));
        }
    }
    Ok(next.run(request).await)
}

/// Health check endpoint.
///
/// # Returns
/// - 200 OK with `{status, version, model}`; `status` is `degraded` when
///   the generation backend fails its health check.
#[utoipa::path(get, path = "/health", tag = "system",
    responses((status = 200, description = "Service health")))]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let status = match state.backend.health_check().await {
        Ok(true) => "healthy",
        _ => "degraded",
    };
    Json(serde_json::json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.backend.model_name(),
    }))
}

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

#[derive(OpenApi)]
#[openapi(
    info(title = "Consilience API", description = "Cross-paper research synthesis"),
    paths(
        health_check,
        handlers::analyses::create_analysis,
        handlers::analyses::get_analysis,
        handlers::synthesis::analyze,
        handlers::synthesis::synthesize_analysis,
        handlers::graph::get_graph,
        handlers::graph::what_if_analysis,
    ),
    components(schemas(
        consilience_core::Analysis,
        consilience_core::AnalysisStatus,
        consilience_core::PaperMetadata,
        consilience_core::ExtractedDocument,
        consilience_core::DocumentMetadata,
        consilience_core::TableData,
        consilience_core::FigureData,
        consilience_core::SynthesisResult,
        consilience_core::EvidenceGraph,
        consilience_core::GraphNode,
        consilience_core::graph::Position,
        consilience_core::GraphEdge,
        consilience_core::EdgeKind,
        consilience_core::WhatIfAnalysis,
        handlers::analyses::CreateAnalysisRequest,
        handlers::analyses::CreateAnalysisResponse,
        handlers::synthesis::AnalyzeRequest,
        handlers::synthesis::SynthesisResponse,
        handlers::graph::WhatIfRequest,
    )),
    tags(
        (name = "analyses", description = "Ingestion and status"),
        (name = "synthesis", description = "Cross-paper synthesis"),
        (name = "graph", description = "Evidence graph and what-if"),
        (name = "system", description = "Health"),
    )
)]
pub struct ApiDoc;

/// Assemble the router with every route and middleware layer.
pub fn router(state: AppState) -> Router {
    use handlers::{analyses, graph, synthesis};

    Router::new()
        .route("/health", get(health_check))
        .route("/openapi.json", get(openapi_json))
        .route("/api/analyze", post(synthesis::analyze))
        .route("/api/v1/analyses", post(analyses::create_analysis))
        .route("/api/v1/analyses/:id", get(analyses::get_analysis))
        .route(
            "/api/v1/analyses/:id/synthesize",
            post(synthesis::synthesize_analysis),
        )
        .route("/api/v1/analyses/:id/graph", get(graph::get_graph))
        .route("/api/v1/analyses/:id/what-if", post(graph::what_if_analysis))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
                .max_age(Duration::from_secs(3600)),
        )
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_disabled() {
        let config = RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::default()
        };
        assert!(build_rate_limiter(&config).is_none());
    }

    #[test]
    fn test_rate_limiter_zero_requests_is_none() {
        let config = RateLimitConfig {
            requests: 0,
            ..RateLimitConfig::default()
        };
        assert!(build_rate_limiter(&config).is_none());
    }

    #[test]
    fn test_rate_limiter_allows_burst_then_rejects() {
        let config = RateLimitConfig {
            enabled: true,
            requests: 2,
            period: Duration::from_secs(60),
        };
        let limiter = build_rate_limiter(&config).unwrap();
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }

    #[test]
    fn test_request_id_is_uuid_v7() {
        let request = axum::http::Request::new(());
        let id = MakeRequestUuidV7.make_request_id(&request).unwrap();
        let parsed = Uuid::parse_str(id.header_value().to_str().unwrap()).unwrap();
        assert_eq!(parsed.get_version_num(), 7);
    }

    #[test]
    fn test_openapi_lists_synthesis_route() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/analyze"));
        assert!(doc.paths.paths.contains_key("/api/v1/analyses/{id}/what-if"));
    }
}
