//! consilience-api server binary.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use consilience_api::{build_rate_limiter, logging, router, AppState, ServerConfig, StorageBackend};
use consilience_core::{
    demo, AnalysisRepository, DocumentRepository, GenerationBackend, SchemaValidator,
};
use consilience_db::{Database, InMemoryStore};
use consilience_synthesis::{Orchestrator, SynthesisClient};

type Repositories = (Arc<dyn AnalysisRepository>, Arc<dyn DocumentRepository>);

async fn open_storage(config: &ServerConfig) -> anyhow::Result<Repositories> {
    match config.storage {
        StorageBackend::Postgres => {
            let db = Database::connect(&config.database_url).await?;
            db.migrate().await?;
            info!(subsystem = "api", "Connected to PostgreSQL, migrations applied");
            let analyses: Arc<dyn AnalysisRepository> = Arc::new(db.analyses);
            let documents: Arc<dyn DocumentRepository> = Arc::new(db.documents);
            Ok((analyses, documents))
        }
        StorageBackend::Memory => {
            warn!(subsystem = "api", "Using in-memory storage, analyses are lost on restart");
            let store = InMemoryStore::new();
            let analyses: Arc<dyn AnalysisRepository> = Arc::new(store.clone());
            let documents: Arc<dyn DocumentRepository> = Arc::new(store);
            Ok((analyses, documents))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = logging::init_logging();

    let config = ServerConfig::from_env()?;
    info!(
        subsystem = "api",
        version = env!("CARGO_PKG_VERSION"),
        storage = ?config.storage,
        "Starting consilience-api"
    );

    let (analyses, documents) = open_storage(&config).await?;

    if config.seed_demo {
        analyses.upsert(demo::caffeine_analysis(Utc::now())).await?;
        info!(
            subsystem = "api",
            analysis_id = demo::DEMO_ANALYSIS_ID,
            "Seeded demo analysis"
        );
    }

    let backend = consilience_inference::backend_from_env()?;
    info!(subsystem = "api", model = backend.model_name(), "Generation backend ready");

    let client = SynthesisClient::new(
        backend.clone(),
        Arc::new(SchemaValidator),
        config.synthesis.retry,
    );
    let orchestrator = Orchestrator::new(
        analyses.clone(),
        documents,
        client,
        config.synthesis.clone(),
    );

    let rate_limiter = build_rate_limiter(&config.rate_limit);
    if rate_limiter.is_none() {
        info!(subsystem = "api", "Global rate limiting disabled");
    }

    let state = AppState {
        analyses,
        orchestrator,
        backend,
        rate_limiter,
    };

    let addr = config.addr()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}
