//! # consilience-db
//!
//! Storage for consilience analyses.
//!
//! This crate provides:
//! - Connection pool management
//! - PostgreSQL repositories for analyses and their documents
//! - An in-memory store implementing the same traits
//!
//! ## Example
//!
//! ```rust,ignore
//! use consilience_db::{Database, AnalysisRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/consilience").await?;
//!     let analysis = db.analyses.fetch("demo-caffeine-2024").await?;
//!     println!("{}: {}", analysis.id, analysis.status);
//!     Ok(())
//! }
//! ```

pub mod analyses;
pub mod documents;
pub mod memory;
pub mod pool;
pub mod test_fixtures;

pub use analyses::PgAnalysisRepository;
pub use documents::PgDocumentRepository;
pub use memory::InMemoryStore;
pub use pool::{create_pool, create_pool_with_options, PoolConfig};

// Re-export core traits so callers need only this crate for storage.
pub use consilience_core::{AnalysisRepository, DocumentRepository};

#[cfg(feature = "migrations")]
use consilience_core::Error;
use consilience_core::Result;

/// PostgreSQL-backed repositories sharing one pool.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Analysis records.
    pub analyses: PgAnalysisRepository,
    /// Documents of each analysis.
    pub documents: PgDocumentRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            analyses: PgAnalysisRepository::new(pool.clone()),
            documents: PgDocumentRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect to `url` with pool settings taken from the environment.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url, PoolConfig::from_env()).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
