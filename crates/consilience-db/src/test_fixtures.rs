//! Test fixtures for database integration tests.
//!
//! Each [`TestDatabase`] gets its own schema, with the initial migration
//! applied, and drops it on cleanup.
//!
//! Postgres tests are gated on `DATABASE_URL`: when it is unset,
//! [`TestDatabase::from_env`] returns `Ok(None)` and the test returns early.
//!
//! ```rust,ignore
//! use consilience_db::test_fixtures::TestDatabase;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let Some(test_db) = TestDatabase::from_env().await.unwrap() else {
//!         return;
//!     };
//!     // use test_db.db.analyses ...
//!     test_db.cleanup().await;
//! }
//! ```

use std::time::Duration;

use sqlx::postgres::PgConnectOptions;
use sqlx::PgPool;
use uuid::Uuid;

use consilience_core::{Error, Result};

use crate::{create_pool, create_pool_with_options, Database, PoolConfig};

const INITIAL_MIGRATION: &str = include_str!("../../../migrations/20260101000000_initial.sql");

/// A database handle scoped to a throwaway schema.
pub struct TestDatabase {
    pub db: Database,
    admin: PgPool,
    schema_name: String,
    cleanup_on_drop: bool,
}

impl TestDatabase {
    /// Connect using `DATABASE_URL`, or return `None` when it is unset.
    pub async fn from_env() -> Result<Option<Self>> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            return Ok(None);
        };
        Self::connect(&url).await.map(Some)
    }

    /// Create a fresh schema on `url` and point a new pool at it.
    pub async fn connect(url: &str) -> Result<Self> {
        let config = PoolConfig::default()
            .with_max_connections(5)
            .with_acquire_timeout(Duration::from_secs(10));

        let admin = create_pool(url, config.with_max_connections(1)).await?;
        let schema_name = format!("test_{}", Uuid::now_v7().simple());

        sqlx::query(&format!("CREATE SCHEMA {schema_name}"))
            .execute(&admin)
            .await
            .map_err(Error::Database)?;

        let connect: PgConnectOptions = url.parse().map_err(Error::Database)?;
        let connect = connect.options([("search_path", schema_name.as_str())]);
        let pool = create_pool_with_options(connect, config).await?;

        sqlx::raw_sql(INITIAL_MIGRATION)
            .execute(&pool)
            .await
            .map_err(Error::Database)?;

        Ok(Self {
            db: Database::new(pool),
            admin,
            schema_name,
            cleanup_on_drop: true,
        })
    }

    /// Drop the schema and everything in it.
    pub async fn cleanup(mut self) {
        self.cleanup_on_drop = false;
        self.db.pool.close().await;
        let _ = sqlx::query(&format!(
            "DROP SCHEMA IF EXISTS {} CASCADE",
            self.schema_name
        ))
        .execute(&self.admin)
        .await;
    }
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        if !self.cleanup_on_drop {
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let admin = self.admin.clone();
            let schema = self.schema_name.clone();
            handle.spawn(async move {
                let _ = sqlx::query(&format!("DROP SCHEMA IF EXISTS {schema} CASCADE"))
                    .execute(&admin)
                    .await;
            });
        }
    }
}

