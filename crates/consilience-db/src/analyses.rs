//! PostgreSQL analysis repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, instrument};

use consilience_core::{
    Analysis, AnalysisRepository, Document, Error, NewAnalysis, PaperMetadata,
    Result, SynthesisResult,
};

/// PostgreSQL implementation of [`AnalysisRepository`].
#[derive(Clone)]
pub struct PgAnalysisRepository {
    pool: PgPool,
}

impl PgAnalysisRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn parse_analysis_row(row: PgRow) -> Result<Analysis> {
        let status: String = row.get("status");
        let papers: Json<Vec<PaperMetadata>> = row.get("papers");
        let result: Option<Json<SynthesisResult>> = row.get("synthesis_result");
        Ok(Analysis {
            id: row.get("id"),
            status: status.parse()?,
            papers: papers.0,
            synthesis_result: result.map(|r| r.0),
            error_message: row.get("error_message"),
            last_attempt_at: row.get("last_attempt_at"),
            created_at: row.get("created_at"),
        })
    }

    async fn insert_analysis(tx: &mut Transaction<'_, Postgres>, analysis: &Analysis) -> Result<()> {
        sqlx::query(
            "INSERT INTO analysis (id, status, papers, synthesis_result, error_message, last_attempt_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&analysis.id)
        .bind(analysis.status.as_str())
        .bind(Json(&analysis.papers))
        .bind(analysis.synthesis_result.as_ref().map(Json))
        .bind(&analysis.error_message)
        .bind(analysis.last_attempt_at)
        .bind(analysis.created_at)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn insert_documents(
        tx: &mut Transaction<'_, Postgres>,
        documents: &[Document],
    ) -> Result<()> {
        for doc in documents {
            sqlx::query(
                "INSERT INTO analysis_document (analysis_id, id, text, tables, figures, metadata)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(&doc.analysis_id)
            .bind(&doc.id)
            .bind(&doc.text)
            .bind(Json(&doc.tables))
            .bind(Json(&doc.figures))
            .bind(Json(&doc.metadata))
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        }
        Ok(())
    }

    /// Outcome of a stamp-guarded terminal write. Zero rows is a lost write
    /// unless the analysis does not exist at all.
    async fn owned_write(&self, id: &str, rows_affected: u64) -> Result<bool> {
        if rows_affected == 1 {
            return Ok(true);
        }
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM analysis WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        if !exists {
            return Err(Error::AnalysisNotFound(id.to_string()));
        }
        debug!(analysis_id = id, "Terminal write skipped, attempt no longer owned");
        Ok(false)
    }
}

fn check_documents_belong(new: &NewAnalysis) -> Result<()> {
    if let Some(doc) = new
        .documents
        .iter()
        .find(|d| d.analysis_id != new.analysis.id)
    {
        return Err(Error::InvalidInput(format!(
            "document {} belongs to analysis {}, not {}",
            doc.id, doc.analysis_id, new.analysis.id
        )));
    }
    Ok(())
}

#[async_trait]
impl AnalysisRepository for PgAnalysisRepository {
    #[instrument(skip(self, new), fields(subsystem = "db", component = "analyses", op = "create", analysis_id = %new.analysis.id))]
    async fn create(&self, new: NewAnalysis) -> Result<Analysis> {
        check_documents_belong(&new)?;
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        Self::insert_analysis(&mut tx, &new.analysis).await?;
        Self::insert_documents(&mut tx, &new.documents).await?;
        tx.commit().await.map_err(Error::Database)?;

        debug!(document_count = new.documents.len(), "Analysis created");
        Ok(new.analysis)
    }

    async fn fetch(&self, id: &str) -> Result<Analysis> {
        let row = sqlx::query(
            "SELECT id, status, papers, synthesis_result, error_message, last_attempt_at, created_at
             FROM analysis WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::AnalysisNotFound(id.to_string()))?;

        Self::parse_analysis_row(row)
    }

    #[instrument(skip(self), fields(subsystem = "db", component = "analyses", op = "begin_attempt"))]
    async fn begin_attempt(
        &self,
        id: &str,
        expected_last_attempt: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        // Compare-and-set on last_attempt_at: concurrent callers that read the
        // same value race here and exactly one row update succeeds.
        let result = sqlx::query(
            "UPDATE analysis
             SET status = 'processing', last_attempt_at = $3, error_message = NULL
             WHERE id = $1
               AND status <> 'complete'
               AND last_attempt_at IS NOT DISTINCT FROM $2",
        )
        .bind(id)
        .bind(expected_last_attempt)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        let won = result.rows_affected() == 1;
        debug!(won, "Attempt stamp");
        Ok(won)
    }

    #[instrument(skip(self, result), fields(subsystem = "db", component = "analyses", op = "complete"))]
    async fn complete(
        &self,
        id: &str,
        stamp: DateTime<Utc>,
        result: &SynthesisResult,
    ) -> Result<bool> {
        let updated = sqlx::query(
            "UPDATE analysis
             SET status = 'complete', synthesis_result = $3, error_message = NULL
             WHERE id = $1 AND status = 'processing' AND last_attempt_at = $2",
        )
        .bind(id)
        .bind(stamp)
        .bind(Json(result))
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        self.owned_write(id, updated.rows_affected()).await
    }

    #[instrument(skip(self), fields(subsystem = "db", component = "analyses", op = "fail"))]
    async fn fail(&self, id: &str, stamp: DateTime<Utc>, message: &str) -> Result<bool> {
        let updated = sqlx::query(
            "UPDATE analysis
             SET status = 'error', error_message = $3, synthesis_result = NULL
             WHERE id = $1 AND status = 'processing' AND last_attempt_at = $2",
        )
        .bind(id)
        .bind(stamp)
        .bind(message)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        self.owned_write(id, updated.rows_affected()).await
    }

    #[instrument(skip(self, new), fields(subsystem = "db", component = "analyses", op = "upsert", analysis_id = %new.analysis.id))]
    async fn upsert(&self, new: NewAnalysis) -> Result<()> {
        check_documents_belong(&new)?;
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        sqlx::query("DELETE FROM analysis WHERE id = $1")
            .bind(&new.analysis.id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        Self::insert_analysis(&mut tx, &new.analysis).await?;
        Self::insert_documents(&mut tx, &new.documents).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }
}

