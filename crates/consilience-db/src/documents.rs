//! PostgreSQL document repository. Documents are written with their analysis
//! (see `PgAnalysisRepository::create`) and only read here.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use consilience_core::{
    Document, DocumentMetadata, DocumentRepository, Error, FigureData, Result, TableData,
};

#[derive(Clone)]
pub struct PgDocumentRepository {
    pool: PgPool,
}

impl PgDocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn parse_document_row(row: PgRow) -> Document {
        let tables: Json<Vec<TableData>> = row.get("tables");
        let figures: Json<Vec<FigureData>> = row.get("figures");
        let metadata: Json<DocumentMetadata> = row.get("metadata");
        Document {
            id: row.get("id"),
            analysis_id: row.get("analysis_id"),
            text: row.get("text"),
            tables: tables.0,
            figures: figures.0,
            metadata: metadata.0,
        }
    }
}

#[async_trait]
impl DocumentRepository for PgDocumentRepository {
    async fn list_for_analysis(&self, analysis_id: &str) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT analysis_id, id, text, tables, figures, metadata
             FROM analysis_document
             WHERE analysis_id = $1
             ORDER BY id",
        )
        .bind(analysis_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_document_row).collect())
    }

    async fn fetch(&self, analysis_id: &str, id: &str) -> Result<Document> {
        sqlx::query(
            "SELECT analysis_id, id, text, tables, figures, metadata
             FROM analysis_document
             WHERE analysis_id = $1 AND id = $2",
        )
        .bind(analysis_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .map(Self::parse_document_row)
        .ok_or_else(|| Error::NotFound(format!("document {id} in analysis {analysis_id}")))
    }
}
