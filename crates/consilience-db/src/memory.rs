//! In-process storage backend.
//!
//! Implements the same repository traits as the Postgres backend, with every
//! operation taken under a single mutex so `begin_attempt` is an atomic
//! compare-and-set. Used for `STORAGE_BACKEND=memory` and throughout tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use consilience_core::{
    Analysis, AnalysisRepository, AnalysisStatus, Document, DocumentRepository, Error,
    NewAnalysis, Result, SynthesisResult,
};

#[derive(Debug, Clone)]
struct Entry {
    analysis: Analysis,
    documents: Vec<Document>,
}

/// Shared in-memory store. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Internal("in-memory store lock poisoned".to_string()))
    }

    fn with_analysis<T>(&self, id: &str, f: impl FnOnce(&mut Analysis) -> T) -> Result<T> {
        let mut entries = self.lock()?;
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| Error::AnalysisNotFound(id.to_string()))?;
        Ok(f(&mut entry.analysis))
    }

    /// Number of stored analyses.
    pub fn len(&self) -> usize {
        self.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn owned_by(analysis: &Analysis, stamp: DateTime<Utc>) -> bool {
    analysis.status == AnalysisStatus::Processing && analysis.last_attempt_at == Some(stamp)
}

fn sorted(mut documents: Vec<Document>) -> Vec<Document> {
    documents.sort_by(|a, b| a.id.cmp(&b.id));
    documents
}

fn check_documents_belong(new: &NewAnalysis) -> Result<()> {
    match new
        .documents
        .iter()
        .find(|d| d.analysis_id != new.analysis.id)
    {
        Some(doc) => Err(Error::InvalidInput(format!(
            "document {} belongs to analysis {}, not {}",
            doc.id, doc.analysis_id, new.analysis.id
        ))),
        None => Ok(()),
    }
}

#[async_trait]
impl AnalysisRepository for InMemoryStore {
    async fn create(&self, new: NewAnalysis) -> Result<Analysis> {
        check_documents_belong(&new)?;
        let mut entries = self.lock()?;
        if entries.contains_key(&new.analysis.id) {
            return Err(Error::InvalidInput(format!(
                "analysis {} already exists",
                new.analysis.id
            )));
        }
        let analysis = new.analysis.clone();
        entries.insert(
            new.analysis.id.clone(),
            Entry {
                analysis: new.analysis,
                documents: sorted(new.documents),
            },
        );
        Ok(analysis)
    }

    async fn fetch(&self, id: &str) -> Result<Analysis> {
        self.with_analysis(id, |a| a.clone())
    }

    async fn begin_attempt(
        &self,
        id: &str,
        expected_last_attempt: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let won = self.with_analysis(id, |a| {
            if a.status == AnalysisStatus::Complete || a.last_attempt_at != expected_last_attempt {
                return false;
            }
            a.status = AnalysisStatus::Processing;
            a.last_attempt_at = Some(now);
            a.error_message = None;
            true
        })?;
        debug!(
            subsystem = "db",
            component = "memory_store",
            op = "begin_attempt",
            analysis_id = id,
            won,
            "Attempt stamp"
        );
        Ok(won)
    }

    async fn complete(
        &self,
        id: &str,
        stamp: DateTime<Utc>,
        result: &SynthesisResult,
    ) -> Result<bool> {
        self.with_analysis(id, |a| {
            if !owned_by(a, stamp) {
                return false;
            }
            a.status = AnalysisStatus::Complete;
            a.synthesis_result = Some(result.clone());
            a.error_message = None;
            true
        })
    }

    async fn fail(&self, id: &str, stamp: DateTime<Utc>, message: &str) -> Result<bool> {
        self.with_analysis(id, |a| {
            if !owned_by(a, stamp) {
                return false;
            }
            a.status = AnalysisStatus::Error;
            a.synthesis_result = None;
            a.error_message = Some(message.to_string());
            true
        })
    }

    async fn upsert(&self, new: NewAnalysis) -> Result<()> {
        check_documents_belong(&new)?;
        self.lock()?.insert(
            new.analysis.id.clone(),
            Entry {
                analysis: new.analysis,
                documents: sorted(new.documents),
            },
        );
        Ok(())
    }
}

#[async_trait]
impl DocumentRepository for InMemoryStore {
    async fn list_for_analysis(&self, analysis_id: &str) -> Result<Vec<Document>> {
        Ok(self
            .lock()?
            .get(analysis_id)
            .map(|e| e.documents.clone())
            .unwrap_or_default())
    }

    async fn fetch(&self, analysis_id: &str, id: &str) -> Result<Document> {
        self.lock()?
            .get(analysis_id)
            .and_then(|e| e.documents.iter().find(|d| d.id == id).cloned())
            .ok_or_else(|| Error::NotFound(format!("document {id} in analysis {analysis_id}")))
    }
}
