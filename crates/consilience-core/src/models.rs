//! Core data models for consilience.
//!
//! Shared across every consilience crate. Wire names follow two conventions:
//! records owned by the service (`Analysis`, `Document`) serialize camelCase,
//! while everything produced by a model (`SynthesisResult`, `ExtractedDocument`)
//! keeps the snake_case field names the prompts ask for.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::{Error, Result};

// =============================================================================
// DOCUMENT TYPES
// =============================================================================

/// A table extracted from a paper, rendered as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, utoipa::ToSchema)]
pub struct TableData {
    pub caption: String,
    pub content: String,
}

/// A figure extracted from a paper, described in prose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, utoipa::ToSchema)]
pub struct FigureData {
    pub caption: String,
    pub description: String,
}

/// Bibliographic metadata of a paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, utoipa::ToSchema)]
pub struct DocumentMetadata {
    pub title: String,
    /// Author names, in the order they appear on the paper.
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
}

/// One submitted paper after extraction. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Paper id, unique within its analysis (`p1`, `p2`, ...).
    pub id: String,
    pub analysis_id: String,
    pub text: String,
    pub tables: Vec<TableData>,
    pub figures: Vec<FigureData>,
    pub metadata: DocumentMetadata,
}

/// Output shape of the upstream extraction step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, utoipa::ToSchema)]
pub struct ExtractedDocument {
    pub metadata: DocumentMetadata,
    #[serde(alias = "text")]
    pub full_text: String,
    #[serde(default)]
    pub tables: Vec<TableData>,
    #[serde(default)]
    pub figures: Vec<FigureData>,
    #[serde(default)]
    pub key_findings: Vec<String>,
}

impl ExtractedDocument {
    /// Parse the raw reply of an extraction model, which may wrap its JSON in prose.
    pub fn from_model_output(raw: &str) -> Result<Self> {
        let span = crate::validator::find_json_object(raw).ok_or_else(|| {
            Error::InvalidInput("extraction output contains no JSON object".to_string())
        })?;
        Ok(serde_json::from_str(span)?)
    }

    /// Turn this extraction into a stored document, truncating text to `cap` characters.
    pub fn into_document(self, analysis_id: &str, paper_id: String, cap: usize) -> Document {
        Document {
            id: paper_id,
            analysis_id: analysis_id.to_string(),
            text: truncate_chars(&self.full_text, cap).to_string(),
            tables: self.tables,
            figures: self.figures,
            metadata: self.metadata,
        }
    }
}

/// Return the longest prefix of `s` holding at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// =============================================================================
// ANALYSIS TYPES
// =============================================================================

/// Lifecycle of an analysis.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    #[default]
    Pending,
    Processing,
    Complete,
    Error,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Processing => "processing",
            AnalysisStatus::Complete => "complete",
            AnalysisStatus::Error => "error",
        }
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(AnalysisStatus::Pending),
            "processing" => Ok(AnalysisStatus::Processing),
            "complete" => Ok(AnalysisStatus::Complete),
            "error" => Ok(AnalysisStatus::Error),
            other => Err(Error::Serialization(format!(
                "unknown analysis status: {other}"
            ))),
        }
    }
}

/// Denormalized per-paper summary stored on the analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PaperMetadata {
    pub paper_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    pub text_length: usize,
}

impl From<&Document> for PaperMetadata {
    fn from(doc: &Document) -> Self {
        Self {
            paper_id: doc.id.clone(),
            title: doc.metadata.title.clone(),
            authors: doc.metadata.authors.clone(),
            year: doc.metadata.year,
            doi: doc.metadata.doi.clone(),
            text_length: doc.text.chars().count(),
        }
    }
}

/// One synthesis job over a batch of documents.
///
/// `synthesis_result` is set iff `status == Complete`; `error_message` is set
/// iff `status == Error`. Storage implementations maintain both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub id: String,
    pub status: AnalysisStatus,
    pub papers: Vec<PaperMetadata>,
    pub synthesis_result: Option<SynthesisResult>,
    pub error_message: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A validated analysis batch ready to be written: the analysis row plus its documents.
#[derive(Debug, Clone)]
pub struct NewAnalysis {
    pub analysis: Analysis,
    pub documents: Vec<Document>,
}

impl NewAnalysis {
    /// Build a pending analysis from 2 to 5 extracted documents.
    ///
    /// Papers are numbered `p1..pN` in submission order and their text is
    /// capped at [`defaults::DOCUMENT_TEXT_CAP`] characters.
    pub fn from_extracted(
        id: String,
        extracted: Vec<ExtractedDocument>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let n = extracted.len();
        if !(defaults::MIN_PAPERS_PER_ANALYSIS..=defaults::MAX_PAPERS_PER_ANALYSIS).contains(&n) {
            return Err(Error::InvalidInput(format!(
                "an analysis needs between {} and {} papers, got {n}",
                defaults::MIN_PAPERS_PER_ANALYSIS,
                defaults::MAX_PAPERS_PER_ANALYSIS
            )));
        }
        if let Some(blank) = extracted
            .iter()
            .position(|d| d.metadata.title.trim().is_empty())
        {
            return Err(Error::InvalidInput(format!(
                "paper {} has an empty title",
                blank + 1
            )));
        }

        let documents: Vec<Document> = extracted
            .into_iter()
            .enumerate()
            .map(|(i, doc)| doc.into_document(&id, format!("p{}", i + 1), defaults::DOCUMENT_TEXT_CAP))
            .collect();

        let analysis = Analysis {
            id,
            status: AnalysisStatus::Pending,
            papers: documents.iter().map(PaperMetadata::from).collect(),
            synthesis_result: None,
            error_message: None,
            last_attempt_at: None,
            created_at: now,
        };

        Ok(Self {
            analysis,
            documents,
        })
    }
}

// =============================================================================
// SYNTHESIS RESULT
// =============================================================================

/// Strength of the evidence behind an agreed finding.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceStrength {
    Strong,
    Moderate,
    Weak,
}

/// Reported effect size of a claim.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum EffectSize {
    Large,
    Medium,
    Small,
    #[serde(rename = "null")]
    NullEffect,
}

/// A finding two or more papers agree on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, utoipa::ToSchema)]
pub struct AgreedFinding {
    pub claim: String,
    pub supporting_papers: Vec<String>,
    #[schemars(range(min = 0.0, max = 1.0))]
    pub confidence: f64,
    pub evidence_strength: EvidenceStrength,
}

/// One side of a contradiction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, utoipa::ToSchema)]
pub struct Claim {
    pub paper_id: String,
    pub finding: String,
    pub effect_size: EffectSize,
    /// Free text, e.g. `p<0.05` or `NS`.
    pub p_value: String,
}

/// Opposing claims from two papers on the same outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, utoipa::ToSchema)]
pub struct Contradiction {
    pub id: String,
    pub outcome_measured: String,
    pub paper_a_claim: Claim,
    pub paper_b_claim: Claim,
    pub root_cause_analysis: String,
    pub resolution: String,
    #[schemars(range(min = 0.0, max = 1.0))]
    pub confidence_in_resolution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, utoipa::ToSchema)]
pub struct StudyType {
    #[serde(rename = "type")]
    pub study_type: String,
    pub count: u32,
    #[schemars(range(min = 0.0, max = 1.0))]
    pub avg_quality: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, utoipa::ToSchema)]
pub struct MethodologyComparison {
    pub study_types: Vec<StudyType>,
    pub risk_of_bias: Vec<String>,
}

/// Validated output of the synthesis model. Immutable once attached to an analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, utoipa::ToSchema)]
pub struct SynthesisResult {
    /// Echo of the analysis id, when the model provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthesis_id: Option<String>,
    pub topic: String,
    pub papers_analyzed: u32,
    pub agreed_findings: Vec<AgreedFinding>,
    pub contradictions: Vec<Contradiction>,
    pub methodology_comparison: MethodologyComparison,
    pub evidence_gaps: Vec<String>,
    #[schemars(range(min = 0.0, max = 1.0))]
    pub synthesis_confidence: f64,
    pub key_recommendation: String,
    pub uncertainty_flags: Vec<String>,
}

impl SynthesisResult {
    /// Every paper id referenced by findings and contradictions, deduplicated, in first-seen order.
    pub fn referenced_paper_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        let findings = self
            .agreed_findings
            .iter()
            .flat_map(|f| f.supporting_papers.iter().map(String::as_str));
        let claims = self.contradictions.iter().flat_map(|c| {
            [c.paper_a_claim.paper_id.as_str(), c.paper_b_claim.paper_id.as_str()]
        });
        for id in findings.chain(claims) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extracted(title: &str, text: &str) -> ExtractedDocument {
        ExtractedDocument {
            metadata: DocumentMetadata {
                title: title.to_string(),
                authors: vec!["Smith, J.".to_string()],
                year: Some(2021),
                keywords: vec![],
                doi: None,
            },
            full_text: text.to_string(),
            tables: vec![],
            figures: vec![],
            key_findings: vec![],
        }
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            AnalysisStatus::Pending,
            AnalysisStatus::Processing,
            AnalysisStatus::Complete,
            AnalysisStatus::Error,
        ] {
            assert_eq!(status.as_str().parse::<AnalysisStatus>().unwrap(), status);
        }
        assert!("idle".parse::<AnalysisStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&AnalysisStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }

    #[test]
    fn test_effect_size_null_wire_name() {
        let json = serde_json::to_string(&EffectSize::NullEffect).unwrap();
        assert_eq!(json, "\"null\"");
        let parsed: EffectSize = serde_json::from_str("\"null\"").unwrap();
        assert_eq!(parsed, EffectSize::NullEffect);
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_from_extracted_numbers_papers_and_truncates() {
        let long = "x".repeat(defaults::DOCUMENT_TEXT_CAP + 500);
        let new = NewAnalysis::from_extracted(
            "a1".to_string(),
            vec![extracted("First", &long), extracted("Second", "short")],
            Utc::now(),
        )
        .unwrap();

        assert_eq!(new.documents[0].id, "p1");
        assert_eq!(new.documents[1].id, "p2");
        assert_eq!(new.documents[0].text.len(), defaults::DOCUMENT_TEXT_CAP);
        assert_eq!(new.analysis.papers[0].text_length, defaults::DOCUMENT_TEXT_CAP);
        assert_eq!(new.analysis.papers[1].text_length, 5);
        assert_eq!(new.analysis.status, AnalysisStatus::Pending);
        assert!(new.documents.iter().all(|d| d.analysis_id == "a1"));
    }

    #[test]
    fn test_from_extracted_rejects_batch_sizes_outside_bounds() {
        let one = vec![extracted("Only", "text")];
        assert!(matches!(
            NewAnalysis::from_extracted("a".into(), one, Utc::now()),
            Err(Error::InvalidInput(_))
        ));

        let six = (0..6).map(|i| extracted(&format!("T{i}"), "t")).collect();
        assert!(matches!(
            NewAnalysis::from_extracted("a".into(), six, Utc::now()),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_from_extracted_rejects_blank_title() {
        let docs = vec![extracted("Fine", "t"), extracted("  ", "t")];
        let err = NewAnalysis::from_extracted("a".into(), docs, Utc::now()).unwrap_err();
        assert!(err.to_string().contains("paper 2"));
    }

    #[test]
    fn test_extracted_document_from_model_output() {
        let raw = r#"Here is the extraction:
```json
{"metadata": {"title": "Caffeine {and} focus", "authors": ["Doe, A."], "year": 2020, "keywords": ["caffeine"]},
 "full_text": "Body text",
 "tables": [{"caption": "Table 1", "content": "| a | b |"}],
 "figures": [],
 "key_findings": ["Faster reaction time"]}
```
Let me know if you need more."#;

        let doc = ExtractedDocument::from_model_output(raw).unwrap();
        assert_eq!(doc.metadata.title, "Caffeine {and} focus");
        assert_eq!(doc.full_text, "Body text");
        assert_eq!(doc.tables.len(), 1);
        assert_eq!(doc.key_findings, vec!["Faster reaction time".to_string()]);
    }

    #[test]
    fn test_extracted_document_accepts_text_alias() {
        let doc: ExtractedDocument =
            serde_json::from_str(r#"{"metadata": {"title": "T"}, "text": "body"}"#).unwrap();
        assert_eq!(doc.full_text, "body");
        assert!(doc.metadata.authors.is_empty());
        assert_eq!(doc.metadata.year, None);
    }

    #[test]
    fn test_extracted_document_without_json_is_invalid_input() {
        let err = ExtractedDocument::from_model_output("sorry, I cannot read this PDF").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_analysis_serializes_camel_case() {
        let analysis = Analysis {
            id: "a1".to_string(),
            status: AnalysisStatus::Error,
            papers: vec![],
            synthesis_result: None,
            error_message: Some("boom".to_string()),
            last_attempt_at: None,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&analysis).unwrap();
        assert_eq!(value["errorMessage"], "boom");
        assert!(value.get("synthesisResult").is_some());
        assert!(value.get("lastAttemptAt").is_some());
    }

    #[test]
    fn test_referenced_paper_ids_dedups_in_order() {
        let result = crate::demo::caffeine_result();
        assert_eq!(result.referenced_paper_ids(), vec!["p1", "p2", "p3"]);
    }
}
