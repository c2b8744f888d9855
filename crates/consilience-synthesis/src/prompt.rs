//! Synthesis prompt construction.
//!
//! The prompt is a pure function of the analysis id and its documents:
//! documents are ordered by id, so the same inputs always produce the same
//! text.

use consilience_core::models::truncate_chars;
use consilience_core::Document;

/// System message sent with every synthesis request.
pub const SYSTEM_PROMPT: &str = "You are an extreme-fidelity evidence synthesis engine. \
Analyze the papers using both their textual content and extracted visual data (tables/figures). \
Respond with a single JSON object that follows the output schema exactly.";

/// Marker used when a paper has no tables, figures, keywords or year.
pub const NONE_PROVIDED: &str = "None provided";

const FOCUS: &str = "SPECIAL FOCUS:
- Cross-reference textual claims against data in tables.
- Resolve contradictions by looking at differences in sample size (N), p-values, and effect sizes in Tables.
- Use figure descriptions to understand trends not fully captured in text.";

const RULES: &str = "RULES:
- Refer to papers only by their PAPER_ID values.
- ALWAYS cite specific Tables or Figures when they provide the foundation for a resolution.
- If a paper claims X in text but Table Y shows Z, flag this as an internal contradiction.
- Compare sample sizes (N) explicitly across tables.
- All confidence values are numbers between 0.0 and 1.0.";

/// Build the user prompt for `analysis_id` over `documents`.
///
/// Each paper's text is cut to `text_prefix_chars` characters.
pub fn build_prompt(analysis_id: &str, documents: &[Document], text_prefix_chars: usize) -> String {
    let mut ordered: Vec<&Document> = documents.iter().collect();
    ordered.sort_by(|a, b| a.id.cmp(&b.id));

    let papers = ordered
        .iter()
        .enumerate()
        .map(|(i, doc)| paper_block(i + 1, doc, text_prefix_chars))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{FOCUS}\n\nPAPERS:\n{papers}\n{schema}\n\n{RULES}\n",
        schema = output_schema(analysis_id, ordered.len()),
    )
}

fn paper_block(index: usize, doc: &Document, text_prefix_chars: usize) -> String {
    let meta = &doc.metadata;
    let year = meta
        .year
        .map(|y| y.to_string())
        .unwrap_or_else(|| NONE_PROVIDED.to_string());
    let keywords = or_none(meta.keywords.join(", "));
    let tables = or_none(
        doc.tables
            .iter()
            .map(|t| format!("[{}]: {}", t.caption, t.content))
            .collect::<Vec<_>>()
            .join("\n"),
    );
    let figures = or_none(
        doc.figures
            .iter()
            .map(|f| format!("[{}]: {}", f.caption, f.description))
            .collect::<Vec<_>>()
            .join("\n"),
    );

    format!(
        "--- PAPER {index}: {title} ---\n\
         PAPER_ID: {id}\n\
         AUTHORS: {authors}\n\
         YEAR: {year}\n\
         KEYWORDS: {keywords}\n\
         TEXT: {text}\n\
         TABLES: {tables}\n\
         FIGURES: {figures}\n",
        title = meta.title,
        id = doc.id,
        authors = or_none(meta.authors.join(", ")),
        text = truncate_chars(&doc.text, text_prefix_chars),
    )
}

fn or_none(s: String) -> String {
    if s.trim().is_empty() {
        NONE_PROVIDED.to_string()
    } else {
        s
    }
}

fn output_schema(analysis_id: &str, paper_count: usize) -> String {
    format!(
        r#"OUTPUT SCHEMA:
{{
  "synthesis_id": "{analysis_id}",
  "topic": "exact research question addressed",
  "papers_analyzed": {paper_count},
  "agreed_findings": [
    {{
      "claim": "specific quantitative statement",
      "supporting_papers": ["PAPER_ID values, e.g. p1"],
      "confidence": 0.0-1.0,
      "evidence_strength": "strong" | "moderate" | "weak"
    }}
  ],
  "contradictions": [
    {{
      "id": "c1",
      "outcome_measured": "specific metric (e.g., 'reaction time ms')",
      "paper_a_claim": {{
        "paper_id": "string",
        "finding": "exact claim text backed by table data if available",
        "effect_size": "large" | "medium" | "small" | "null",
        "p_value": "p<0.05 or NS"
      }},
      "paper_b_claim": {{
        "paper_id": "string",
        "finding": "exact claim text backed by table data if available",
        "effect_size": "large" | "medium" | "small" | "null",
        "p_value": "p<0.05 or NS"
      }},
      "root_cause_analysis": "methodological explanation (population diff, measurement bias, confounding, conflicting table values)",
      "resolution": "which evidence is stronger and why (citing specific table/figure data)",
      "confidence_in_resolution": 0.0-1.0
    }}
  ],
  "methodology_comparison": {{
    "study_types": [
      {{"type": "RCT" | "cohort" | "case-control" | "mechanistic" | "review", "count": number, "avg_quality": 0.0-1.0}}
    ],
    "risk_of_bias": ["funding source", "selective reporting", "small sample", "observational only"]
  }},
  "evidence_gaps": ["specific research questions unanswered"],
  "synthesis_confidence": 0.0-1.0,
  "key_recommendation": "practical takeaway with uncertainty acknowledged",
  "uncertainty_flags": ["specific limitations"]
}}"#
    )
}
