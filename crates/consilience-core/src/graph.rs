//! Evidence graph: a node per paper, an edge per agreeing pair and per contradiction.
//!
//! Graphs are derived on read from a stored `SynthesisResult` and never
//! persisted. Edge ids depend only on content (finding index plus positions in
//! the deduplicated supporting list, or the contradiction id), so a what-if
//! projection with papers removed yields a subset of the full graph's ids.

use std::collections::HashSet;
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::defaults;
use crate::models::{PaperMetadata, SynthesisResult};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct GraphNode {
    /// Paper id.
    pub id: String,
    pub label: String,
    pub position: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Agrees,
    Contradicts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct EvidenceGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl EvidenceGraph {
    pub fn edges_of_kind(&self, kind: EdgeKind) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |e| e.kind == kind)
    }
}

/// Result of recomputing the graph with some papers excluded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WhatIfAnalysis {
    /// Excluded ids that belong to the analysis, in request order.
    pub excluded_paper_ids: Vec<String>,
    pub remaining_papers: usize,
    /// Share of the analysis' papers that were excluded, 0 to 100.
    pub impact_percent: f64,
    /// Findings still backed by at least two remaining papers.
    pub surviving_findings: usize,
    /// Contradictions whose papers are both still present.
    pub surviving_contradictions: usize,
    pub graph: EvidenceGraph,
}

/// Build the full evidence graph.
///
/// Edges whose endpoints are not among `papers` are left out.
pub fn build_graph(papers: &[PaperMetadata], result: &SynthesisResult) -> EvidenceGraph {
    project(papers, result, &HashSet::new())
}

/// Rebuild the graph as if `excluded` papers had never been submitted.
///
/// Node positions stay where they were in the full layout.
pub fn what_if(
    papers: &[PaperMetadata],
    result: &SynthesisResult,
    excluded: &[String],
) -> WhatIfAnalysis {
    let mut excluded_known: Vec<String> = Vec::new();
    for id in excluded {
        if papers.iter().any(|p| &p.paper_id == id) && !excluded_known.contains(id) {
            excluded_known.push(id.clone());
        }
    }
    let excluded_set: HashSet<&str> = excluded_known.iter().map(String::as_str).collect();

    let graph = project(papers, result, &excluded_set);

    let present = |id: &str| {
        papers.iter().any(|p| p.paper_id == id) && !excluded_set.contains(id)
    };
    let surviving_findings = result
        .agreed_findings
        .iter()
        .filter(|f| dedup(&f.supporting_papers).into_iter().filter(|id| present(id)).count() >= 2)
        .count();
    let surviving_contradictions = result
        .contradictions
        .iter()
        .filter(|c| present(&c.paper_a_claim.paper_id) && present(&c.paper_b_claim.paper_id))
        .count();

    let impact_percent = if papers.is_empty() {
        0.0
    } else {
        excluded_known.len() as f64 / papers.len() as f64 * 100.0
    };

    WhatIfAnalysis {
        remaining_papers: papers.len() - excluded_known.len(),
        excluded_paper_ids: excluded_known,
        impact_percent,
        surviving_findings,
        surviving_contradictions,
        graph,
    }
}

fn project(
    papers: &[PaperMetadata],
    result: &SynthesisResult,
    excluded: &HashSet<&str>,
) -> EvidenceGraph {
    let total = papers.len();
    let nodes: Vec<GraphNode> = papers
        .iter()
        .enumerate()
        .filter(|(_, p)| !excluded.contains(p.paper_id.as_str()))
        .map(|(i, p)| GraphNode {
            id: p.paper_id.clone(),
            label: node_label(&p.title),
            position: circle_position(i, total),
        })
        .collect();

    let present: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let mut edges = Vec::new();

    for (f, finding) in result.agreed_findings.iter().enumerate() {
        let supporters = dedup(&finding.supporting_papers);
        for i in 0..supporters.len() {
            for j in (i + 1)..supporters.len() {
                let (a, b) = (supporters[i], supporters[j]);
                if !present.contains(a) || !present.contains(b) {
                    continue;
                }
                trace!(finding = f, source = a, target = b, "agreement edge");
                edges.push(GraphEdge {
                    id: format!("agreement-{f}-{i}-{j}"),
                    source: a.to_string(),
                    target: b.to_string(),
                    kind: EdgeKind::Agrees,
                    label: "Agrees".to_string(),
                });
            }
        }
    }

    let mut seen_ids: HashSet<&str> = HashSet::new();
    for (c, contradiction) in result.contradictions.iter().enumerate() {
        // Duplicate ids from the model get the contradiction's index appended.
        let id = if seen_ids.insert(contradiction.id.as_str()) {
            format!("contradiction-{}", contradiction.id)
        } else {
            format!("contradiction-{}-{c}", contradiction.id)
        };
        let (a, b) = (
            contradiction.paper_a_claim.paper_id.as_str(),
            contradiction.paper_b_claim.paper_id.as_str(),
        );
        if !present.contains(a) || !present.contains(b) {
            continue;
        }
        edges.push(GraphEdge {
            id,
            source: a.to_string(),
            target: b.to_string(),
            kind: EdgeKind::Contradicts,
            label: contradiction.outcome_measured.clone(),
        });
    }

    EvidenceGraph { nodes, edges }
}

fn dedup(ids: &[String]) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id.as_str()) {
            out.push(id);
        }
    }
    out
}

fn node_label(title: &str) -> String {
    if title.chars().count() > defaults::GRAPH_LABEL_MAX_CHARS {
        format!(
            "{}...",
            crate::models::truncate_chars(title, defaults::GRAPH_LABEL_MAX_CHARS)
        )
    } else {
        title.to_string()
    }
}

fn circle_position(index: usize, total: usize) -> Position {
    let angle = if total == 0 {
        0.0
    } else {
        index as f64 / total as f64 * 2.0 * PI
    };
    Position {
        x: defaults::GRAPH_LAYOUT_CENTER_X + defaults::GRAPH_LAYOUT_RADIUS * angle.cos(),
        y: defaults::GRAPH_LAYOUT_CENTER_Y + defaults::GRAPH_LAYOUT_RADIUS * angle.sin(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo;
    use crate::models::{AgreedFinding, EvidenceStrength};

    fn fixture() -> (Vec<PaperMetadata>, SynthesisResult) {
        let new = demo::caffeine_analysis(chrono::Utc::now());
        let analysis = new.analysis;
        (analysis.papers, analysis.synthesis_result.unwrap())
    }

    fn ids(graph: &EvidenceGraph, kind: EdgeKind) -> Vec<String> {
        graph.edges_of_kind(kind).map(|e| e.id.clone()).collect()
    }

    #[test]
    fn test_three_supporters_yield_three_pairs() {
        let (papers, mut result) = fixture();
        result.agreed_findings.truncate(1);
        let graph = build_graph(&papers, &result);

        let pairs: Vec<(String, String)> = graph
            .edges_of_kind(EdgeKind::Agrees)
            .map(|e| (e.source.clone(), e.target.clone()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("p1".to_string(), "p2".to_string()),
                ("p1".to_string(), "p3".to_string()),
                ("p2".to_string(), "p3".to_string()),
            ]
        );
    }

    #[test]
    fn test_contradiction_edges_follow_claim_order() {
        let (papers, result) = fixture();
        let graph = build_graph(&papers, &result);
        let edges: Vec<&GraphEdge> = graph.edges_of_kind(EdgeKind::Contradicts).collect();

        assert_eq!(edges.len(), 2);
        assert_eq!((edges[0].source.as_str(), edges[0].target.as_str()), ("p1", "p2"));
        assert_eq!((edges[1].source.as_str(), edges[1].target.as_str()), ("p3", "p1"));
        assert_eq!(edges[0].id, "contradiction-c1");
        assert_eq!(edges[1].id, "contradiction-c2");
    }

    #[test]
    fn test_full_demo_graph_counts() {
        let (papers, result) = fixture();
        let graph = build_graph(&papers, &result);
        assert_eq!(graph.nodes.len(), 3);
        // 3 pairs from the first finding, 1 from the second.
        assert_eq!(
            ids(&graph, EdgeKind::Agrees),
            vec!["agreement-0-0-1", "agreement-0-0-2", "agreement-0-1-2", "agreement-1-0-1"]
        );
    }

    #[test]
    fn test_edge_ids_unique() {
        let (papers, result) = fixture();
        let graph = build_graph(&papers, &result);
        let unique: HashSet<&str> = graph.edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(unique.len(), graph.edges.len());
    }

    #[test]
    fn test_duplicate_supporters_do_not_create_self_loops() {
        let (papers, mut result) = fixture();
        result.contradictions.clear();
        result.agreed_findings = vec![AgreedFinding {
            claim: "x".to_string(),
            supporting_papers: vec!["p1".into(), "p1".into(), "p2".into()],
            confidence: 0.5,
            evidence_strength: EvidenceStrength::Weak,
        }];
        let graph = build_graph(&papers, &result);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].id, "agreement-0-0-1");
    }

    #[test]
    fn test_duplicate_contradiction_ids_stay_distinct() {
        let (papers, mut result) = fixture();
        result.contradictions[1].id = "c1".to_string();
        let graph = build_graph(&papers, &result);
        assert_eq!(
            ids(&graph, EdgeKind::Contradicts),
            vec!["contradiction-c1", "contradiction-c1-1"]
        );
    }

    #[test]
    fn test_unknown_papers_are_not_linked() {
        let (papers, mut result) = fixture();
        result.agreed_findings[1].supporting_papers.push("p9".to_string());
        let graph = build_graph(&papers, &result);
        assert!(graph.edges.iter().all(|e| e.source != "p9" && e.target != "p9"));
    }

    #[test]
    fn test_labels_truncated_at_thirty_chars() {
        let (papers, result) = fixture();
        let graph = build_graph(&papers, &result);
        // "Caffeine as a Direct Cognitive Enhancer: ..." is longer than 30.
        assert_eq!(graph.nodes[0].label, "Caffeine as a Direct Cognitive...");
        assert!(graph.nodes.iter().all(|n| n.label.chars().count() <= 33));
    }

    #[test]
    fn test_nodes_on_circle() {
        let (papers, result) = fixture();
        let graph = build_graph(&papers, &result);
        let first = graph.nodes[0].position;
        assert!((first.x - 600.0).abs() < 1e-9);
        assert!((first.y - 300.0).abs() < 1e-9);
        for node in &graph.nodes {
            let dx = node.position.x - 400.0;
            let dy = node.position.y - 300.0;
            assert!(((dx * dx + dy * dy).sqrt() - 200.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_what_if_edges_are_subset_with_same_ids() {
        let (papers, result) = fixture();
        let full = build_graph(&papers, &result);
        let analysis = what_if(&papers, &result, &["p2".to_string()]);

        let full_ids: HashSet<&str> = full.edges.iter().map(|e| e.id.as_str()).collect();
        assert!(analysis
            .graph
            .edges
            .iter()
            .all(|e| full_ids.contains(e.id.as_str())));
        assert_eq!(ids(&analysis.graph, EdgeKind::Agrees), vec!["agreement-0-0-2"]);
        assert_eq!(ids(&analysis.graph, EdgeKind::Contradicts), vec!["contradiction-c2"]);
        assert_eq!(analysis.graph.nodes.len(), 2);
        assert_eq!(analysis.graph.nodes[1].position, full.nodes[2].position);
    }

    #[test]
    fn test_what_if_impact_and_survivors() {
        let (papers, result) = fixture();
        let analysis = what_if(&papers, &result, &["p3".to_string(), "p3".to_string()]);
        assert_eq!(analysis.excluded_paper_ids, vec!["p3".to_string()]);
        assert_eq!(analysis.remaining_papers, 2);
        assert!((analysis.impact_percent - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(analysis.surviving_findings, 2);
        assert_eq!(analysis.surviving_contradictions, 1);
    }

    #[test]
    fn test_what_if_ignores_unknown_ids() {
        let (papers, result) = fixture();
        let analysis = what_if(&papers, &result, &["nope".to_string()]);
        assert!(analysis.excluded_paper_ids.is_empty());
        assert_eq!(analysis.impact_percent, 0.0);
        assert_eq!(analysis.graph, build_graph(&papers, &result));
    }

    #[test]
    fn test_edge_kind_wire_names() {
        assert_eq!(serde_json::to_string(&EdgeKind::Agrees).unwrap(), "\"agrees\"");
        assert_eq!(
            serde_json::to_string(&EdgeKind::Contradicts).unwrap(),
            "\"contradicts\""
        );
    }
}
