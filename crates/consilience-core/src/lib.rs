//! # consilience-core
//!
//! Core types, traits, and pure logic for consilience: the data model, the
//! cache gate, the response validator, and the evidence graph builder.
//!
//! Storage, inference, and orchestration crates depend on this one; it does
//! no I/O of its own.

pub mod defaults;
pub mod demo;
pub mod error;
pub mod gate;
pub mod graph;
pub mod logging;
pub mod models;
pub mod traits;
pub mod validator;

// Re-export commonly used types at crate root
pub use error::{Error, Result, ValidationError};
pub use gate::{admit, Admission, GateWindows};
pub use graph::{build_graph, what_if, EdgeKind, EvidenceGraph, GraphEdge, GraphNode, WhatIfAnalysis};
pub use models::*;
pub use traits::*;
pub use validator::{ResponseValidator, SchemaValidator};
