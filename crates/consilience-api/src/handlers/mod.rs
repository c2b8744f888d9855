//! HTTP handlers for consilience-api.

pub mod analyses;
pub mod graph;
pub mod synthesis;
