//! # consilience-synthesis
//!
//! Synthesis pipeline for consilience.
//!
//! This crate provides:
//! - Deterministic prompt construction from stored documents
//! - A retry policy and the retrying synthesis client
//! - The orchestrator that gates, stamps, synthesizes and persists
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use consilience_core::SchemaValidator;
//! use consilience_db::InMemoryStore;
//! use consilience_inference::OllamaBackend;
//! use consilience_synthesis::{Orchestrator, SynthesisClient, SynthesisConfig};
//!
//! let store = InMemoryStore::new();
//! let config = SynthesisConfig::from_env()?;
//! let client = SynthesisClient::new(
//!     Arc::new(OllamaBackend::from_env()),
//!     Arc::new(SchemaValidator),
//!     config.retry,
//! );
//! let orchestrator = Orchestrator::new(Arc::new(store.clone()), Arc::new(store), client, config);
//!
//! let outcome = orchestrator.run_synthesis("demo-caffeine-2024").await?;
//! println!("cached: {}", outcome.cached());
//! ```

pub mod orchestrator;
pub mod prompt;
pub mod retry;

pub use orchestrator::{Orchestrator, PaperCountPolicy, SynthesisConfig, SynthesisOutcome};
pub use prompt::{build_prompt, SYSTEM_PROMPT};
pub use retry::{AttemptError, Exhausted, RetryPolicy, SynthesisClient, Synthesized};
