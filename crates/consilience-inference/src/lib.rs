//! # consilience-inference
//!
//! LLM generation backends for consilience.
//!
//! This crate provides:
//! - Ollama implementation (default)
//! - OpenAI-compatible implementation (optional, feature `openai`)
//! - Backend selection from the environment
//! - A scripted backend for tests (feature `mock`)
//!
//! # Feature Flags
//!
//! - `ollama` (default): Enable Ollama backend
//! - `openai`: Enable OpenAI-compatible backend
//! - `mock`: Export the scripted test backend
//!
//! # Example
//!
//! ```rust,no_run
//! use consilience_inference::OllamaBackend;
//! use consilience_core::GenerationBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = OllamaBackend::from_env();
//!     let reply = backend.generate("Hello").await.unwrap();
//!     println!("{reply}");
//! }
//! ```

pub mod config;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use config::{backend_from_env, build_backend, BackendKind};

#[cfg(feature = "ollama")]
pub use ollama::OllamaBackend;

#[cfg(feature = "openai")]
pub use openai::{OpenAIBackend, OpenAIConfig};
