//! OpenAI-compatible inference backend.
//!
//! Works with any endpoint that speaks the chat completions API:
//!
//! - OpenAI cloud API
//! - Azure OpenAI
//! - Ollama (in OpenAI compatibility mode)
//! - vLLM
//! - LM Studio
//!
//! # Example
//!
//! ```rust,no_run
//! use consilience_inference::openai::{OpenAIBackend, OpenAIConfig};
//! use consilience_core::GenerationBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     // From environment variables
//!     let backend = OpenAIBackend::from_env().unwrap();
//!
//!     // Or against a local server
//!     let config = OpenAIConfig {
//!         base_url: "http://localhost:11434/v1".to_string(),
//!         gen_model: "llama3.1:8b".to_string(),
//!         ..Default::default()
//!     };
//!     let local = OpenAIBackend::new(config).unwrap();
//!
//!     let text = local.generate("Summarize caffeine's effect on memory.").await.unwrap();
//!     println!("{text}");
//! }
//! ```

mod backend;
mod error;
mod types;

pub use backend::{OpenAIBackend, OpenAIConfig, DEFAULT_GEN_MODEL, DEFAULT_OPENAI_URL, DEFAULT_TIMEOUT_SECS};
pub use error::{to_core_error, OpenAIErrorCode};
pub use types::*;
