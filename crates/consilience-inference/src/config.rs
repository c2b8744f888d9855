//! Backend selection.
//!
//! `INFERENCE_BACKEND` picks the generation backend (`ollama` or `openai`);
//! each backend then reads its own environment variables.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::info;

use consilience_core::{Error, GenerationBackend, Result};

/// Inference backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Ollama,
    OpenAI,
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            other => Err(Error::Config(format!("Invalid inference backend: {other}"))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ollama => write!(f, "ollama"),
            Self::OpenAI => write!(f, "openai"),
        }
    }
}

impl BackendKind {
    /// Read `INFERENCE_BACKEND`, defaulting to Ollama when unset.
    pub fn from_env() -> Result<Self> {
        match std::env::var("INFERENCE_BACKEND") {
            Ok(value) => value.parse(),
            Err(_) => Ok(Self::default()),
        }
    }
}

/// Build the configured backend from environment variables.
pub fn backend_from_env() -> Result<Arc<dyn GenerationBackend>> {
    build_backend(BackendKind::from_env()?)
}

/// Build a backend of the given kind from its environment variables.
pub fn build_backend(kind: BackendKind) -> Result<Arc<dyn GenerationBackend>> {
    let backend: Arc<dyn GenerationBackend> = match kind {
        #[cfg(feature = "ollama")]
        BackendKind::Ollama => Arc::new(crate::ollama::OllamaBackend::from_env()),
        #[cfg(feature = "openai")]
        BackendKind::OpenAI => Arc::new(crate::openai::OpenAIBackend::from_env()?),
        #[allow(unreachable_patterns)]
        other => {
            return Err(Error::Config(format!(
                "Inference backend '{other}' is not compiled in"
            )))
        }
    };
    info!(
        subsystem = "inference",
        backend = %kind,
        model = backend.model_name(),
        "Inference backend selected"
    );
    Ok(backend)
}
