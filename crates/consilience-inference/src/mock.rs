//! Scripted generation backend for deterministic testing.
//!
//! Each call to the backend consumes the next scripted [`Reply`]. When the
//! script runs out the last reply repeats, so a single-reply script answers
//! every call the same way.
//!
//! ```rust
//! use consilience_inference::mock::{Reply, ScriptedBackend};
//! use consilience_core::GenerationBackend;
//!
//! # async fn demo() {
//! let backend = ScriptedBackend::new(vec![
//!     Reply::text("I cannot produce JSON today."),
//!     Reply::text(r#"{"topic": "caffeine"}"#),
//! ]);
//! assert!(backend.generate("first").await.is_ok());
//! assert_eq!(backend.call_count(), 1);
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use consilience_core::{Error, GenerationBackend, Result};

/// One scripted response.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Return this text.
    Text(String),
    /// Fail with `Error::Inference`.
    Error(String),
    /// Never complete. Exercises attempt timeouts.
    Hang,
    /// Return this text after sleeping.
    Delayed(Duration, String),
}

impl Reply {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn error(s: impl Into<String>) -> Self {
        Self::Error(s.into())
    }
}

/// A recorded backend call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub system: String,
    pub prompt: String,
    pub json_mode: bool,
}

#[derive(Debug, Default)]
struct Script {
    replies: VecDeque<Reply>,
    last: Option<Reply>,
}

/// Generation backend that plays back a fixed script.
#[derive(Clone)]
pub struct ScriptedBackend {
    model: String,
    script: Arc<Mutex<Script>>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            model: "scripted".to_string(),
            script: Arc::new(Mutex::new(Script {
                replies: replies.into(),
                last: None,
            })),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A backend that always answers with `text`.
    pub fn always(text: impl Into<String>) -> Self {
        Self::new(vec![Reply::text(text)])
    }

    /// Set the reported model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Append a reply to the script.
    pub fn push(&self, reply: Reply) {
        if let Ok(mut script) = self.script.lock() {
            script.replies.push_back(reply);
        }
    }

    /// Get all logged calls for assertion.
    pub fn calls(&self) -> Vec<MockCall> {
        self.call_log.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.call_log.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn next_reply(&self) -> Result<Reply> {
        let mut script = self
            .script
            .lock()
            .map_err(|_| Error::Internal("scripted backend lock poisoned".to_string()))?;
        match script.replies.pop_front() {
            Some(reply) => {
                script.last = Some(reply.clone());
                Ok(reply)
            }
            None => script
                .last
                .clone()
                .ok_or_else(|| Error::Inference("scripted backend has no replies".to_string())),
        }
    }

    async fn play(&self, system: &str, prompt: &str, json_mode: bool) -> Result<String> {
        if let Ok(mut log) = self.call_log.lock() {
            log.push(MockCall {
                system: system.to_string(),
                prompt: prompt.to_string(),
                json_mode,
            });
        }
        match self.next_reply()? {
            Reply::Text(text) => Ok(text),
            Reply::Error(message) => Err(Error::Inference(message)),
            Reply::Hang => {
                std::future::pending::<()>().await;
                Err(Error::Internal("pending future resolved".to_string()))
            }
            Reply::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
        }
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.play("", prompt, false).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.play(system, prompt, false).await
    }

    async fn generate_json_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.play(system, prompt, true).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
