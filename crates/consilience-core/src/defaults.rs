//! Centralized default constants for consilience.
//!
//! **This module is the single source of truth** for shared default values.
//! Config structs read their fallbacks from here; tests compare against these
//! constants instead of repeating literals.

// =============================================================================
// INGESTION
// =============================================================================

/// Maximum characters of document text kept at ingestion. Longer text is truncated.
pub const DOCUMENT_TEXT_CAP: usize = 15_000;

/// Minimum number of papers per analysis.
pub const MIN_PAPERS_PER_ANALYSIS: usize = 2;

/// Maximum number of papers per analysis.
pub const MAX_PAPERS_PER_ANALYSIS: usize = 5;

// =============================================================================
// SYNTHESIS
// =============================================================================

/// Attempts per synthesis invocation, including the first.
pub const SYNTHESIS_MAX_ATTEMPTS: u32 = 3;

/// Per-attempt timeout in seconds.
pub const SYNTHESIS_ATTEMPT_TIMEOUT_SECS: u64 = 60;

/// Linear backoff base in milliseconds. Delay before retry `n` is `base * n`.
pub const SYNTHESIS_BACKOFF_BASE_MS: u64 = 1000;

/// Minimum seconds between two synthesis attempts on the same analysis.
pub const SYNTHESIS_COOLDOWN_SECS: u64 = 60;

/// Characters of each paper's text included in the prompt.
pub const SYNTHESIS_TEXT_PREFIX_CHARS: usize = 4000;

/// Overall deadline for one synthesis HTTP request, in seconds.
pub const SYNTHESIS_REQUEST_DEADLINE_SECS: u64 = 60;

/// Generation calls slower than this are logged at WARN.
pub const SLOW_GENERATION_THRESHOLD_SECS: u64 = 30;

/// Message persisted when an attempt exceeds its timeout.
pub const TIMEOUT_MESSAGE: &str = "Analysis timed out. Try with fewer papers.";

/// Fallback message when no attempt produced a usable error.
pub const SYNTHESIS_FAILED_MESSAGE: &str = "Failed to analyze papers";

// =============================================================================
// GRAPH LAYOUT
// =============================================================================

/// Node labels longer than this are truncated and suffixed with `...`.
pub const GRAPH_LABEL_MAX_CHARS: usize = 30;

/// Radius of the circular node layout.
pub const GRAPH_LAYOUT_RADIUS: f64 = 200.0;

/// Center X of the circular node layout.
pub const GRAPH_LAYOUT_CENTER_X: f64 = 400.0;

/// Center Y of the circular node layout.
pub const GRAPH_LAYOUT_CENTER_Y: f64 = 300.0;

// =============================================================================
// INFERENCE
// =============================================================================

/// Default Ollama base URL.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default generation model (Ollama).
pub const GEN_MODEL: &str = "gpt-oss:20b";

/// Default OpenAI-compatible base URL.
pub const OPENAI_URL: &str = "https://api.openai.com/v1";

/// Default generation model (OpenAI-compatible).
pub const OPENAI_GEN_MODEL: &str = "gpt-4o-mini";

/// HTTP client timeout for generation requests, in seconds.
/// Kept above the per-attempt timeout so the attempt timeout fires first.
pub const GEN_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Default rate limit: max requests per period.
pub const RATE_LIMIT_REQUESTS: u64 = 100;

/// Default rate limit: period in seconds.
pub const RATE_LIMIT_PERIOD_SECS: u64 = 60;

/// Default database URL.
pub const DATABASE_URL: &str = "postgres://localhost/consilience";

// =============================================================================
// DATABASE POOL
// =============================================================================

/// Maximum connections in the pool.
pub const POOL_MAX_CONNECTIONS: u32 = 10;

/// Seconds to wait for a connection before failing.
pub const POOL_ACQUIRE_TIMEOUT_SECS: u64 = 30;
