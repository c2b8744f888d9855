//! Structured logging schema and field name constants for consilience.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query by the same names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), synthesis completions |
//! | DEBUG | Decision points, gate outcomes, config choices |
//! | TRACE | Per-item iteration (prompt blocks, graph edges) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated from the HTTP request.
/// Format: UUIDv7 (time-ordered).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "db", "inference", "synthesis"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "orchestrator", "retry", "ollama", "pool", "memory_store"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "run_synthesis", "generate", "begin_attempt"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Analysis id being operated on.
pub const ANALYSIS_ID: &str = "analysis_id";

/// Document id being operated on.
pub const DOCUMENT_ID: &str = "document_id";

/// Number of documents in an analysis.
pub const DOCUMENT_COUNT: &str = "document_count";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// One-based attempt number inside a retry loop.
pub const ATTEMPT: &str = "attempt";

/// Byte length of a prompt.
pub const PROMPT_LEN: &str = "prompt_len";

/// Byte length of a model response.
pub const RESPONSE_LEN: &str = "response_len";

/// Seconds until the cool-down elapses.
pub const RETRY_AFTER_SECS: &str = "retry_after_secs";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

/// Database table affected.
pub const DB_TABLE: &str = "db_table";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for inference.
pub const MODEL: &str = "model";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Whether a cached result was served.
pub const CACHED: &str = "cached";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Slow operation threshold exceeded.
pub const SLOW: &str = "slow";
