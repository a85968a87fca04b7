/// DocDrift version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum attempts for a single agent call before the task is failed back to the queue.
pub const RETRY_PER_CALL_MAX: u32 = 2;

/// Maximum times a task may be claimed before it is marked `failed`.
pub const RETRY_PER_JOB_MAX: u32 = 3;

/// Confidence assigned to a unique exact symbol match.
pub const SYMBOL_UNIQUE_CONFIDENCE: f64 = 0.95;

/// Scale applied to prefix (non-exact) symbol matches.
pub const SYMBOL_PREFIX_SCALE: f64 = 0.8;

/// Confidence of a unique path-suffix match.
pub const SUFFIX_MATCH_CONFIDENCE: f64 = 0.9;

/// Two candidate confidences closer than this are considered tied.
pub const TIE_EPSILON: f64 = 1e-6;

/// Rough characters-per-token ratio used when no tokenizer is available.
pub const CHARS_PER_TOKEN: usize = 4;

/// Lower bound for `agent.concurrency`.
pub const MIN_AGENT_CONCURRENCY: usize = 1;

/// Upper bound for `agent.concurrency`.
pub const MAX_AGENT_CONCURRENCY: usize = 20;

/// Lower bound for `agent.timeout_seconds`.
pub const MIN_AGENT_TIMEOUT_SECS: u64 = 30;

/// Upper bound for `agent.timeout_seconds`.
pub const MAX_AGENT_TIMEOUT_SECS: u64 = 600;

/// File extensions treated as documentation when recording co-changes.
pub const DOC_EXTENSIONS: &[&str] = &["md", "mdx", "markdown", "rst", "adoc", "txt"];
