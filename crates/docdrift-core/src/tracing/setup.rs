//! Tracing initialization and configuration.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Environment variable holding the log filter directive.
pub const LOG_ENV_VAR: &str = "DOCDRIFT_LOG";

/// Initialize the DocDrift tracing/logging system.
///
/// Reads `DOCDRIFT_LOG` for per-subsystem log levels.
/// Format: `DOCDRIFT_LOG=docdrift_analysis::mapper=debug,docdrift_storage=warn`
///
/// Falls back to `info` for the docdrift crates if `DOCDRIFT_LOG` is unset or invalid.
/// Idempotent.
pub fn init_tracing() {
    init_tracing_with_default("info");
}

/// Like [`init_tracing`], with an explicit fallback level (usually `config.log_level`).
pub fn init_tracing_with_default(level: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "docdrift_core={level},docdrift_storage={level},docdrift_analysis={level}"
            ))
        });

        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(filter)
            .try_init();
    });
}
