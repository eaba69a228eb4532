//! Logging setup shared by the gridfed crates
//!
//! Output is controlled by the GRIDFED_LOG environment variable:
//! - GRIDFED_LOG=off (default) - silent
//! - GRIDFED_LOG=error | warn - problems only
//! - GRIDFED_LOG=info - sources opened, datasets merged, groups built
//! - GRIDFED_LOG=debug - per-source reads, inferred frequencies, fallbacks

use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

/// Environment variable selecting the minimum log level
pub const LOG_ENV: &str = "GRIDFED_LOG";

static INIT: Once = Once::new();

fn min_level(value: &str) -> Option<Option<emit::Level>> {
    match value {
        "off" => Some(None),
        "error" => Some(Some(emit::Level::Error)),
        "warn" => Some(Some(emit::Level::Warn)),
        "info" => Some(Some(emit::Level::Info)),
        "debug" => Some(Some(emit::Level::Debug)),
        _ => None,
    }
}

/// Initialize diagnostics from GRIDFED_LOG
///
/// Call once at startup; later calls are ignored.
pub fn init_diagnostics() {
    INIT.call_once(|| {
        let requested = std::env::var(LOG_ENV).unwrap_or_else(|_| "off".to_string());

        let parsed = min_level(requested.as_str());
        let level = match parsed {
            Some(None) => return,
            Some(Some(level)) => level,
            None => emit::Level::Info,
        };

        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(level))
            .init();

        if parsed.is_none() {
            emit::warn!("unknown {env} value {requested}, using info", env: LOG_ENV, requested);
        }

        // The runtime lives for the whole process
        std::mem::forget(rt);
    });
}

/// Operations a user wants to see: sources opened, datasets merged
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Internal detail: per-source reads, inference results, fallbacks taken
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Recoverable oddities that still change the result
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Failures reported right before they are returned to a caller
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

pub use init_diagnostics as init;
