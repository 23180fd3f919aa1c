#![deny(missing_docs)]
//! Logging front end for the relay crates.
//!
//! `relay_engine` and the `relay` binary log through the `engine_*` macros,
//! which forward to the `log` facade; the binary installs the simplelog
//! backend. Item ids are uuids, so log lines carry them through [`short_id`].

/// Logs a debug-level message: per-item and storage detail.
#[macro_export]
macro_rules! engine_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Logs an info-level message: run, item and schedule transitions.
#[macro_export]
macro_rules! engine_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a warn-level message: retries and recoverable storage trouble.
#[macro_export]
macro_rules! engine_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message: permanent item failures and runs that end early.
#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// First block of an item id; enough to tell queue items apart in a log.
pub fn short_id(id: &str) -> &str {
    id.split('-').next().unwrap_or(id)
}

/// Terminal logger for integration tests, limited to the relay crates so
/// HTTP mock server chatter stays out of the output.
///
/// No-ops when a logger is already installed.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, ConfigBuilder, TermLogger, TerminalMode};

    let config = ConfigBuilder::new().add_filter_allow_str("relay").build();
    let _ = CombinedLogger::init(vec![TermLogger::new(
        log::LevelFilter::Debug,
        config,
        TerminalMode::Mixed,
        ColorChoice::Never,
    )]);
}

#[cfg(test)]
mod tests {
    use super::short_id;

    #[test]
    fn short_id_keeps_first_block() {
        assert_eq!(short_id("3f2a9c1e-0000-4000-8000-000000000000"), "3f2a9c1e");
        assert_eq!(short_id("plain"), "plain");
    }
}
