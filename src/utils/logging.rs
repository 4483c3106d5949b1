//! Logger setup plus module-gated logging macros.
//!
//! The macros expand to `log` calls wrapped in a check of the calling
//! module's `ENABLE_LOGS` constant, so chatty modules (the sampling worker,
//! the sample builder) can be silenced without touching `RUST_LOG`:
//!
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//! use crate::{log_info, log_warn};
//!
//! log_info!("frame {} sampled", index);
//! ```

use env_logger::Env;

/// Installs `env_logger`. `RUST_LOG` wins; otherwise `info`, or `debug` when
/// `SENSORLOG_DEBUG` is `1`/`true`.
pub fn init_logging() {
    let default_level = if debug_requested() { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .try_init();
}

fn debug_requested() -> bool {
    std::env::var("SENSORLOG_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
