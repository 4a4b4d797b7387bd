//! Quiet-mode aware logging. When SAFEEVAL_QUIET=1, per-execution [INFO] lines are suppressed.
//! Uses `tracing::info!` so output is captured by the tracing subscriber.

#[macro_export]
macro_rules! info_log {
    ($($arg:tt)*) => {{
        if !$crate::log::is_quiet() {
            tracing::info!($($arg)*);
        }
    }};
}

pub fn is_quiet() -> bool {
    safeeval_core::config::ObservabilityConfig::from_env().quiet
}
