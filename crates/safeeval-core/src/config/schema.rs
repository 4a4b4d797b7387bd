//! Typed configuration structs loaded from the environment.

use super::env_keys::{observability as obv_keys, runtime as rt_keys};
use super::loader::{env_bool, env_optional, env_or, env_parse};
use std::path::PathBuf;

/// Runtime location overrides and execution limits.
///
/// Every field is optional: `None` means "use the locator search" for paths
/// and "no limit" for limits. CLI flags override these values.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub runtime_path: Option<PathBuf>,
    pub module_path: Option<PathBuf>,
    /// Install root of the vendor script (`$WASMTIME_HOME`)
    pub wasmtime_home: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub max_memory_mb: Option<u64>,
    pub auto_approve: bool,
}

impl RuntimeConfig {
    /// Load from environment variables (loads `.env` first).
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        Self {
            runtime_path: env_optional(
                rt_keys::SAFEEVAL_RUNTIME_PATH,
                rt_keys::RUNTIME_PATH_ALIASES,
            )
            .map(PathBuf::from),
            module_path: env_optional(rt_keys::SAFEEVAL_MODULE_PATH, rt_keys::MODULE_PATH_ALIASES)
                .map(PathBuf::from),
            wasmtime_home: env_optional(rt_keys::WASMTIME_HOME, &[]).map(PathBuf::from),
            timeout_secs: env_parse(rt_keys::SAFEEVAL_TIMEOUT_SECS, &[]),
            max_memory_mb: env_parse(rt_keys::SAFEEVAL_MAX_MEMORY_MB, &[]),
            auto_approve: env_bool(rt_keys::SAFEEVAL_AUTO_APPROVE, &[], false),
        }
    }
}

/// Observability configuration: quiet, log_level, log_json, audit_log
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
    pub audit_log: Option<String>,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            super::loader::load_dotenv();
            Self {
                quiet: env_bool(obv_keys::SAFEEVAL_QUIET, &[], false),
                log_level: env_or(obv_keys::SAFEEVAL_LOG_LEVEL, &[], || {
                    "safeeval=info".to_string()
                }),
                log_json: env_bool(obv_keys::SAFEEVAL_LOG_JSON, &[], false),
                audit_log: env_optional(obv_keys::SAFEEVAL_AUDIT_LOG, &[]),
            }
        })
    }
}
