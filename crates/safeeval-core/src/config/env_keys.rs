//! Environment variable keys. Primary names use the `SAFEEVAL_*` prefix.

/// Runtime location and execution limits
pub mod runtime {
    /// Explicit path to the wasmtime executable (skips the search)
    pub const SAFEEVAL_RUNTIME_PATH: &str = "SAFEEVAL_RUNTIME_PATH";
    pub const RUNTIME_PATH_ALIASES: &[&str] = &["WASMTIME_EXEC"];

    /// Explicit path to the interpreter module (rustpython.wasm)
    pub const SAFEEVAL_MODULE_PATH: &str = "SAFEEVAL_MODULE_PATH";
    pub const MODULE_PATH_ALIASES: &[&str] = &["RUSTPYTHON_WASM"];

    /// Install root used by the vendor script (`$WASMTIME_HOME/bin/wasmtime`)
    pub const WASMTIME_HOME: &str = "WASMTIME_HOME";

    pub const SAFEEVAL_TIMEOUT_SECS: &str = "SAFEEVAL_TIMEOUT_SECS";
    pub const SAFEEVAL_MAX_MEMORY_MB: &str = "SAFEEVAL_MAX_MEMORY_MB";

    /// Skip interactive confirmation in the installer
    pub const SAFEEVAL_AUTO_APPROVE: &str = "SAFEEVAL_AUTO_APPROVE";
}

/// Observability and logging
pub mod observability {
    pub const SAFEEVAL_QUIET: &str = "SAFEEVAL_QUIET";
    pub const SAFEEVAL_LOG_LEVEL: &str = "SAFEEVAL_LOG_LEVEL";
    pub const SAFEEVAL_LOG_JSON: &str = "SAFEEVAL_LOG_JSON";
    pub const SAFEEVAL_AUDIT_LOG: &str = "SAFEEVAL_AUDIT_LOG";
}
