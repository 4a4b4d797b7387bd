//! Host-level fault conditions.
//!
//! Only conditions that mean "the bridge could not do its job" live here.
//! A failing program (syntax error, uncaught exception, missing function) is
//! reported as data through `ExecutionResult::exit_code` and `stderr`, and an
//! undecodable call result is `CallResult::NoResult`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SandboxError>;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error(
        "wasmtime executable not found (searched: {}). Install it with `safeeval install`",
        format_searched(.searched)
    )]
    RuntimeNotFound { searched: Vec<PathBuf> },

    #[error("interpreter module not found: {} (the package is missing its bundled rustpython.wasm)", format_searched(.searched))]
    ModuleNotFound { searched: Vec<PathBuf> },

    #[error("unsupported platform: {platform}{}", format_hint(.hint))]
    PlatformUnsupported {
        platform: String,
        hint: Option<String>,
    },

    #[error("execution timed out after {:.3}s; child process was killed", secs(.timeout))]
    ExecutionTimeout { timeout: Duration },

    #[error("execution killed: memory usage ({used_mb} MB) exceeded limit ({limit_mb} MB)")]
    MemoryLimitExceeded { used_mb: u64, limit_mb: u64 },

    #[error("runtime installation failed: install script exited with {status}")]
    InstallFailed { status: String },

    #[error("failed to spawn {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
}

impl SandboxError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// True for conditions caused by the environment (missing runtime/module,
    /// unsupported platform) rather than by the submitted code.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Self::RuntimeNotFound { .. }
                | Self::ModuleNotFound { .. }
                | Self::PlatformUnsupported { .. }
                | Self::Spawn { .. }
        )
    }
}

fn format_hint(hint: &Option<String>) -> String {
    hint.as_deref()
        .map(|h| format!("\nHint: {}", h))
        .unwrap_or_default()
}

fn secs(d: &Duration) -> f64 {
    d.as_secs_f64()
}

fn format_searched(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "<nothing>".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
