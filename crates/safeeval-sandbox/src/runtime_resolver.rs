//! Runtime Locator: resolves the wasmtime executable and the bundled
//! interpreter module before any execution.
//!
//! Only two places are ever consulted for the runtime: the vendor script's
//! default install path, then `$PATH`. Nothing here is process-global; tests
//! build a locator pointing at fake paths.

use std::path::{Path, PathBuf};

use safeeval_core::config::RuntimeConfig;

use crate::error::{Result, SandboxError};
use crate::runner::RuntimePaths;

/// Runtime binary name searched on `$PATH`
pub const RUNTIME_BINARY: &str = "wasmtime";

/// File name of the bundled WASM-compiled interpreter
pub const MODULE_FILE_NAME: &str = "rustpython.wasm";

#[derive(Debug, Clone)]
pub struct RuntimeLocator {
    /// Vendor default install location, e.g. `~/.wasmtime/bin/wasmtime`
    pub default_install: PathBuf,
    /// Name looked up on `$PATH` when the default install is absent
    pub binary_name: String,
    /// Explicit runtime path; bypasses the search but is still verified
    pub runtime_override: Option<PathBuf>,
    /// Interpreter module locations, first existing one wins
    pub module_candidates: Vec<PathBuf>,
}

impl RuntimeLocator {
    pub fn new(default_install: impl Into<PathBuf>, module_candidates: Vec<PathBuf>) -> Self {
        Self {
            default_install: default_install.into(),
            binary_name: RUNTIME_BINARY.to_string(),
            runtime_override: None,
            module_candidates,
        }
    }

    /// Standard locator built from configuration.
    ///
    /// Module candidates, in order: `SAFEEVAL_MODULE_PATH`, next to the
    /// current executable, then `<data dir>/safeeval/rustpython.wasm`.
    pub fn from_config(cfg: &RuntimeConfig) -> Self {
        let default_install = cfg
            .wasmtime_home
            .clone()
            .or_else(|| dirs::home_dir().map(|h| h.join(".wasmtime")))
            .unwrap_or_else(|| PathBuf::from(".wasmtime"))
            .join("bin")
            .join(RUNTIME_BINARY);

        let mut module_candidates = Vec::new();
        if let Some(ref p) = cfg.module_path {
            module_candidates.push(p.clone());
        } else {
            if let Some(dir) = std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf))
            {
                module_candidates.push(dir.join(MODULE_FILE_NAME));
            }
            if let Some(data) = dirs::data_dir() {
                module_candidates.push(data.join("safeeval").join(MODULE_FILE_NAME));
            }
        }

        Self {
            default_install,
            binary_name: RUNTIME_BINARY.to_string(),
            runtime_override: cfg.runtime_path.clone(),
            module_candidates,
        }
    }

    pub fn from_env() -> Self {
        Self::from_config(&RuntimeConfig::from_env())
    }

    pub fn with_runtime_override(mut self, path: Option<PathBuf>) -> Self {
        if path.is_some() {
            self.runtime_override = path;
        }
        self
    }

    pub fn with_module_override(mut self, path: Option<PathBuf>) -> Self {
        if let Some(p) = path {
            self.module_candidates = vec![p];
        }
        self
    }

    /// Find the runtime: override, else default install path, else `$PATH`.
    /// Absent is not an error here.
    pub fn find_runtime(&self) -> Option<PathBuf> {
        if let Some(ref p) = self.runtime_override {
            return p.is_file().then(|| p.clone());
        }
        if self.default_install.is_file() {
            return Some(self.default_install.clone());
        }
        which::which(&self.binary_name).ok()
    }

    /// Like [`find_runtime`](Self::find_runtime) but fails with `RuntimeNotFound`.
    pub fn require_runtime(&self) -> Result<PathBuf> {
        self.find_runtime().ok_or_else(|| SandboxError::RuntimeNotFound {
            searched: self.searched_runtime_locations(),
        })
    }

    fn searched_runtime_locations(&self) -> Vec<PathBuf> {
        match self.runtime_override {
            Some(ref p) => vec![p.clone()],
            None => vec![
                self.default_install.clone(),
                PathBuf::from(format!("$PATH/{}", self.binary_name)),
            ],
        }
    }

    /// Resolve the interpreter module. A missing module is a packaging defect.
    pub fn resolve_module_path(&self) -> Result<PathBuf> {
        self.module_candidates
            .iter()
            .find(|p| p.is_file())
            .cloned()
            .ok_or_else(|| SandboxError::ModuleNotFound {
                searched: self.module_candidates.clone(),
            })
    }

    /// Resolve both paths for the bridge.
    pub fn resolve(&self) -> Result<RuntimePaths> {
        let runtime = self.require_runtime()?;
        let module = self.resolve_module_path()?;
        tracing::debug!(
            runtime = %runtime.display(),
            module = %module.display(),
            "Resolved runtime paths"
        );
        Ok(RuntimePaths { runtime, module })
    }
}
