//! Execution Bridge: one request, one scratch workspace, one child process.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use safeeval_core::config::RuntimeConfig;
use safeeval_core::observability;
use serde::Serialize;

use crate::common::wait_with_timeout;
use crate::error::{Result, SandboxError};
use crate::workspace::ScratchWorkspace;

/// Execution result from the isolated runtime.
///
/// `exit_code == 0` means the program ran to completion. Non-zero covers both
/// program faults (syntax error, uncaught exception) and runtime-level
/// failures; only `stderr` tells them apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Resolved runtime paths for sandbox execution.
///
/// Callers construct this via `RuntimeLocator`; the bridge never searches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    /// Path to the wasmtime executable
    pub runtime: PathBuf,
    /// Path to the WASM-compiled interpreter (rustpython.wasm)
    pub module: PathBuf,
}

impl RuntimePaths {
    pub fn new(runtime: impl Into<PathBuf>, module: impl Into<PathBuf>) -> Self {
        Self {
            runtime: runtime.into(),
            module: module.into(),
        }
    }

    /// Cheap re-verification of the locator's result.
    pub fn verify(&self) -> Result<()> {
        if !self.runtime.is_file() {
            return Err(SandboxError::RuntimeNotFound {
                searched: vec![self.runtime.clone()],
            });
        }
        if !self.module.is_file() {
            return Err(SandboxError::ModuleNotFound {
                searched: vec![self.module.clone()],
            });
        }
        Ok(())
    }
}

/// Per-call limits. `None` means unlimited: the runtime's own defaults apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceLimits {
    pub timeout: Option<Duration>,
    /// Resident memory ceiling for the runtime process, in MB
    pub max_memory_mb: Option<u64>,
}

impl ResourceLimits {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            max_memory_mb: None,
        }
    }

    pub fn max_memory_bytes(&self) -> Option<u64> {
        self.max_memory_mb.map(|mb| mb.saturating_mul(1024 * 1024))
    }

    /// Load resource limits from configuration (SAFEEVAL_TIMEOUT_SECS, SAFEEVAL_MAX_MEMORY_MB)
    pub fn from_config(cfg: &RuntimeConfig) -> Self {
        Self {
            timeout: cfg.timeout_secs.map(Duration::from_secs),
            max_memory_mb: cfg.max_memory_mb,
        }
    }

    pub fn from_env() -> Self {
        Self::from_config(&RuntimeConfig::from_env())
    }

    /// Override with CLI parameters
    pub fn with_cli_overrides(mut self, cli_timeout: Option<Duration>, cli_max_memory: Option<u64>) -> Self {
        if let Some(timeout) = cli_timeout {
            self.timeout = Some(timeout);
        }
        if let Some(max_memory) = cli_max_memory {
            self.max_memory_mb = Some(max_memory);
        }
        self
    }
}

/// A single execution: immutable once built, consumed by exactly one child
/// process invocation.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    code: String,
    limits: ResourceLimits,
    paths: RuntimePaths,
}

impl ExecutionRequest {
    pub fn new(code: impl Into<String>, paths: RuntimePaths, limits: ResourceLimits) -> Self {
        Self {
            code: code.into(),
            limits,
            paths,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn limits(&self) -> ResourceLimits {
        self.limits
    }

    pub fn paths(&self) -> &RuntimePaths {
        &self.paths
    }
}

/// Build `<runtime> --dir=<scratch_dir> <module> <script>`.
///
/// `--dir` preopens the scratch directory and nothing else; the child sees no
/// other host path. The child runs in its own process group so a timeout can
/// kill everything it started.
pub fn build_command(paths: &RuntimePaths, workspace_dir: &Path, script_path: &Path) -> Command {
    let mut dir_arg = std::ffi::OsString::from("--dir=");
    dir_arg.push(workspace_dir.as_os_str());

    let mut cmd = Command::new(&paths.runtime);
    cmd.arg(dir_arg)
        .arg(&paths.module)
        .arg(script_path)
        .current_dir(workspace_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    cmd
}

/// Run one request to completion.
///
/// Non-zero exit is data, not an error. The scratch workspace is removed on
/// every path before this returns, including timeout and spawn failure.
pub fn execute_request(request: &ExecutionRequest) -> Result<ExecutionResult> {
    let paths = request.paths();
    paths.verify()?;

    let workspace = ScratchWorkspace::create(request.code())?;
    let outcome = run_in_workspace(request, &workspace);
    workspace.release();
    outcome
}

fn run_in_workspace(request: &ExecutionRequest, workspace: &ScratchWorkspace) -> Result<ExecutionResult> {
    let paths = request.paths();
    let limits = request.limits();

    crate::info_log!(
        runtime = %paths.runtime.display(),
        scratch_dir = %workspace.dir().display(),
        timeout_ms = limits.timeout.map(|t| t.as_millis() as u64),
        code_len = request.code().len(),
        "Execution start"
    );
    observability::audit_execution_started(
        &paths.runtime,
        &paths.module,
        workspace.dir(),
        request.code(),
    );

    let start = Instant::now();
    let mut cmd = build_command(paths, workspace.dir(), workspace.script_path());
    let mut child = cmd.spawn().map_err(|source| SandboxError::Spawn {
        program: paths.runtime.clone(),
        source,
    })?;

    let output = match wait_with_timeout(&mut child, limits.timeout, limits.max_memory_bytes()) {
        Ok(output) => output,
        Err(e) => {
            if let SandboxError::ExecutionTimeout { timeout } = &e {
                observability::audit_execution_timeout(
                    timeout.as_millis() as u64,
                    start.elapsed().as_millis() as u64,
                );
            }
            return Err(e);
        }
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    observability::audit_execution_completed(
        output.exit_code,
        duration_ms,
        output.stdout.len(),
        output.stderr.len(),
    );
    crate::info_log!(exit_code = output.exit_code, duration_ms, "Execution done");

    Ok(ExecutionResult {
        stdout: output.stdout,
        stderr: output.stderr,
        exit_code: output.exit_code,
    })
}

/// Execution bridge bound to one set of runtime paths and default limits.
///
/// Stateless between calls; share it freely across threads.
#[derive(Debug, Clone)]
pub struct ExecutionBridge {
    paths: RuntimePaths,
    limits: ResourceLimits,
}

impl ExecutionBridge {
    pub fn new(paths: RuntimePaths) -> Self {
        Self {
            paths,
            limits: ResourceLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn paths(&self) -> &RuntimePaths {
        &self.paths
    }

    pub fn limits(&self) -> ResourceLimits {
        self.limits
    }

    /// Execute `code` with the bridge's default limits.
    pub fn execute(&self, code: &str) -> Result<ExecutionResult> {
        self.execute_with_limits(code, self.limits)
    }

    pub fn execute_with_limits(&self, code: &str, limits: ResourceLimits) -> Result<ExecutionResult> {
        execute_request(&ExecutionRequest::new(code, self.paths.clone(), limits))
    }

    /// Run on tokio's blocking pool so async hosts suspend instead of block.
    #[cfg(feature = "async")]
    pub async fn execute_async(&self, code: &str) -> Result<ExecutionResult> {
        let request = ExecutionRequest::new(code, self.paths.clone(), self.limits);
        tokio::task::spawn_blocking(move || execute_request(&request))
            .await
            .map_err(|e| SandboxError::io("execution task failed", std::io::Error::other(e)))?
    }
}

/// Execute `code` once under the given runtime and interpreter module.
pub fn execute(
    code: &str,
    timeout: Option<Duration>,
    runtime_path: &Path,
    module_path: &Path,
) -> Result<ExecutionResult> {
    let limits = ResourceLimits {
        timeout,
        max_memory_mb: None,
    };
    execute_request(&ExecutionRequest::new(
        code,
        RuntimePaths::new(runtime_path, module_path),
        limits,
    ))
}

#[cfg(all(test, unix))]
pub(crate) mod test_support {
    //! Fake runtime honouring the `--dir=<scratch> <module> <script>` contract:
    //! it checks the arguments, then runs the script with `sh`.

    use super::*;
    use tempfile::TempDir;

    pub const FAKE_RUNTIME: &str = r#"#!/bin/sh
case "$1" in
  --dir=*) scratch="${1#--dir=}" ;;
  *) echo "fake-runtime: expected --dir=<path>, got: $1" >&2; exit 90 ;;
esac
[ "$#" -eq 3 ] || { echo "fake-runtime: expected 3 args, got $#" >&2; exit 91; }
[ -f "$2" ] || { echo "fake-runtime: module missing: $2" >&2; exit 92; }
[ "$(dirname "$3")" = "$scratch" ] || { echo "fake-runtime: script outside scratch dir" >&2; exit 93; }
[ "$(pwd -P)" = "$scratch" ] || { echo "fake-runtime: cwd is not the scratch dir" >&2; exit 94; }
export SAFEEVAL_SCRATCH="$scratch"
exec sh "$3"
"#;

    pub struct FakeRuntime {
        pub _dir: TempDir,
        pub paths: RuntimePaths,
    }

    pub fn fake_runtime() -> FakeRuntime {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let runtime = dir.path().join("wasmtime");
        std::fs::write(&runtime, FAKE_RUNTIME).unwrap();
        std::fs::set_permissions(&runtime, std::fs::Permissions::from_mode(0o755)).unwrap();
        let module = dir.path().join("rustpython.wasm");
        std::fs::write(&module, b"\0asm").unwrap();
        FakeRuntime {
            paths: RuntimePaths::new(runtime, module),
            _dir: dir,
        }
    }
}
