//! SandboxBackend trait: the seam between the Call Marshaler and whatever
//! actually runs code.
//!
//! The production backend is [`ExecutionBridge`] (wasmtime child process).
//! Anything that turns source text into an `ExecutionResult` can stand in,
//! which is how marshaling is tested without a runtime installed.

use crate::error::Result;
use crate::runner::{ExecutionBridge, ExecutionResult, ResourceLimits};

pub trait SandboxBackend: Send + Sync {
    /// Backend name for logging and diagnostics.
    fn name(&self) -> &str;

    /// Run `code` once. Non-zero exit is returned as data.
    fn execute(&self, code: &str, limits: ResourceLimits) -> Result<ExecutionResult>;
}

impl SandboxBackend for ExecutionBridge {
    fn name(&self) -> &str {
        "wasmtime"
    }

    fn execute(&self, code: &str, limits: ResourceLimits) -> Result<ExecutionResult> {
        self.execute_with_limits(code, limits)
    }
}
