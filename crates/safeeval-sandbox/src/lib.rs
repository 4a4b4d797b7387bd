//! Run untrusted code in a WASM runtime child process and call functions in it.
//!
//! - [`runner`]: the Execution Bridge (`execute`, `ExecutionBridge`)
//! - [`marshal`]: the Call Marshaler (`call`, `CallResult`)
//! - [`runtime_resolver`]: locating wasmtime and the interpreter module
//! - [`workspace`]: the per-call scratch directory
//! - [`common`]: child process supervision (timeout, kill, reap)

pub mod common;
pub mod error;
pub mod log;
pub mod marshal;
pub mod runner;
pub mod runtime_resolver;
pub mod sandbox_backend;
pub mod workspace;

pub use error::{Result, SandboxError};
pub use marshal::{call, CallOutput, CallRequest, CallResult};
pub use runner::{execute, ExecutionBridge, ExecutionRequest, ExecutionResult, ResourceLimits, RuntimePaths};
pub use runtime_resolver::RuntimeLocator;
pub use sandbox_backend::SandboxBackend;
