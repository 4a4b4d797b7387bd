//! Call Marshaler: turns a function-call request into one self-contained
//! source unit, runs it through a backend, and decodes stdout back into a
//! typed result.
//!
//! Arguments travel as JSON text embedded in the source. Each payload is
//! emitted as a JSON string literal, which is also a valid double-quoted
//! Python string literal: quotes, backslashes and control characters are all
//! escaped, so no argument value can close the literal early.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use safeeval_core::observability;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Result, SandboxError};
use crate::runner::{ExecutionBridge, ExecutionResult, ResourceLimits, RuntimePaths};
use crate::sandbox_backend::SandboxBackend;

pub const NO_RESULT_MESSAGE: &str = "No result returned from function call.";

/// Prefix of the diagnostic appended to stderr when stdout is not JSON
pub const DECODE_ERROR_PREFIX: &str = "error parsing output: ";

/// Outcome of a call. `Value(Value::Null)` is a legitimate `None` return;
/// `NoResult` means nothing decodable came back.
#[derive(Debug, Clone, PartialEq)]
pub enum CallResult {
    Value(Value),
    NoResult,
}

impl CallResult {
    pub fn is_no_result(&self) -> bool {
        matches!(self, Self::NoResult)
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            Self::NoResult => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Value(v) => Some(v),
            Self::NoResult => None,
        }
    }
}

impl fmt::Display for CallResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{}", v),
            Self::NoResult => f.write_str(NO_RESULT_MESSAGE),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    /// Source defining `func_name`, inserted verbatim
    pub code: String,
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
    pub func_name: String,
}

impl CallRequest {
    pub fn new(code: impl Into<String>, func_name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            args: Vec::new(),
            kwargs: Map::new(),
            func_name: func_name.into(),
        }
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_kwargs(mut self, kwargs: Map<String, Value>) -> Self {
        self.kwargs = kwargs;
        self
    }

    /// Positional arguments from any serializable value that encodes as a
    /// JSON array (a tuple, `Vec`, ...).
    pub fn with_serialized_args<T: Serialize + ?Sized>(self, args: &T) -> Result<Self> {
        match to_json(args, "args")? {
            Value::Array(items) => Ok(self.with_args(items)),
            other => Err(SandboxError::InvalidArguments(format!(
                "args must encode as a JSON array, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Keyword arguments from any serializable value that encodes as a JSON object.
    pub fn with_serialized_kwargs<T: Serialize + ?Sized>(self, kwargs: &T) -> Result<Self> {
        match to_json(kwargs, "kwargs")? {
            Value::Object(map) => Ok(self.with_kwargs(map)),
            other => Err(SandboxError::InvalidArguments(format!(
                "kwargs must encode as a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T, what: &str) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| SandboxError::InvalidArguments(format!("{} are not JSON-representable: {}", what, e)))
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallOutput {
    pub result: CallResult,
    pub stdout: String,
    /// Runtime stderr, passed through, plus a decode diagnostic if any
    pub stderr: String,
    pub exit_code: i32,
}

/// JSON text of `value`, quoted as a string literal.
fn quoted_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let text = serde_json::to_string(value)
        .map_err(|e| SandboxError::InvalidArguments(format!("failed to encode call payload: {}", e)))?;
    serde_json::to_string(&text)
        .map_err(|e| SandboxError::InvalidArguments(format!("failed to quote call payload: {}", e)))
}

/// Build the source unit: the caller's code verbatim, then the call trailer.
pub fn synthesize_source(request: &CallRequest) -> Result<String> {
    if request.func_name.trim().is_empty() {
        return Err(SandboxError::InvalidArguments(
            "function name must not be empty".to_string(),
        ));
    }

    let args = quoted_json(&request.args)?;
    let kwargs = quoted_json(&request.kwargs)?;
    let name = serde_json::to_string(&request.func_name)
        .map_err(|e| SandboxError::InvalidArguments(format!("failed to quote function name: {}", e)))?;

    let mut source = String::with_capacity(request.code.len() + args.len() + kwargs.len() + 512);
    source.push_str(&request.code);
    if !request.code.ends_with('\n') {
        source.push('\n');
    }
    source.push_str(&format!(
        r#"
# ---- safeeval call trailer ----
import json as __safeeval_json
__safeeval_args = __safeeval_json.loads({args})
__safeeval_kwargs = __safeeval_json.loads({kwargs})
__safeeval_result = globals()[{name}](*__safeeval_args, **__safeeval_kwargs)
print(__safeeval_json.dumps(__safeeval_result, allow_nan=False))
"#
    ));
    Ok(source)
}

/// Decode a finished execution into a call output.
///
/// Parsing is attempted only for exit code 0 with non-empty stdout; anything
/// else is `NoResult`. A parse failure is also `NoResult`, with
/// `"error parsing output: <cause>"` appended to stderr.
pub fn decode_output(execution: ExecutionResult) -> CallOutput {
    let ExecutionResult {
        stdout,
        mut stderr,
        exit_code,
    } = execution;

    let result = if exit_code == 0 && !stdout.is_empty() {
        match serde_json::from_str::<Value>(&stdout) {
            Ok(v) => CallResult::Value(v),
            Err(e) => {
                stderr.push('\n');
                stderr.push_str(DECODE_ERROR_PREFIX);
                stderr.push_str(&e.to_string());
                CallResult::NoResult
            }
        }
    } else {
        CallResult::NoResult
    };

    CallOutput {
        result,
        stdout,
        stderr,
        exit_code,
    }
}

/// Run a call on any backend.
pub fn call_with<B: SandboxBackend + ?Sized>(
    backend: &B,
    request: &CallRequest,
    limits: ResourceLimits,
) -> Result<CallOutput> {
    let source = synthesize_source(request)?;
    tracing::debug!(
        backend = backend.name(),
        func_name = %request.func_name,
        args = request.args.len(),
        kwargs = request.kwargs.len(),
        "Dispatching call"
    );

    let execution = backend.execute(&source, limits)?;
    let decode_attempted = execution.exit_code == 0 && !execution.stdout.is_empty();
    let output = decode_output(execution);

    let outcome = match (&output.result, decode_attempted) {
        (CallResult::Value(_), _) => "value",
        (CallResult::NoResult, true) => "decode_failure",
        (CallResult::NoResult, false) => "no_result",
    };
    observability::audit_call_decoded(&request.func_name, output.exit_code, outcome);
    Ok(output)
}

impl ExecutionBridge {
    /// Call a function with the bridge's default limits.
    pub fn call(&self, request: &CallRequest) -> Result<CallOutput> {
        call_with(self, request, self.limits())
    }

    #[cfg(feature = "async")]
    pub async fn call_async(&self, request: &CallRequest) -> Result<CallOutput> {
        let bridge = self.clone();
        let request = request.clone();
        tokio::task::spawn_blocking(move || bridge.call(&request))
            .await
            .map_err(|e| SandboxError::io("call task failed", std::io::Error::other(e)))?
    }
}

/// Call `func_name(*args, **kwargs)` defined by `code` under the given
/// runtime and interpreter module.
pub fn call(
    code: &str,
    args: Vec<Value>,
    kwargs: Map<String, Value>,
    func_name: &str,
    timeout: Option<Duration>,
    runtime_path: &Path,
    module_path: &Path,
) -> Result<CallOutput> {
    let request = CallRequest::new(code, func_name)
        .with_args(args)
        .with_kwargs(kwargs);
    let limits = ResourceLimits {
        timeout,
        max_memory_mb: None,
    };
    let bridge = ExecutionBridge::new(RuntimePaths::new(runtime_path, module_path));
    call_with(&bridge, &request, limits)
}
