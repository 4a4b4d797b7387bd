//! `safeeval eval` and `safeeval call`.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::io::Read;
use std::time::Duration;

use safeeval_sandbox::{
    CallRequest, CallResult, ExecutionBridge, ResourceLimits, RuntimeLocator, SandboxError,
};

use crate::cli::{CodeSource, RuntimeArgs};

/// Exit status for a run killed by the timeout (as coreutils `timeout`)
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Read code from the positional argument, `--file`, or stdin.
pub fn read_source(source: &CodeSource) -> Result<String> {
    if let Some(ref path) = source.file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read source file: {}", path.display()));
    }
    match source.code.as_deref() {
        Some(code) if code != "-" => Ok(code.to_string()),
        _ => {
            let mut s = String::new();
            std::io::stdin()
                .read_to_string(&mut s)
                .context("Failed to read source from stdin")?;
            Ok(s)
        }
    }
}

fn build_bridge(args: &RuntimeArgs) -> Result<ExecutionBridge> {
    let paths = RuntimeLocator::from_env()
        .with_runtime_override(args.runtime.clone())
        .with_module_override(args.module.clone())
        .resolve()?;
    let limits = ResourceLimits::from_env()
        .with_cli_overrides(args.timeout.map(Duration::from_secs), args.max_memory);
    Ok(ExecutionBridge::new(paths).with_limits(limits))
}

/// Map a child exit code onto something a shell can carry.
fn shell_exit_code(code: i32) -> i32 {
    if (0..=255).contains(&code) {
        code
    } else {
        1
    }
}

/// Timeouts become exit 124; every other error propagates.
fn timeout_exit(err: SandboxError) -> Result<i32> {
    match err {
        SandboxError::ExecutionTimeout { .. } => {
            eprintln!("Error: {}", err);
            Ok(TIMEOUT_EXIT_CODE)
        }
        other => Err(other.into()),
    }
}

/// `safeeval eval`
pub fn cmd_eval(source: &CodeSource, args: &RuntimeArgs) -> Result<i32> {
    let code = read_source(source)?;
    let bridge = build_bridge(args)?;

    let result = match bridge.execute(&code) {
        Ok(result) => result,
        Err(e) => return timeout_exit(e),
    };

    if args.json {
        println!("{}", serde_json::to_string(&result)?);
    } else {
        print!("{}", result.stdout);
        eprint!("{}", result.stderr);
    }
    Ok(shell_exit_code(result.exit_code))
}

/// Parse `--args` / `--kwargs` into a call request.
pub fn build_call_request(code: String, func: &str, args: &str, kwargs: &str) -> Result<CallRequest> {
    let args: Value = serde_json::from_str(args).context("--args is not valid JSON")?;
    let kwargs: Value = serde_json::from_str(kwargs).context("--kwargs is not valid JSON")?;
    let request = CallRequest::new(code, func)
        .with_serialized_args(&args)?
        .with_serialized_kwargs(&kwargs)?;
    Ok(request)
}

/// `safeeval call`
pub fn cmd_call(
    func: &str,
    call_args: &str,
    call_kwargs: &str,
    source: &CodeSource,
    args: &RuntimeArgs,
) -> Result<i32> {
    let request = build_call_request(read_source(source)?, func, call_args, call_kwargs)?;
    let bridge = build_bridge(args)?;

    let output = match bridge.call(&request) {
        Ok(output) => output,
        Err(e) => return timeout_exit(e),
    };

    if args.json {
        let record = json!({
            "result": output.result.value(),
            "no_result": output.result.is_no_result(),
            "stderr": output.stderr,
            "exit_code": output.exit_code,
        });
        println!("{}", record);
    } else {
        match output.result {
            CallResult::Value(ref v) => println!("{}", v),
            CallResult::NoResult => println!("<no result>"),
        }
        eprint!("{}", output.stderr);
    }
    Ok(shell_exit_code(output.exit_code))
}
