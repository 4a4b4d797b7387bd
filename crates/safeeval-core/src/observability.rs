//! Observability: tracing init and the JSONL audit log.
//!
//! Uses `config::ObservabilityConfig` for SAFEEVAL_QUIET, SAFEEVAL_LOG_LEVEL,
//! SAFEEVAL_LOG_JSON and SAFEEVAL_AUDIT_LOG. Logs go to stderr: stdout is
//! reserved for the sandboxed program's output.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use serde_json::json;
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::config::ObservabilityConfig;

static AUDIT_PATH: Mutex<Option<String>> = Mutex::new(None);

/// Initialize tracing. Call at process startup; later calls are no-ops.
/// When SAFEEVAL_QUIET=1, only WARN and above are logged.
pub fn init_tracing() {
    let cfg = ObservabilityConfig::from_env();
    let level = if cfg.quiet {
        "safeeval=warn".to_string()
    } else {
        cfg.log_level.clone()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    };
}

/// Override the audit log destination (`None` falls back to SAFEEVAL_AUDIT_LOG).
pub fn set_audit_path(path: Option<&Path>) {
    if let Ok(mut guard) = AUDIT_PATH.lock() {
        *guard = path.map(|p| p.to_string_lossy().to_string());
    }
}

fn get_audit_path() -> Option<String> {
    {
        let guard = AUDIT_PATH.lock().ok()?;
        if let Some(ref p) = *guard {
            return Some(p.clone());
        }
    }
    let path = ObservabilityConfig::from_env().audit_log.clone()?;
    if path.is_empty() {
        return None;
    }
    if let Some(parent) = Path::new(&path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    {
        let mut guard = AUDIT_PATH.lock().ok()?;
        *guard = Some(path.clone());
    }
    Some(path)
}

fn append_jsonl(path: &str, record: &serde_json::Value) {
    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(path) {
        if let Ok(line) = serde_json::to_string(record) {
            let _ = writeln!(f, "{}", line);
        }
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// SHA-256 of the submitted code, hex encoded. Audit records carry the hash,
/// never the code itself.
pub fn code_hash(code: &str) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(code.as_bytes()))
}

/// Audit: execution_started (right before spawn)
pub fn audit_execution_started(runtime: &Path, module: &Path, scratch_dir: &Path, code: &str) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": now(),
            "event": "execution_started",
            "runtime": runtime.display().to_string(),
            "module": module.display().to_string(),
            "scratch_dir": scratch_dir.display().to_string(),
            "code_len": code.len(),
            "code_hash": code_hash(code),
        });
        append_jsonl(&path, &record);
    }
}

/// Audit: execution_completed
pub fn audit_execution_completed(
    exit_code: i32,
    duration_ms: u64,
    stdout_len: usize,
    stderr_len: usize,
) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": now(),
            "event": "execution_completed",
            "exit_code": exit_code,
            "duration_ms": duration_ms,
            "stdout_len": stdout_len,
            "stderr_len": stderr_len,
            "success": exit_code == 0,
        });
        append_jsonl(&path, &record);
    }
}

/// Audit: execution_timeout (child was killed)
pub fn audit_execution_timeout(timeout_ms: u64, duration_ms: u64) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": now(),
            "event": "execution_timeout",
            "timeout_ms": timeout_ms,
            "duration_ms": duration_ms,
        });
        append_jsonl(&path, &record);
    }
}

/// Audit: call_decoded (`outcome` is "value", "no_result" or "decode_failure")
pub fn audit_call_decoded(func_name: &str, exit_code: i32, outcome: &str) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": now(),
            "event": "call_decoded",
            "func_name": func_name,
            "exit_code": exit_code,
            "outcome": outcome,
        });
        append_jsonl(&path, &record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_hash_is_stable_hex() {
        let h = code_hash("print(2+2)");
        assert_eq!(h.len(), 64);
        assert_eq!(h, code_hash("print(2+2)"));
        assert_ne!(h, code_hash("print(2+3)"));
    }

    #[test]
    fn test_audit_records_are_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("audit.jsonl");
        set_audit_path(Some(&log));

        audit_execution_started(
            Path::new("/opt/wasmtime"),
            Path::new("/opt/rustpython.wasm"),
            Path::new("/tmp/safeeval-x"),
            "print(1)",
        );
        audit_execution_completed(0, 12, 2, 0);
        set_audit_path(None);

        let content = std::fs::read_to_string(&log).unwrap();
        let events: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["event"], "execution_started");
        assert_eq!(events[0]["code_len"], 8);
        assert_eq!(events[1]["event"], "execution_completed");
        assert_eq!(events[1]["success"], true);
    }
}
