//! Child process supervision shared by every backend: output capture,
//! timeout enforcement, optional memory ceiling, and kill-and-reap.

use crate::error::{Result, SandboxError};
use std::io::Read;
use std::process::Child;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Poll interval for `try_wait` and memory sampling, in milliseconds
pub const POLL_INTERVAL_MS: u64 = 50;

/// Exit code reported when the child was terminated by a signal
pub const SIGNAL_EXIT_CODE: i32 = -1;

/// Complete captured output of a child that exited on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Get memory usage of a process in bytes (Linux version)
/// Uses /proc/<pid>/status to read VmRSS
#[cfg(target_os = "linux")]
pub fn get_process_memory(pid: u32) -> Option<u64> {
    let status = std::fs::read_to_string(format!("/proc/{}/status", pid)).ok()?;

    for line in status.lines() {
        if line.starts_with("VmRSS:") {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 2 {
                if let Ok(rss_kb) = parts[1].parse::<u64>() {
                    return Some(rss_kb * 1024);
                }
            }
            break;
        }
    }

    None
}

/// Get memory usage of a process in bytes (macOS version, via `ps -o rss=`)
#[cfg(target_os = "macos")]
pub fn get_process_memory(pid: u32) -> Option<u64> {
    use std::process::Command;

    let output = Command::new("ps")
        .args(["-o", "rss=", "-p", &pid.to_string()])
        .output()
        .ok()?;

    if output.status.success() {
        let rss_str = String::from_utf8_lossy(&output.stdout);
        // ps returns RSS in KB
        if let Ok(rss_kb) = rss_str.trim().parse::<u64>() {
            return Some(rss_kb * 1024);
        }
    }

    None
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub fn get_process_memory(_pid: u32) -> Option<u64> {
    None
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut p| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = p.read_to_end(&mut buf);
            buf
        })
    })
}

fn join_reader(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// Kill the child and everything in its process group, then reap it.
///
/// The bridge spawns the runtime as a process group leader, so the group id
/// equals the child's pid. If that fails (not a leader, already gone) the
/// child alone is killed.
pub fn kill_and_reap(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let pgid = Pid::from_raw(child.id() as i32);
        if let Err(e) = killpg(pgid, Signal::SIGKILL) {
            tracing::debug!(pid = child.id(), error = %e, "killpg failed, killing child only");
            let _ = child.kill();
        }
    }
    #[cfg(not(unix))]
    {
        let _ = child.kill();
    }
    if let Err(e) = child.wait() {
        tracing::warn!(pid = child.id(), error = %e, "Failed to reap killed child");
    }
}

/// Wait for a child process with an optional timeout and memory ceiling.
///
/// stdout/stderr are drained on background threads while the process runs;
/// a child writing more than the pipe buffer would otherwise block and never
/// exit. Both streams are returned complete, decoded lossily as UTF-8.
///
/// On timeout or memory overrun the child's process group is killed and
/// reaped before the error is returned, so no process outlives the call.
///
/// After the kill the reader threads are joined, which returns once every
/// holder of the pipes has exited. This assumes the child cannot move a
/// descendant out of its process group (wasmtime guests cannot fork); a
/// `setsid` descendant keeping the pipes open would hold the join open.
pub fn wait_with_timeout(
    child: &mut Child,
    timeout: Option<Duration>,
    memory_limit_bytes: Option<u64>,
) -> Result<ProcessOutput> {
    let start = Instant::now();
    let check_interval = Duration::from_millis(POLL_INTERVAL_MS);

    let stdout_handle = spawn_reader(child.stdout.take());
    let stderr_handle = spawn_reader(child.stderr.take());

    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let stdout = join_reader(stdout_handle);
                let stderr = join_reader(stderr_handle);
                return Ok(ProcessOutput {
                    stdout,
                    stderr,
                    exit_code: status.code().unwrap_or(SIGNAL_EXIT_CODE),
                });
            }
            Ok(None) => {}
            Err(e) => {
                kill_and_reap(child);
                let _ = join_reader(stdout_handle);
                let _ = join_reader(stderr_handle);
                return Err(SandboxError::io("failed to wait for child process", e));
            }
        }

        if let Some(timeout) = timeout {
            if start.elapsed() >= timeout {
                kill_and_reap(child);
                let _ = join_reader(stdout_handle);
                let _ = join_reader(stderr_handle);
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Child exceeded timeout and was killed"
                );
                return Err(SandboxError::ExecutionTimeout { timeout });
            }
        }

        if let Some(limit) = memory_limit_bytes {
            if let Some(memory) = get_process_memory(child.id()) {
                if memory > limit {
                    kill_and_reap(child);
                    let _ = join_reader(stdout_handle);
                    let _ = join_reader(stderr_handle);
                    return Err(SandboxError::MemoryLimitExceeded {
                        used_mb: memory / (1024 * 1024),
                        limit_mb: limit / (1024 * 1024),
                    });
                }
            }
        }

        let sleep_for = match timeout {
            Some(t) => check_interval.min(t.saturating_sub(start.elapsed())),
            None => check_interval,
        };
        thread::sleep(sleep_for.max(Duration::from_millis(1)));
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::CommandExt;
    use std::process::{Command, Stdio};

    fn sh(script: &str) -> Child {
        Command::new("sh")
            .arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .spawn()
            .unwrap()
    }

    #[test]
    fn test_captures_both_streams_and_exit_code() {
        let mut child = sh("echo out; echo err >&2; exit 3");
        let out = wait_with_timeout(&mut child, Some(Duration::from_secs(10)), None).unwrap();
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err\n");
        assert_eq!(out.exit_code, 3);
    }

    #[test]
    fn test_large_output_does_not_deadlock() {
        // ~1 MB, far past the pipe buffer
        let mut child = sh("i=0; while [ $i -lt 16384 ]; do echo 0123456789012345678901234567890123456789012345678901234567890123; i=$((i+1)); done");
        let out = wait_with_timeout(&mut child, Some(Duration::from_secs(60)), None).unwrap();
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.stdout.len(), 16384 * 65);
    }

    #[test]
    fn test_timeout_kills_whole_group() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("grandchild.pid");
        let script = format!(
            "sleep 30 & echo $! > '{}'; wait",
            pid_file.display()
        );
        let mut child = sh(&script);
        let start = Instant::now();
        let err = wait_with_timeout(&mut child, Some(Duration::from_millis(500)), None).unwrap_err();
        assert!(matches!(err, SandboxError::ExecutionTimeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(5));

        // The child itself is reaped
        assert!(child.try_wait().unwrap().is_some());

        // The background grandchild received SIGKILL with the group
        let grandchild: i32 = std::fs::read_to_string(&pid_file)
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        let mut gone = false;
        for _ in 0..100 {
            let alive = nix::sys::signal::kill(nix::unistd::Pid::from_raw(grandchild), None).is_ok();
            let zombie = std::fs::read_to_string(format!("/proc/{}/stat", grandchild))
                .map(|s| s.contains(") Z "))
                .unwrap_or(false);
            if !alive || zombie {
                gone = true;
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
        assert!(gone, "grandchild {} still running", grandchild);
    }

    #[test]
    fn test_no_timeout_waits_for_exit() {
        let mut child = sh("sleep 0.2; echo done");
        let out = wait_with_timeout(&mut child, None, None).unwrap();
        assert_eq!(out.stdout.trim(), "done");
    }

    #[test]
    fn test_signal_exit_is_negative_one() {
        let mut child = sh("kill -9 $$");
        let out = wait_with_timeout(&mut child, Some(Duration::from_secs(10)), None).unwrap();
        assert_eq!(out.exit_code, SIGNAL_EXIT_CODE);
    }
}
