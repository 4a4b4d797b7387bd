//! `safeeval install`: fetch the wasmtime runtime with the vendor's install script.

use anyhow::{Context, Result};
use std::io::BufRead;
use std::path::PathBuf;
use std::process::Command;

use safeeval_core::config::RuntimeConfig;
use safeeval_sandbox::{RuntimeLocator, SandboxError};

/// Vendor install script
pub const INSTALL_SCRIPT_URL: &str = "https://wasmtime.dev/install.sh";

const SUPPORTED_PLATFORM: &str = "linux";

#[derive(Debug, Clone)]
pub struct InstallOptions {
    pub locator: RuntimeLocator,
    /// Platform name as in `std::env::consts::OS`
    pub platform: String,
    /// Shell command run through `sh -c`
    pub install_command: String,
    /// Skip the confirmation prompt
    pub assume_yes: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        let cfg = RuntimeConfig::from_env();
        Self {
            locator: RuntimeLocator::from_config(&cfg),
            platform: std::env::consts::OS.to_string(),
            install_command: format!("curl -sSf {} | bash", INSTALL_SCRIPT_URL),
            assume_yes: cfg.auto_approve,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// A runtime was already resolvable; nothing was run
    AlreadyInstalled(PathBuf),
    Installed,
    /// The user declined the prompt
    Aborted,
}

/// Install the runtime unless one is already present.
///
/// `input` supplies the answer to the confirmation prompt. Failures carry a
/// [`SandboxError`] (`PlatformUnsupported`, `InstallFailed`) that callers can
/// downcast.
pub fn install_runtime(opts: &InstallOptions, input: &mut impl BufRead) -> Result<InstallOutcome> {
    if let Some(existing) = opts.locator.find_runtime() {
        eprintln!("wasmtime already installed at: {}", existing.display());
        return Ok(InstallOutcome::AlreadyInstalled(existing));
    }

    if opts.platform != SUPPORTED_PLATFORM {
        let hint = (opts.platform == "windows")
            .then(|| "You can use WSL (Windows Subsystem for Linux) on Windows.".to_string());
        return Err(SandboxError::PlatformUnsupported {
            platform: opts.platform.clone(),
            hint,
        }
        .into());
    }

    if !opts.assume_yes {
        eprintln!("This will install the `wasmtime` runtime by running the following in a shell:");
        eprintln!("  {}", opts.install_command);
        eprint!("You can also run it manually. Continue? [y/N] ");
        let mut answer = String::new();
        input
            .read_line(&mut answer)
            .context("Failed to read confirmation")?;
        if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            eprintln!("Installation aborted.");
            return Ok(InstallOutcome::Aborted);
        }
    }

    tracing::info!(command = %opts.install_command, "Installing wasmtime");
    eprintln!("$ {}", opts.install_command);
    let status = Command::new("sh")
        .arg("-c")
        .arg(&opts.install_command)
        .status()
        .with_context(|| format!("Failed to run install command: {}", opts.install_command))?;

    if !status.success() {
        return Err(SandboxError::InstallFailed {
            status: status.to_string(),
        }
        .into());
    }

    eprintln!("✓ wasmtime installed. You may need to restart your shell for PATH changes to take effect.");
    Ok(InstallOutcome::Installed)
}
