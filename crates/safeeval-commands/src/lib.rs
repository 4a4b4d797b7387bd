//! Command implementations behind the `safeeval` CLI that go beyond a single
//! bridge call.

pub mod install;

pub use install::{install_runtime, InstallOptions, InstallOutcome};
