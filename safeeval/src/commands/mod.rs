//! Subcommand handlers. Each returns the process exit code.

pub mod execute;
pub mod locate;
