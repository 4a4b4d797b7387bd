use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// safeeval - run untrusted Python snippets inside a wasmtime + RustPython sandbox
#[derive(Parser, Debug)]
#[command(name = "safeeval")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Where the code comes from: positional argument, `--file`, or stdin (`-` or nothing).
#[derive(Args, Debug, Clone)]
pub struct CodeSource {
    /// Source code to run; `-` reads from stdin
    #[arg(value_name = "CODE", conflicts_with = "file")]
    pub code: Option<String>,

    /// Read source code from a file
    #[arg(long, short, value_name = "PATH")]
    pub file: Option<PathBuf>,
}

/// Runtime location and limits shared by `eval` and `call`.
#[derive(Args, Debug, Clone)]
pub struct RuntimeArgs {
    /// Execution timeout in seconds (default: SAFEEVAL_TIMEOUT_SECS or unlimited)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Resident memory ceiling in MB (default: SAFEEVAL_MAX_MEMORY_MB or unlimited)
    #[arg(long, value_name = "MB")]
    pub max_memory: Option<u64>,

    /// Path to the wasmtime executable (default: SAFEEVAL_RUNTIME_PATH, else searched)
    #[arg(long, value_name = "PATH")]
    pub runtime: Option<PathBuf>,

    /// Path to rustpython.wasm (default: SAFEEVAL_MODULE_PATH, else bundled)
    #[arg(long, value_name = "PATH")]
    pub module: Option<PathBuf>,

    /// Emit one JSON object instead of raw streams
    #[arg(long, default_value = "false")]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a code snippet and relay its stdout, stderr and exit status
    Eval {
        #[command(flatten)]
        source: CodeSource,

        #[command(flatten)]
        runtime: RuntimeArgs,
    },

    /// Call a function defined by the code with JSON arguments
    Call {
        /// Name of the function to call
        #[arg(long, value_name = "NAME")]
        func: String,

        /// Positional arguments as a JSON array
        #[arg(long, value_name = "JSON", default_value = "[]")]
        args: String,

        /// Keyword arguments as a JSON object
        #[arg(long, value_name = "JSON", default_value = "{}")]
        kwargs: String,

        #[command(flatten)]
        source: CodeSource,

        #[command(flatten)]
        runtime: RuntimeArgs,
    },

    /// Install the wasmtime runtime via the official install script
    Install {
        /// Skip the confirmation prompt (also SAFEEVAL_AUTO_APPROVE=1)
        #[arg(long, short, default_value = "false")]
        yes: bool,
    },

    /// Show the resolved runtime and interpreter module paths
    Locate {
        #[arg(long, value_name = "PATH")]
        runtime: Option<PathBuf>,

        #[arg(long, value_name = "PATH")]
        module: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_parses_flags() {
        let cli = Cli::try_parse_from([
            "safeeval", "eval", "print(1)", "--timeout", "5", "--max-memory", "64", "--json",
        ])
        .unwrap();
        match cli.command {
            Commands::Eval { source, runtime } => {
                assert_eq!(source.code.as_deref(), Some("print(1)"));
                assert_eq!(runtime.timeout, Some(5));
                assert_eq!(runtime.max_memory, Some(64));
                assert!(runtime.json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_call_defaults_and_conflicts() {
        let cli = Cli::try_parse_from(["safeeval", "call", "--func", "f", "--file", "a.py"]).unwrap();
        match cli.command {
            Commands::Call { func, args, kwargs, source, .. } => {
                assert_eq!(func, "f");
                assert_eq!(args, "[]");
                assert_eq!(kwargs, "{}");
                assert_eq!(source.file, Some(PathBuf::from("a.py")));
            }
            other => panic!("unexpected command {:?}", other),
        }

        assert!(Cli::try_parse_from(["safeeval", "eval", "x", "--file", "a.py"]).is_err());
        assert!(Cli::try_parse_from(["safeeval", "call", "def f(): pass"]).is_err());
    }
}
