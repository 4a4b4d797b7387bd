mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::io::Write;

use safeeval_commands::{install_runtime, InstallOptions};
use safeeval_core::{config, observability};

fn main() -> Result<()> {
    config::load_dotenv();
    observability::init_tracing();
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Eval { source, runtime } => commands::execute::cmd_eval(&source, &runtime)?,
        Commands::Call {
            func,
            args,
            kwargs,
            source,
            runtime,
        } => commands::execute::cmd_call(&func, &args, &kwargs, &source, &runtime)?,
        Commands::Install { yes } => {
            let mut opts = InstallOptions::default();
            opts.assume_yes |= yes;
            let stdin = std::io::stdin();
            let outcome = install_runtime(&opts, &mut stdin.lock())?;
            tracing::debug!(?outcome, "Install finished");
            0
        }
        Commands::Locate { runtime, module } => commands::locate::cmd_locate(runtime, module)?,
    };

    std::io::stdout().flush()?;
    std::io::stderr().flush()?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
