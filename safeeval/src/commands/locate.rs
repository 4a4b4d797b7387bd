//! `safeeval locate`

use anyhow::Result;
use std::path::PathBuf;

use safeeval_sandbox::RuntimeLocator;

/// Print what the locator resolves. Exit code 0 only when both files exist.
pub fn cmd_locate(runtime: Option<PathBuf>, module: Option<PathBuf>) -> Result<i32> {
    let locator = RuntimeLocator::from_env()
        .with_runtime_override(runtime)
        .with_module_override(module);

    let mut code = 0;
    match locator.require_runtime() {
        Ok(path) => println!("runtime: {}", path.display()),
        Err(e) => {
            println!("runtime: <missing>");
            eprintln!("{}", e);
            code = 1;
        }
    }
    match locator.resolve_module_path() {
        Ok(path) => println!("module:  {}", path.display()),
        Err(e) => {
            println!("module:  <missing>");
            eprintln!("{}", e);
            code = 1;
        }
    }
    Ok(code)
}
