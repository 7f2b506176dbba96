//! `fdl config` – show where settings come from.

use anyhow::Result;
use fdl_core::config::{self, FdlConfig};

pub fn run_config(cfg: &FdlConfig) -> Result<()> {
    println!("config file: {}", config::config_path()?.display());
    if let Ok(path) = fdl_core::logging::log_path() {
        println!("log file:    {}", path.display());
    }
    println!();
    print!("{}", toml::to_string_pretty(cfg)?);
    Ok(())
}
