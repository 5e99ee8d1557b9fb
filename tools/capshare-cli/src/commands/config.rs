//! Print or initialize the configuration.

use capshare_common::config::{config_file_path, AppConfig};

pub fn run(config: &AppConfig, init: bool) -> anyhow::Result<()> {
    if init {
        let path = config_file_path();
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }
        let written = AppConfig::default().save()?;
        println!("Wrote default configuration to {}", written.display());
        return Ok(());
    }

    println!("# {}", config_file_path().display());
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
