//! Config command handler.

use datasync::config::DataSyncConfig;

/// Prints the effective configuration as TOML.
pub fn cmd_config(config: &DataSyncConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("# Effective configuration (file + environment)");
    print!("{}", config.to_toml()?);
    Ok(())
}
