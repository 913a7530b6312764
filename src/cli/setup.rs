use anyhow::Result;
use orchbox::infra::config::{DEFAULT_ORCHBOX_TOML_NAME, install_default_config};
use std::path::Path;
use tracing::info;

pub fn install(config_dir: &Path) -> Result<()> {
    info!("Preparing config in {:?}", config_dir);

    if install_default_config(config_dir)? {
        println!(
            "✅ Wrote {:?}. Adjust images and volumes as needed.",
            config_dir.join(DEFAULT_ORCHBOX_TOML_NAME)
        );
    } else {
        println!(
            "{} already exists in {:?}, left untouched",
            DEFAULT_ORCHBOX_TOML_NAME, config_dir
        );
    }

    Ok(())
}
