//! Command handlers, one module per subcommand

pub mod destroy;
pub mod outputs;
pub mod preview;
pub mod up;

use anyhow::{Context, Result};

use crate::config::StackConfig;

/// Load the stack configuration and apply a tag override
pub(crate) fn load_config(path: Option<&str>, image_tag: Option<String>) -> Result<StackConfig> {
    let config = StackConfig::load(path).context("Failed to load stack configuration")?;
    Ok(config.with_image_tag(image_tag))
}
