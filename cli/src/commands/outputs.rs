use anyhow::{Context, Result};

use crate::infrastructure::{DockerCli, EcrCli, StateStore};
use crate::services::StackService;
use crate::ui;

pub async fn execute(config_path: Option<String>, state_dir: String, json: bool) -> Result<()> {
    let config = super::load_config(config_path.as_deref(), None)?;
    let store = StateStore::new(state_dir, config.stack.clone());

    // Reads recorded state only; neither CLI is invoked
    let service = StackService::new(config, EcrCli::new(), DockerCli::new(), store);
    let outputs = service
        .outputs()
        .await
        .context("Failed to load stack state")?;

    if json {
        let rendered =
            serde_json::to_string_pretty(&outputs).context("Failed to serialize outputs")?;
        println!("{}", rendered);
    } else {
        ui::print_header(&format!("Registry Mirror - Outputs ({})", service.config().stack));
        ui::print_outputs(&outputs);
    }

    Ok(())
}
