use anyhow::Result;

use crate::infrastructure::{DockerCli, EcrCli, StateStore};
use crate::services::stack_service::destroy_failures;
use crate::services::StackService;
use crate::tools::{self, AWS};
use crate::ui;

pub async fn execute(
    config_path: Option<String>,
    state_dir: String,
    yes: bool,
    region: Option<String>,
    profile: Option<String>,
) -> Result<()> {
    ui::print_header("Registry Mirror - Destroy");

    let config = super::load_config(config_path.as_deref(), None)?;
    let store = StateStore::new(state_dir, config.stack.clone());

    if !yes {
        ui::print_warning(&format!(
            "This force-deletes every registry recorded in {}, including its images",
            store.path().display()
        ));
        anyhow::bail!("Refusing to destroy stack '{}' without --yes", config.stack);
    }

    tools::require_tool(AWS)?;

    let service = StackService::new(
        config,
        EcrCli::new().with_region(region).with_profile(profile),
        DockerCli::new(),
        store,
    );
    let report = service.destroy().await?;

    for repository in &report.deleted {
        ui::print_success(&format!("Deleted {}", repository));
    }
    for (repository, error) in &report.failed {
        ui::print_error(&format!("Failed to delete {}: {}", repository, error));
    }

    if let Some(err) = destroy_failures(&report) {
        return Err(err.into());
    }

    if report.deleted.is_empty() {
        ui::print_info("Nothing to destroy");
    }
    Ok(())
}
