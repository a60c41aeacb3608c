use anyhow::Result;
use tracing::info;

use crate::domain::plan;
use crate::infrastructure::{DockerCli, EcrCli, StateStore};
use crate::services::StackService;
use crate::tools::{self, AWS, DOCKER};
use crate::ui;

pub async fn execute(
    config_path: Option<String>,
    state_dir: String,
    image_tag: Option<String>,
    region: Option<String>,
    profile: Option<String>,
) -> Result<()> {
    ui::print_header("Registry Mirror - Up");

    let config = super::load_config(config_path.as_deref(), image_tag)?;

    // Configuration problems surface before any tool, state or provider is touched
    let declared = plan::declare(&config)?;
    info!("🏷️  Tag: {}", declared.image_tag);
    info!("📦 Images: {}", config.images.len());
    info!("🧩 Resources: {}", declared.graph.len());

    tools::require_tool(AWS)?;
    tools::require_tool(DOCKER)?;

    let store = StateStore::new(state_dir, config.stack.clone());
    info!("💾 State: {}", store.path().display());
    println!();

    let service = StackService::new(
        config,
        EcrCli::new().with_region(region).with_profile(profile),
        DockerCli::new(),
        store,
    );
    let report = service.up().await?;

    ui::print_run_summary(&report.run);
    ui::print_outputs(&report.outputs);

    if !report.run.is_success() {
        let failed: Vec<String> = report
            .run
            .failed()
            .map(|(id, _)| id.to_string())
            .collect();
        anyhow::bail!(
            "{} resource(s) failed: {} ({} dependent resource(s) skipped)",
            failed.len(),
            failed.join(", "),
            report.run.skipped_count()
        );
    }

    ui::print_success(&format!(
        "Stack '{}' is up to date at tag {}",
        service.config().stack,
        report.plan.image_tag
    ));
    Ok(())
}
