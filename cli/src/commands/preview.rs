use anyhow::{Context, Result};
use colored::Colorize;

use crate::config::StackConfig;
use crate::domain::graph::{Resource, ResourceKind};
use crate::domain::plan::{self, build_args, destination_reference, retag_args, source_reference};
use crate::infrastructure::docker::build_command_args;
use crate::infrastructure::{StackState, StateStore};
use crate::ui;

/// Render what applying a resource would do
///
/// Registry URLs come from state when a previous run recorded them; otherwise
/// a `<image-registry.repositoryUrl>` placeholder is shown.
pub fn describe_action(
    config: &StackConfig,
    image_tag: &str,
    resource: &Resource,
    state: &StackState,
) -> String {
    let Some(image) = config.image(&resource.image) else {
        return format!("unknown image {}", resource.image);
    };

    let repository_url = state
        .registries
        .get(&image.name)
        .map(|r| r.repository_url.clone())
        .unwrap_or_else(|| format!("<{}-registry.repositoryUrl>", image.name));
    let source = source_reference(&image.repository, image_tag);
    let destination = destination_reference(&repository_url, image_tag);

    match resource.kind {
        ResourceKind::Registry => format!(
            "ensure registry {} (tags {})",
            image.repository, image.tag_mutability
        ),
        ResourceKind::Credentials => format!(
            "resolve credentials for {}-registry.registryId",
            image.name
        ),
        ResourceKind::Pull => format!("docker pull {} (if not present)", source),
        ResourceKind::Retag => format!(
            "docker {} [trigger: {}]",
            retag_args(&source, &destination).join(" "),
            config.triggers.retag
        ),
        ResourceKind::Push => {
            let args = build_args(&config.build_args, &destination);
            format!(
                "docker {} && docker login && docker push {} [trigger: {}]",
                build_command_args(&config.build_context, &destination, &args).join(" "),
                destination,
                config.triggers.push
            )
        }
    }
}

pub async fn execute(
    config_path: Option<String>,
    state_dir: String,
    image_tag: Option<String>,
) -> Result<()> {
    ui::print_header("Registry Mirror - Preview");

    let config = super::load_config(config_path.as_deref(), image_tag)?;
    let declared = plan::declare(&config)?;
    let state = StateStore::new(state_dir, config.stack.clone())
        .load()
        .await
        .context("Failed to load stack state")?;

    for resource in declared
        .graph
        .topological_order()
        .context("Invalid resource graph")?
    {
        println!("{}", resource.id.as_str().bright_white().bold());
        if !resource.depends_on.is_empty() {
            let deps: Vec<&str> = resource.depends_on.iter().map(|d| d.as_str()).collect();
            println!("    depends on: {}", deps.join(", "));
        }
        println!(
            "    {}",
            describe_action(&config, &declared.image_tag, resource, &state)
        );
    }
    println!();

    ui::print_info(&format!(
        "{} resources across {} images at tag {}",
        declared.graph.len(),
        config.images.len(),
        declared.image_tag
    ));
    Ok(())
}
