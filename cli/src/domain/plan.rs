//! Per-image provisioning pipeline declaration
//!
//! Each logical image gets exactly one chain:
//!
//! ```text
//! registry → credentials → pull → retag → push
//!                  │          └───────────↗ │
//!                  └────────────────────────┘
//! ```
//!
//! Push depends on retag *and* directly on pull and credentials, so it can
//! never race ahead of the local tag or push a stale image.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::{StackConfig, SOURCE_IMAGE_ARG};
use crate::domain::graph::{Resource, ResourceGraph, ResourceKind};
use crate::domain::image::ImageReference;
use crate::error::ProvisionError;

/// When a command resource re-runs on apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Trigger {
    /// Run on every apply
    #[default]
    Always,
    /// Run only when the rendered destination differs from the last run
    OnChange,
}

impl Trigger {
    /// Whether a command must run, given the destination recorded by the
    /// previous successful run
    pub fn should_run(&self, previous: Option<&str>, current: &str) -> bool {
        match self {
            Self::Always => true,
            Self::OnChange => previous != Some(current),
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Always => "always",
            Self::OnChange => "on-change",
        })
    }
}

/// The declared resources for one run
#[derive(Debug, Clone)]
pub struct Plan {
    pub image_tag: String,
    pub graph: ResourceGraph,
}

/// Declare the resource graph for every configured image
///
/// Fails with a configuration error before declaring anything when the tag
/// is missing or the configuration is invalid.
pub fn declare(config: &StackConfig) -> Result<Plan, ProvisionError> {
    let image_tag = config.require_image_tag()?.to_string();
    config.validate()?;

    let mut graph = ResourceGraph::new();
    for image in &config.images {
        declare_image(&mut graph, &image.name)?;
    }
    graph.validate()?;

    Ok(Plan { image_tag, graph })
}

fn declare_image(graph: &mut ResourceGraph, image: &str) -> Result<(), ProvisionError> {
    let registry = Resource::new(image, ResourceKind::Registry);
    let credentials = Resource::new(image, ResourceKind::Credentials).depends_on(&registry.id);
    let pull = Resource::new(image, ResourceKind::Pull).depends_on(&credentials.id);
    let retag = Resource::new(image, ResourceKind::Retag).depends_on(&pull.id);
    let push = Resource::new(image, ResourceKind::Push)
        .depends_on(&retag.id)
        .depends_on(&pull.id)
        .depends_on(&credentials.id);

    for resource in [registry, credentials, pull, retag, push] {
        graph.declare(resource)?;
    }
    Ok(())
}

/// Upstream reference pulled for local use
pub fn source_reference(repository: &str, image_tag: &str) -> ImageReference {
    ImageReference::new(repository, image_tag)
}

/// Fully qualified destination in the provisioned registry
pub fn destination_reference(repository_url: &str, image_tag: &str) -> ImageReference {
    ImageReference::new(repository_url, image_tag)
}

/// Arguments of the retag command: `docker tag <source> <destination>`
pub fn retag_args(source: &ImageReference, destination: &ImageReference) -> Vec<String> {
    vec![
        "tag".to_string(),
        source.to_string(),
        destination.to_string(),
    ]
}

/// Build arguments for the pass-through build
///
/// `SOURCE_IMAGE` always carries the destination name forward.
pub fn build_args(
    extra: &BTreeMap<String, String>,
    destination: &ImageReference,
) -> BTreeMap<String, String> {
    let mut args = extra.clone();
    args.insert(SOURCE_IMAGE_ARG.to_string(), destination.to_string());
    args
}
