//! Registry configuration for mirrored images.

use serde::{Deserialize, Serialize};

use crate::domain::image::TagMutability;

/// One logical image and the registry it is mirrored into
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageConfig {
    /// Logical image name (e.g., "service", "ui", "migrations")
    pub name: String,

    /// Repository name, used both upstream and for the registry (e.g., "pulumi/service")
    pub repository: String,

    /// Tag mutability policy for the registry
    #[serde(default)]
    pub tag_mutability: TagMutability,
}

impl ImageConfig {
    pub fn new(name: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repository: repository.into(),
            tag_mutability: TagMutability::Mutable,
        }
    }
}

pub(super) fn default_images() -> Vec<ImageConfig> {
    vec![
        ImageConfig::new("service", "pulumi/service"),
        ImageConfig::new("ui", "pulumi/console"),
        ImageConfig::new("migrations", "pulumi/migrations"),
    ]
}
