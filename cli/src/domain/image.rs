//! Image naming types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a registry allows tags to be overwritten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TagMutability {
    #[default]
    Mutable,
    Immutable,
}

impl TagMutability {
    /// Value understood by the registry API
    pub fn as_api_str(&self) -> &'static str {
        match self {
            Self::Mutable => "MUTABLE",
            Self::Immutable => "IMMUTABLE",
        }
    }
}

impl fmt::Display for TagMutability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_api_str())
    }
}

/// A `repository:tag` image reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    pub repository: String,
    pub tag: String,
}

impl ImageReference {
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_display() {
        let reference = ImageReference::new("pulumi/service", "1.2.3");
        assert_eq!(reference.to_string(), "pulumi/service:1.2.3");
    }

    #[test]
    fn test_mutability_serde() {
        let parsed: TagMutability = serde_yaml::from_str("IMMUTABLE").unwrap();
        assert_eq!(parsed, TagMutability::Immutable);
        assert_eq!(TagMutability::default().as_api_str(), "MUTABLE");
    }
}
