//! # Stack Configuration
//!
//! A stack is one YAML file describing which images are mirrored, plus the
//! image tag to mirror. The tag can be overridden from the command line or
//! the `IMAGE_TAG` environment variable.
//!
//! ## Example
//!
//! ```yaml
//! stack: production
//! image_tag: "1.2.3"
//! build_context: ./dummy_docker
//! triggers:
//!   retag: always
//!   push: on-change
//! images:
//!   - name: service
//!     repository: pulumi/service
//!     tag_mutability: MUTABLE
//! ```
//!
//! When no file exists, the default `service`, `ui` and `migrations` images
//! are used.

mod registry;
pub mod validation;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::domain::plan::Trigger;
use crate::error::ConfigError;

pub use registry::ImageConfig;

/// Default configuration file, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "registry-mirror.yaml";

/// Build argument that carries the destination image name into the build
pub const SOURCE_IMAGE_ARG: &str = "SOURCE_IMAGE";

/// Complete stack configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    /// Stack name, used for the state file
    #[serde(default = "default_stack")]
    pub stack: String,

    /// Tag to mirror. Required before any resource is declared.
    #[serde(default, alias = "imageTag")]
    pub image_tag: Option<String>,

    /// Local build context for the pass-through build
    #[serde(default = "default_build_context")]
    pub build_context: String,

    /// Extra build arguments. `SOURCE_IMAGE` is always set to the destination.
    #[serde(default)]
    pub build_args: BTreeMap<String, String>,

    /// When command resources re-run
    #[serde(default)]
    pub triggers: TriggerConfig,

    /// Logical images to mirror
    #[serde(default = "registry::default_images")]
    pub images: Vec<ImageConfig>,
}

/// Re-run policy for the retag and push commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TriggerConfig {
    #[serde(default)]
    pub retag: Trigger,

    #[serde(default)]
    pub push: Trigger,
}

fn default_stack() -> String {
    "default".to_string()
}

fn default_build_context() -> String {
    "./dummy_docker".to_string()
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            stack: default_stack(),
            image_tag: None,
            build_context: default_build_context(),
            build_args: BTreeMap::new(),
            triggers: TriggerConfig::default(),
            images: registry::default_images(),
        }
    }
}

impl StackConfig {
    /// Load configuration
    ///
    /// An explicitly given path must exist. Without one, `registry-mirror.yaml`
    /// in the working directory is used when present, otherwise the defaults.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from_path(Path::new(path)),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::load_from_path(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
            message: format!("{}: {}", path.display(), e),
        })?;

        Self::from_yaml(&content).map_err(|e| match e {
            ConfigError::ParseError { message } => ConfigError::ParseError {
                message: format!("{}: {}", path.display(), message),
            },
            other => other,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
    }

    /// Apply a command line / environment tag override
    pub fn with_image_tag(mut self, image_tag: Option<String>) -> Self {
        if image_tag.is_some() {
            self.image_tag = image_tag;
        }
        self
    }

    /// The configured tag; an absent or blank tag is a configuration error
    pub fn require_image_tag(&self) -> Result<&str, ConfigError> {
        match self.image_tag.as_deref().map(str::trim) {
            Some(tag) if !tag.is_empty() => Ok(tag),
            _ => Err(ConfigError::MissingField {
                field: "imageTag".to_string(),
            }),
        }
    }

    /// Validate everything except the tag, which `require_image_tag` covers
    pub fn validate(&self) -> Result<(), ConfigError> {
        use validation::{validate_image_tag, validate_name, validate_repository_name};

        validate_name(&self.stack, "stack")?;

        if let Some(tag) = self.image_tag.as_deref().map(str::trim) {
            if !tag.is_empty() {
                validate_image_tag(tag, "imageTag")?;
            }
        }

        if self.build_context.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "build_context".to_string(),
                value: "\"\" (cannot be empty)".to_string(),
            });
        }

        if self.images.is_empty() {
            return Err(ConfigError::MissingField {
                field: "images".to_string(),
            });
        }

        let mut names = HashSet::new();
        let mut repositories = HashSet::new();
        for image in &self.images {
            validate_name(&image.name, "images[].name")?;
            validate_repository_name(&image.repository, "images[].repository")?;

            if !names.insert(image.name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "images[].name".to_string(),
                    value: format!("{:?} (declared more than once)", image.name),
                });
            }
            if !repositories.insert(image.repository.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "images[].repository".to_string(),
                    value: format!("{:?} (declared more than once)", image.repository),
                });
            }
        }

        if self.build_args.contains_key(SOURCE_IMAGE_ARG) {
            return Err(ConfigError::InvalidValue {
                field: "build_args".to_string(),
                value: format!("{} is always set to the destination image", SOURCE_IMAGE_ARG),
            });
        }

        Ok(())
    }

    pub fn image(&self, name: &str) -> Option<&ImageConfig> {
        self.images.iter().find(|i| i.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::image::TagMutability;

    #[test]
    fn test_default_config() {
        let config = StackConfig::default();
        assert_eq!(config.stack, "default");
        assert_eq!(config.build_context, "./dummy_docker");
        let names: Vec<&str> = config.images.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["service", "ui", "migrations"]);
        assert!(config
            .images
            .iter()
            .all(|i| i.tag_mutability == TagMutability::Mutable));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_tag_is_configuration_error() {
        let config = StackConfig::default();
        let err = config.require_image_tag().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { ref field } if field == "imageTag"));

        let blank = StackConfig::default().with_image_tag(Some("  ".to_string()));
        assert!(blank.require_image_tag().is_err());
    }

    #[test]
    fn test_tag_override() {
        let config = StackConfig::from_yaml("image_tag: \"1.0.0\"").unwrap();
        assert_eq!(config.require_image_tag().unwrap(), "1.0.0");

        let overridden = config.clone().with_image_tag(Some("2.0.0".to_string()));
        assert_eq!(overridden.require_image_tag().unwrap(), "2.0.0");

        let kept = config.with_image_tag(None);
        assert_eq!(kept.require_image_tag().unwrap(), "1.0.0");
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
stack: production
imageTag: "1.2.3"
build_context: ./ctx
build_args:
  BASE: alpine
triggers:
  retag: always
  push: on-change
images:
  - name: service
    repository: pulumi/service
  - name: ui
    repository: pulumi/console
    tag_mutability: IMMUTABLE
"#;
        let config = StackConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.stack, "production");
        assert_eq!(config.require_image_tag().unwrap(), "1.2.3");
        assert_eq!(config.build_args.get("BASE").map(String::as_str), Some("alpine"));
        assert_eq!(config.triggers.retag, Trigger::Always);
        assert_eq!(config.triggers.push, Trigger::OnChange);
        assert_eq!(config.images.len(), 2);
        assert_eq!(
            config.image("ui").unwrap().tag_mutability,
            TagMutability::Immutable
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_images_rejected() {
        let yaml = r#"
images:
  - name: service
    repository: pulumi/service
  - name: service
    repository: pulumi/other
"#;
        let config = StackConfig::from_yaml(yaml).unwrap();
        assert!(config.validate().is_err());

        let yaml = r#"
images:
  - name: a
    repository: pulumi/service
  - name: b
    repository: pulumi/service
"#;
        let config = StackConfig::from_yaml(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_source_image_build_arg_reserved() {
        let mut config = StackConfig::default();
        config
            .build_args
            .insert(SOURCE_IMAGE_ARG.to_string(), "x".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_yaml() {
        let err = StackConfig::from_yaml("images: [").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_explicit_missing_file() {
        let err = StackConfig::load(Some("/nonexistent/registry-mirror.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.yaml");
        std::fs::write(&path, "stack: staging\nimage_tag: \"9\"\n").unwrap();
        let config = StackConfig::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.stack, "staging");
        assert_eq!(config.images.len(), 3);
    }
}
