//! Stack state persistence
//!
//! One JSON file per stack records what previous runs provisioned. Entries
//! are keyed by logical image name, so re-running updates an entry in place
//! instead of adding a second one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::RegistryInfo;
use crate::domain::image::TagMutability;
use crate::error::StateError;

/// Current state file format version
pub const STATE_VERSION: u32 = 1;

/// Persisted record of one provisioned registry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryRecord {
    /// Resource name (e.g., "service-registry")
    pub resource: String,
    pub repository: String,
    pub registry_id: String,
    pub repository_url: String,
    pub tag_mutability: TagMutability,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persisted record of the last retag and push for one image
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_retag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pushed_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pushed_at: Option<DateTime<Utc>>,
}

/// Outputs exported for one logical image
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ImageOutputs {
    pub repository_name: String,
    pub repository_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StackState {
    pub version: u32,
    pub stack: String,
    #[serde(default)]
    pub registries: BTreeMap<String, RegistryRecord>,
    #[serde(default)]
    pub images: BTreeMap<String, ImageRecord>,
}

impl StackState {
    pub fn empty(stack: &str) -> Self {
        Self {
            version: STATE_VERSION,
            stack: stack.to_string(),
            registries: BTreeMap::new(),
            images: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.registries.is_empty() && self.images.is_empty()
    }

    /// Insert or update the registry record for a logical image
    pub fn record_registry(&mut self, image: &str, resource: &str, info: &RegistryInfo) {
        let now = Utc::now();
        let created_at = self
            .registries
            .get(image)
            .map(|r| r.created_at)
            .unwrap_or(now);

        self.registries.insert(
            image.to_string(),
            RegistryRecord {
                resource: resource.to_string(),
                repository: info.repository_name.clone(),
                registry_id: info.registry_id.clone(),
                repository_url: info.repository_url.clone(),
                tag_mutability: info.tag_mutability,
                created_at,
                updated_at: now,
            },
        );
    }

    pub fn record_retag(&mut self, image: &str, destination: &str) {
        self.images.entry(image.to_string()).or_default().last_retag =
            Some(destination.to_string());
    }

    pub fn record_push(&mut self, image: &str, destination: &str) {
        let record = self.images.entry(image.to_string()).or_default();
        record.pushed_image = Some(destination.to_string());
        record.pushed_at = Some(Utc::now());
    }

    pub fn last_retag(&self, image: &str) -> Option<&str> {
        self.images.get(image).and_then(|r| r.last_retag.as_deref())
    }

    pub fn pushed_image(&self, image: &str) -> Option<&str> {
        self.images.get(image).and_then(|r| r.pushed_image.as_deref())
    }

    /// Drop everything recorded for a logical image
    pub fn forget(&mut self, image: &str) {
        self.registries.remove(image);
        self.images.remove(image);
    }

    /// Per-image outputs: registry URL and the pushed image name
    pub fn outputs(&self) -> BTreeMap<String, ImageOutputs> {
        self.registries
            .iter()
            .map(|(image, registry)| {
                (
                    image.clone(),
                    ImageOutputs {
                        repository_name: registry.repository.clone(),
                        repository_url: registry.repository_url.clone(),
                        image_name: self.pushed_image(image).map(str::to_string),
                    },
                )
            })
            .collect()
    }
}

/// Loads and saves stack state under a state directory
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
    stack: String,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>, stack: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            stack: stack.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.stack))
    }

    /// Load state; a missing file is an empty stack
    pub async fn load(&self) -> Result<StackState, StateError> {
        let path = self.path();
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StackState::empty(&self.stack));
            }
            Err(source) => {
                return Err(StateError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        let state: StackState =
            serde_json::from_str(&content).map_err(|e| StateError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        if state.version != STATE_VERSION {
            return Err(StateError::Parse {
                path: path.display().to_string(),
                message: format!(
                    "unsupported state version {} (expected {})",
                    state.version, STATE_VERSION
                ),
            });
        }

        Ok(state)
    }

    /// Save state atomically (write to a temp file, then rename)
    pub async fn save(&self, state: &StackState) -> Result<(), StateError> {
        let path = self.path();
        let write_err = |source| StateError::Write {
            path: path.display().to_string(),
            source,
        };

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(write_err)?;

        let content = serde_json::to_string_pretty(state).map_err(|e| StateError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let tmp = tmp_path(&path);
        tokio::fs::write(&tmp, content).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(write_err)?;
        Ok(())
    }

    /// Remove the state file
    pub async fn clear(&self) -> Result<(), StateError> {
        let path = self.path();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StateError::Write {
                path: path.display().to_string(),
                source,
            }),
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
