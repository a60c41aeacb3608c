//! In-memory registry provider and container runtime for tests
//!
//! Both fakes record every call as a short string (e.g.,
//! `"tag pulumi/service:1.2.3 <url>:1.2.3"`) so tests can assert on ordering
//! and on which side effects happened.

use base64::Engine;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::{
    AuthorizationToken, ContainerRuntime, EnsureOutcome, EnsuredRegistry, RegistryInfo,
    RegistryProvider,
};
use crate::domain::credentials::Credentials;
use crate::domain::image::{ImageReference, TagMutability};
use crate::error::ProviderError;

pub const REGISTRY_ID: &str = "123456789012";
pub const REGISTRY_HOST: &str = "123456789012.dkr.ecr.us-east-1.amazonaws.com";

/// Write an executable shell script that stands in for an external CLI
pub fn write_script(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.display().to_string()
}

fn failure(command: String) -> ProviderError {
    ProviderError::CommandFailed {
        command,
        code: Some(1),
        stderr: "injected failure".to_string(),
    }
}

/// Shared, ordered call log
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: String) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.calls().iter().position(|c| c.starts_with(prefix))
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

#[derive(Debug, Default)]
pub struct FakeRegistry {
    pub log: CallLog,
    registries: Mutex<HashMap<String, RegistryInfo>>,
    /// Decoded `username:password` returned (base64 encoded) as the token
    raw_token: Mutex<String>,
    fail_create: HashSet<String>,
    fail_delete: HashSet<String>,
    fail_token: bool,
}

impl FakeRegistry {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            raw_token: Mutex::new("AWS:password".to_string()),
            ..Default::default()
        }
    }

    pub fn with_raw_token(self, raw: &str) -> Self {
        *self.raw_token.lock().unwrap() = raw.to_string();
        self
    }

    pub fn failing_create(mut self, repository: &str) -> Self {
        self.fail_create.insert(repository.to_string());
        self
    }

    pub fn failing_delete(mut self, repository: &str) -> Self {
        self.fail_delete.insert(repository.to_string());
        self
    }

    pub fn failing_token(mut self) -> Self {
        self.fail_token = true;
        self
    }

    pub fn registry_count(&self) -> usize {
        self.registries.lock().unwrap().len()
    }

    pub fn has_registry(&self, repository: &str) -> bool {
        self.registries.lock().unwrap().contains_key(repository)
    }

    pub fn repository_url(repository: &str) -> String {
        format!("{}/{}", REGISTRY_HOST, repository)
    }
}

impl RegistryProvider for FakeRegistry {
    async fn ensure_registry(
        &self,
        repository: &str,
        mutability: TagMutability,
    ) -> Result<EnsuredRegistry, ProviderError> {
        self.log.push(format!("ensure_registry {}", repository));
        if self.fail_create.contains(repository) {
            return Err(failure(format!("create-repository {}", repository)));
        }

        let mut registries = self.registries.lock().unwrap();
        if let Some(existing) = registries.get_mut(repository) {
            let outcome = if existing.tag_mutability == mutability {
                EnsureOutcome::Unchanged
            } else {
                existing.tag_mutability = mutability;
                EnsureOutcome::Updated
            };
            return Ok(EnsuredRegistry {
                info: existing.clone(),
                outcome,
            });
        }

        let info = RegistryInfo {
            registry_id: REGISTRY_ID.to_string(),
            repository_name: repository.to_string(),
            repository_url: Self::repository_url(repository),
            tag_mutability: mutability,
        };
        registries.insert(repository.to_string(), info.clone());
        Ok(EnsuredRegistry {
            info,
            outcome: EnsureOutcome::Created,
        })
    }

    async fn authorization_token(
        &self,
        registry_id: &str,
    ) -> Result<AuthorizationToken, ProviderError> {
        self.log.push(format!("authorization_token {}", registry_id));
        if self.fail_token {
            return Err(failure("get-authorization-token".to_string()));
        }
        let raw = self.raw_token.lock().unwrap().clone();
        Ok(AuthorizationToken {
            token: base64::engine::general_purpose::STANDARD.encode(raw),
            proxy_endpoint: format!("https://{}", REGISTRY_HOST),
        })
    }

    async fn delete_registry(
        &self,
        repository: &str,
        _registry_id: &str,
    ) -> Result<bool, ProviderError> {
        self.log.push(format!("delete_registry {}", repository));
        if self.fail_delete.contains(repository) {
            return Err(failure(format!("delete-repository {}", repository)));
        }
        Ok(self.registries.lock().unwrap().remove(repository).is_some())
    }
}

#[derive(Debug, Default)]
pub struct FakeRuntime {
    pub log: CallLog,
    local_images: Mutex<HashSet<String>>,
    fail_pull: HashSet<String>,
    pub build_args: Mutex<Vec<BTreeMap<String, String>>>,
    pub logins: Mutex<Vec<Credentials>>,
}

impl FakeRuntime {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn failing_pull(mut self, reference: &str) -> Self {
        self.fail_pull.insert(reference.to_string());
        self
    }

    pub fn with_local_image(self, reference: &str) -> Self {
        self.local_images
            .lock()
            .unwrap()
            .insert(reference.to_string());
        self
    }
}

impl ContainerRuntime for FakeRuntime {
    async fn image_exists(&self, reference: &ImageReference) -> Result<bool, ProviderError> {
        Ok(self
            .local_images
            .lock()
            .unwrap()
            .contains(&reference.to_string()))
    }

    async fn pull(&self, reference: &ImageReference) -> Result<(), ProviderError> {
        self.log.push(format!("pull {}", reference));
        if self.fail_pull.contains(&reference.to_string()) {
            return Err(failure(format!("docker pull {}", reference)));
        }
        self.local_images
            .lock()
            .unwrap()
            .insert(reference.to_string());
        Ok(())
    }

    async fn tag(
        &self,
        source: &ImageReference,
        destination: &ImageReference,
    ) -> Result<(), ProviderError> {
        self.log.push(format!("tag {} {}", source, destination));
        self.local_images
            .lock()
            .unwrap()
            .insert(destination.to_string());
        Ok(())
    }

    async fn build(
        &self,
        context: &str,
        tag: &ImageReference,
        build_args: &BTreeMap<String, String>,
    ) -> Result<(), ProviderError> {
        self.log.push(format!("build {} {}", context, tag));
        self.build_args.lock().unwrap().push(build_args.clone());
        Ok(())
    }

    async fn login(&self, credentials: &Credentials) -> Result<(), ProviderError> {
        self.log.push(format!("login {}", credentials.server));
        self.logins.lock().unwrap().push(credentials.clone());
        Ok(())
    }

    async fn push(&self, reference: &ImageReference) -> Result<(), ProviderError> {
        self.log.push(format!("push {}", reference));
        Ok(())
    }

    async fn remove_image(&self, reference: &ImageReference) -> Result<(), ProviderError> {
        self.log.push(format!("remove_image {}", reference));
        self.local_images
            .lock()
            .unwrap()
            .remove(&reference.to_string());
        Ok(())
    }
}
