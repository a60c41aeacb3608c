//! Applies pipeline resources against a registry provider and container runtime
//!
//! Runtime outputs (registry id and URL) flow from the registry resource to
//! its dependents through an in-memory map. The engine guarantees a
//! dependent only runs after its registry succeeded, so a missing entry is a
//! graph error rather than a provider failure.

use std::collections::HashMap;
use std::sync::Mutex;
use tracing::info;

use super::credentials::CredentialResolver;
use super::engine::{ApplyStatus, ResourceApplier};
use crate::config::{ImageConfig, StackConfig};
use crate::domain::graph::{Resource, ResourceKind};
use crate::domain::plan::{build_args, destination_reference, source_reference};
use crate::error::{ConfigError, GraphError, ProvisionError};
use crate::infrastructure::{
    ContainerRuntime, EnsureOutcome, RegistryInfo, RegistryProvider, StackState,
};

pub struct Provisioner<'a, P, C> {
    config: &'a StackConfig,
    image_tag: &'a str,
    provider: &'a P,
    runtime: &'a C,
    /// State as loaded before the run; trigger decisions compare against it
    previous: StackState,
    state: Mutex<StackState>,
    registries: Mutex<HashMap<String, RegistryInfo>>,
}

impl<'a, P: RegistryProvider, C: ContainerRuntime> Provisioner<'a, P, C> {
    pub fn new(
        config: &'a StackConfig,
        image_tag: &'a str,
        provider: &'a P,
        runtime: &'a C,
        state: StackState,
    ) -> Self {
        Self {
            config,
            image_tag,
            provider,
            runtime,
            previous: state.clone(),
            state: Mutex::new(state),
            registries: Mutex::new(HashMap::new()),
        }
    }

    /// State updated with everything this run provisioned
    pub fn into_state(self) -> StackState {
        self.state
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn image(&self, name: &str) -> Result<&'a ImageConfig, ProvisionError> {
        self.config.image(name).ok_or_else(|| {
            ConfigError::InvalidValue {
                field: "images[].name".to_string(),
                value: format!("{:?} (not configured)", name),
            }
            .into()
        })
    }

    fn registry(&self, resource: &Resource) -> Result<RegistryInfo, ProvisionError> {
        self.lock_registries()
            .get(&resource.image)
            .cloned()
            .ok_or_else(|| {
                GraphError::UnknownDependency {
                    resource: resource.id.to_string(),
                    dependency: format!("{}-registry", resource.image),
                }
                .into()
            })
    }

    fn lock_registries(&self) -> std::sync::MutexGuard<'_, HashMap<String, RegistryInfo>> {
        self.registries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, StackState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn apply_registry(&self, resource: &Resource) -> Result<ApplyStatus, ProvisionError> {
        let image = self.image(&resource.image)?;
        let ensured = self
            .provider
            .ensure_registry(&image.repository, image.tag_mutability)
            .await?;

        info!(
            "Registry {} at {}",
            ensured.info.repository_name, ensured.info.repository_url
        );
        self.lock_state()
            .record_registry(&image.name, resource.id.as_str(), &ensured.info);
        self.lock_registries()
            .insert(image.name.clone(), ensured.info);

        Ok(match ensured.outcome {
            EnsureOutcome::Created => ApplyStatus::Created,
            EnsureOutcome::Updated => ApplyStatus::Updated,
            EnsureOutcome::Unchanged => ApplyStatus::Unchanged,
        })
    }

    async fn apply_credentials(&self, resource: &Resource) -> Result<ApplyStatus, ProvisionError> {
        let registry = self.registry(resource)?;
        let credentials = CredentialResolver::new(self.provider)
            .resolve(&registry.registry_id)
            .await?;
        info!(
            "Credentials for {} resolve for {}",
            registry.repository_name, credentials.server
        );
        Ok(ApplyStatus::Ran)
    }

    async fn apply_pull(&self, resource: &Resource) -> Result<ApplyStatus, ProvisionError> {
        let image = self.image(&resource.image)?;
        let source = source_reference(&image.repository, self.image_tag);

        if self.runtime.image_exists(&source).await? {
            info!("{} already present locally", source);
            return Ok(ApplyStatus::Unchanged);
        }

        self.runtime.pull(&source).await?;
        Ok(ApplyStatus::Created)
    }

    async fn apply_retag(&self, resource: &Resource) -> Result<ApplyStatus, ProvisionError> {
        let image = self.image(&resource.image)?;
        let registry = self.registry(resource)?;
        let source = source_reference(&image.repository, self.image_tag);
        let destination = destination_reference(&registry.repository_url, self.image_tag);
        let rendered = destination.to_string();

        // The push builds from the local destination tag, so a recorded retag
        // only counts while the daemon still has it
        if !self
            .config
            .triggers
            .retag
            .should_run(self.previous.last_retag(&image.name), &rendered)
            && self.runtime.image_exists(&destination).await?
        {
            info!("{} already tagged as {}", source, rendered);
            return Ok(ApplyStatus::NotTriggered);
        }

        self.runtime.tag(&source, &destination).await?;
        self.lock_state().record_retag(&image.name, &rendered);
        Ok(ApplyStatus::Ran)
    }

    async fn apply_push(&self, resource: &Resource) -> Result<ApplyStatus, ProvisionError> {
        let image = self.image(&resource.image)?;
        let registry = self.registry(resource)?;
        let destination = destination_reference(&registry.repository_url, self.image_tag);
        let rendered = destination.to_string();

        if !self
            .config
            .triggers
            .push
            .should_run(self.previous.pushed_image(&image.name), &rendered)
        {
            info!("{} already pushed", rendered);
            return Ok(ApplyStatus::NotTriggered);
        }

        // Resolved again rather than reused from the credentials resource
        let credentials = CredentialResolver::new(self.provider)
            .resolve(&registry.registry_id)
            .await?;

        let args = build_args(&self.config.build_args, &destination);
        self.runtime
            .build(&self.config.build_context, &destination, &args)
            .await?;
        self.runtime.login(&credentials).await?;
        self.runtime.push(&destination).await?;

        self.lock_state().record_push(&image.name, &rendered);
        Ok(ApplyStatus::Ran)
    }
}

impl<'a, P: RegistryProvider, C: ContainerRuntime> ResourceApplier for Provisioner<'a, P, C> {
    async fn apply(&self, resource: &Resource) -> Result<ApplyStatus, ProvisionError> {
        match resource.kind {
            ResourceKind::Registry => self.apply_registry(resource).await,
            ResourceKind::Credentials => self.apply_credentials(resource).await,
            ResourceKind::Pull => self.apply_pull(resource).await,
            ResourceKind::Retag => self.apply_retag(resource).await,
            ResourceKind::Push => self.apply_push(resource).await,
        }
    }
}
