//! Infrastructure layer - external I/O adapters
//!
//! This module contains all code that interacts with external systems:
//! - Container registries (ECR via the AWS CLI)
//! - Container runtime (docker CLI)
//! - Stack state persistence
//!
//! The provisioning services only see the `RegistryProvider` and
//! `ContainerRuntime` traits, so tests can swap in in-memory fakes.

pub mod command;
pub mod docker;
pub mod ecr;
pub mod state;

#[cfg(test)]
pub mod testing;

use std::collections::BTreeMap;
use std::future::Future;

use crate::domain::credentials::Credentials;
use crate::domain::image::{ImageReference, TagMutability};
use crate::error::ProviderError;

// Re-export commonly used types
pub use docker::DockerCli;
pub use ecr::EcrCli;
pub use state::{StackState, StateStore};

/// A registry as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryInfo {
    pub registry_id: String,
    pub repository_name: String,
    pub repository_url: String,
    pub tag_mutability: TagMutability,
}

/// What `ensure_registry` had to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsuredRegistry {
    pub info: RegistryInfo,
    pub outcome: EnsureOutcome,
}

/// Short-lived registry authorization token
#[derive(Clone)]
pub struct AuthorizationToken {
    /// Base64 `username:password`
    pub token: String,
    /// Login endpoint for the registry
    pub proxy_endpoint: String,
}

/// Cloud registry API
pub trait RegistryProvider {
    /// Create the registry if missing, update its mutability if it drifted.
    /// Re-declaring the same name never creates a second registry.
    fn ensure_registry(
        &self,
        repository: &str,
        mutability: TagMutability,
    ) -> impl Future<Output = Result<EnsuredRegistry, ProviderError>>;

    /// Fetch a fresh authorization token for a registry id
    fn authorization_token(
        &self,
        registry_id: &str,
    ) -> impl Future<Output = Result<AuthorizationToken, ProviderError>>;

    /// Delete a registry and its images. Returns false if it did not exist.
    fn delete_registry(
        &self,
        repository: &str,
        registry_id: &str,
    ) -> impl Future<Output = Result<bool, ProviderError>>;
}

/// Local container runtime
pub trait ContainerRuntime {
    fn image_exists(
        &self,
        reference: &ImageReference,
    ) -> impl Future<Output = Result<bool, ProviderError>>;

    fn pull(&self, reference: &ImageReference) -> impl Future<Output = Result<(), ProviderError>>;

    fn tag(
        &self,
        source: &ImageReference,
        destination: &ImageReference,
    ) -> impl Future<Output = Result<(), ProviderError>>;

    fn build(
        &self,
        context: &str,
        tag: &ImageReference,
        build_args: &BTreeMap<String, String>,
    ) -> impl Future<Output = Result<(), ProviderError>>;

    fn login(&self, credentials: &Credentials) -> impl Future<Output = Result<(), ProviderError>>;

    fn push(&self, reference: &ImageReference) -> impl Future<Output = Result<(), ProviderError>>;

    fn remove_image(
        &self,
        reference: &ImageReference,
    ) -> impl Future<Output = Result<(), ProviderError>>;
}
