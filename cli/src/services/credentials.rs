//! Credential resolution for provisioned registries

use tracing::debug;

use crate::domain::credentials::{decode_authorization_token, Credentials};
use crate::error::ProvisionError;
use crate::infrastructure::RegistryProvider;

/// Resolves registry credentials on demand
///
/// Nothing is cached: every `resolve` asks the provider for a fresh token, so
/// each consumer gets its own round trip.
pub struct CredentialResolver<'a, P> {
    provider: &'a P,
}

impl<'a, P: RegistryProvider> CredentialResolver<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self { provider }
    }

    pub async fn resolve(&self, registry_id: &str) -> Result<Credentials, ProvisionError> {
        let token = self.provider.authorization_token(registry_id).await?;
        let credentials = decode_authorization_token(&token.token, &token.proxy_endpoint)?;
        debug!(
            "Resolved credentials for registry {} ({})",
            registry_id, credentials.server
        );
        Ok(credentials)
    }
}
