//! ECR registry operations
//!
//! Drives the AWS CLI (`aws ecr ... --output json`) and parses its JSON
//! responses. Credentials, region and profile resolution are left to the CLI's
//! own configuration chain unless overridden here.

use serde::Deserialize;
use tracing::{debug, info};

use super::command::{self, CommandOutput};
use super::{AuthorizationToken, EnsureOutcome, EnsuredRegistry, RegistryInfo, RegistryProvider};
use crate::domain::image::TagMutability;
use crate::error::ProviderError;
use crate::tools::{get_tool_path, AWS};

const REPOSITORY_NOT_FOUND: &str = "RepositoryNotFoundException";
const REPOSITORY_ALREADY_EXISTS: &str = "RepositoryAlreadyExistsException";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryJson {
    registry_id: String,
    repository_name: String,
    repository_uri: String,
    /// Kept as reported: the API also knows `*_WITH_EXCLUSION` settings
    #[serde(default)]
    image_tag_mutability: Option<String>,
}

impl RepositoryJson {
    /// Reported mutability; absent means the API default
    fn reported_mutability(&self) -> &str {
        self.image_tag_mutability
            .as_deref()
            .unwrap_or(TagMutability::Mutable.as_api_str())
    }

    fn into_info(self, tag_mutability: TagMutability) -> RegistryInfo {
        RegistryInfo {
            registry_id: self.registry_id,
            repository_name: self.repository_name,
            repository_url: self.repository_uri,
            tag_mutability,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DescribeRepositoriesResponse {
    repositories: Vec<RepositoryJson>,
}

#[derive(Debug, Deserialize)]
struct CreateRepositoryResponse {
    repository: RepositoryJson,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizationDataJson {
    authorization_token: String,
    proxy_endpoint: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizationTokenResponse {
    authorization_data: Vec<AuthorizationDataJson>,
}

/// ECR client backed by the AWS CLI
#[derive(Debug, Clone)]
pub struct EcrCli {
    aws: String,
    region: Option<String>,
    profile: Option<String>,
}

impl EcrCli {
    pub fn new() -> Self {
        Self {
            aws: get_tool_path(AWS),
            region: None,
            profile: None,
        }
    }

    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.region = region;
        self
    }

    pub fn with_profile(mut self, profile: Option<String>) -> Self {
        self.profile = profile;
        self
    }

    /// Full argument list for an `aws ecr` subcommand
    fn args(&self, subcommand: &str, rest: &[&str]) -> Vec<String> {
        let mut args = vec!["ecr".to_string(), subcommand.to_string()];
        args.extend(rest.iter().map(|s| s.to_string()));
        args.extend(["--output".to_string(), "json".to_string()]);
        if let Some(region) = &self.region {
            args.extend(["--region".to_string(), region.clone()]);
        }
        if let Some(profile) = &self.profile {
            args.extend(["--profile".to_string(), profile.clone()]);
        }
        args
    }

    async fn ecr(
        &self,
        subcommand: &str,
        rest: &[&str],
    ) -> Result<(Vec<String>, CommandOutput), ProviderError> {
        let args = self.args(subcommand, rest);
        let output = command::run(&self.aws, &args, None).await?;
        Ok((args, output))
    }

    async fn describe(&self, repository: &str) -> Result<Option<RepositoryJson>, ProviderError> {
        let (args, output) = self
            .ecr("describe-repositories", &["--repository-names", repository])
            .await?;

        if !output.success {
            if output.stderr.contains(REPOSITORY_NOT_FOUND) {
                return Ok(None);
            }
            return Err(command::failure(&self.aws, &args, &output));
        }

        let response: DescribeRepositoriesResponse = parse(&self.aws, &args, &output.stdout)?;
        Ok(response
            .repositories
            .into_iter()
            .find(|r| r.repository_name == repository))
    }

    async fn create(
        &self,
        repository: &str,
        mutability: TagMutability,
    ) -> Result<Option<RegistryInfo>, ProviderError> {
        let (args, output) = self
            .ecr(
                "create-repository",
                &[
                    "--repository-name",
                    repository,
                    "--image-tag-mutability",
                    mutability.as_api_str(),
                ],
            )
            .await?;

        if !output.success {
            // Lost a race with a concurrent creator; the caller re-describes
            if output.stderr.contains(REPOSITORY_ALREADY_EXISTS) {
                return Ok(None);
            }
            return Err(command::failure(&self.aws, &args, &output));
        }

        let response: CreateRepositoryResponse = parse(&self.aws, &args, &output.stdout)?;
        Ok(Some(response.repository.into_info(mutability)))
    }

    async fn put_mutability(
        &self,
        repository: &str,
        registry_id: &str,
        mutability: TagMutability,
    ) -> Result<(), ProviderError> {
        let (args, output) = self
            .ecr(
                "put-image-tag-mutability",
                &[
                    "--repository-name",
                    repository,
                    "--registry-id",
                    registry_id,
                    "--image-tag-mutability",
                    mutability.as_api_str(),
                ],
            )
            .await?;

        if !output.success {
            return Err(command::failure(&self.aws, &args, &output));
        }
        Ok(())
    }

    /// Bring an existing repository to the wanted mutability
    ///
    /// Any reported value other than the wanted one counts as drift.
    async fn reconcile(
        &self,
        existing: RepositoryJson,
        mutability: TagMutability,
    ) -> Result<EnsuredRegistry, ProviderError> {
        if existing.reported_mutability() == mutability.as_api_str() {
            debug!("Registry {} already exists", existing.repository_name);
            return Ok(EnsuredRegistry {
                info: existing.into_info(mutability),
                outcome: EnsureOutcome::Unchanged,
            });
        }

        info!(
            "Updating tag mutability of {} from {} to {}",
            existing.repository_name,
            existing.reported_mutability(),
            mutability
        );
        self.put_mutability(&existing.repository_name, &existing.registry_id, mutability)
            .await?;
        Ok(EnsuredRegistry {
            info: existing.into_info(mutability),
            outcome: EnsureOutcome::Updated,
        })
    }
}

impl Default for EcrCli {
    fn default() -> Self {
        Self::new()
    }
}

fn parse<T: for<'de> Deserialize<'de>>(
    program: &str,
    args: &[String],
    stdout: &str,
) -> Result<T, ProviderError> {
    serde_json::from_str(stdout).map_err(|e| ProviderError::UnexpectedResponse {
        command: command::display_command(program, args),
        message: e.to_string(),
    })
}

impl RegistryProvider for EcrCli {
    async fn ensure_registry(
        &self,
        repository: &str,
        mutability: TagMutability,
    ) -> Result<EnsuredRegistry, ProviderError> {
        if let Some(existing) = self.describe(repository).await? {
            return self.reconcile(existing, mutability).await;
        }

        info!("Creating registry {}", repository);
        if let Some(info) = self.create(repository, mutability).await? {
            return Ok(EnsuredRegistry {
                info,
                outcome: EnsureOutcome::Created,
            });
        }

        let existing = self
            .describe(repository)
            .await?
            .ok_or_else(|| ProviderError::UnexpectedResponse {
                command: format!("{} ecr describe-repositories", self.aws),
                message: format!("{} reported as existing but not found", repository),
            })?;
        self.reconcile(existing, mutability).await
    }

    async fn authorization_token(
        &self,
        registry_id: &str,
    ) -> Result<AuthorizationToken, ProviderError> {
        let (args, output) = self
            .ecr("get-authorization-token", &["--registry-ids", registry_id])
            .await?;

        if !output.success {
            return Err(command::failure(&self.aws, &args, &output));
        }

        let response: AuthorizationTokenResponse = parse(&self.aws, &args, &output.stdout)?;
        let data = response
            .authorization_data
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::UnexpectedResponse {
                command: command::display_command(&self.aws, &args),
                message: "no authorization data returned".to_string(),
            })?;

        Ok(AuthorizationToken {
            token: data.authorization_token,
            proxy_endpoint: data.proxy_endpoint,
        })
    }

    async fn delete_registry(
        &self,
        repository: &str,
        registry_id: &str,
    ) -> Result<bool, ProviderError> {
        let (args, output) = self
            .ecr(
                "delete-repository",
                &[
                    "--repository-name",
                    repository,
                    "--registry-id",
                    registry_id,
                    "--force",
                ],
            )
            .await?;

        if !output.success {
            if output.stderr.contains(REPOSITORY_NOT_FOUND) {
                return Ok(false);
            }
            return Err(command::failure(&self.aws, &args, &output));
        }
        Ok(true)
    }
}
