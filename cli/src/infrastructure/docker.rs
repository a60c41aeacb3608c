//! Container runtime operations via the docker CLI

use std::collections::BTreeMap;
use tracing::info;

use super::command;
use super::ContainerRuntime;
use crate::domain::credentials::Credentials;
use crate::domain::image::ImageReference;
use crate::domain::plan::retag_args;
use crate::error::ProviderError;
use crate::tools::{get_tool_path, DOCKER};

/// docker CLI client
#[derive(Debug, Clone)]
pub struct DockerCli {
    docker: String,
}

impl DockerCli {
    pub fn new() -> Self {
        Self {
            docker: get_tool_path(DOCKER),
        }
    }

    async fn run(&self, args: Vec<String>, stdin: Option<&str>) -> Result<String, ProviderError> {
        command::run_checked(&self.docker, &args, stdin).await
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

/// `docker build` arguments; build args are sorted for stable command lines
pub fn build_command_args(
    context: &str,
    tag: &ImageReference,
    build_args: &BTreeMap<String, String>,
) -> Vec<String> {
    let mut args = vec!["build".to_string(), "--tag".to_string(), tag.to_string()];
    for (key, value) in build_args {
        args.push("--build-arg".to_string());
        args.push(format!("{}={}", key, value));
    }
    args.push(context.to_string());
    args
}

/// `docker login` arguments; the password is sent on stdin
pub fn login_command_args(credentials: &Credentials) -> Vec<String> {
    vec![
        "login".to_string(),
        "--username".to_string(),
        credentials.username.clone(),
        "--password-stdin".to_string(),
        credentials.server.clone(),
    ]
}

impl ContainerRuntime for DockerCli {
    async fn image_exists(&self, reference: &ImageReference) -> Result<bool, ProviderError> {
        let args = vec![
            "image".to_string(),
            "inspect".to_string(),
            "--format".to_string(),
            "{{.Id}}".to_string(),
            reference.to_string(),
        ];
        let output = command::run(&self.docker, &args, None).await?;
        if output.success {
            return Ok(true);
        }
        if output.stderr.to_lowercase().contains("no such image") {
            return Ok(false);
        }
        Err(command::failure(&self.docker, &args, &output))
    }

    async fn pull(&self, reference: &ImageReference) -> Result<(), ProviderError> {
        info!("Pulling {}", reference);
        self.run(vec!["pull".to_string(), reference.to_string()], None)
            .await
            .map(|_| ())
    }

    async fn tag(
        &self,
        source: &ImageReference,
        destination: &ImageReference,
    ) -> Result<(), ProviderError> {
        info!("Tagging {} as {}", source, destination);
        self.run(retag_args(source, destination), None)
            .await
            .map(|_| ())
    }

    async fn build(
        &self,
        context: &str,
        tag: &ImageReference,
        build_args: &BTreeMap<String, String>,
    ) -> Result<(), ProviderError> {
        info!("Building {} from {}", tag, context);
        self.run(build_command_args(context, tag, build_args), None)
            .await
            .map(|_| ())
    }

    async fn login(&self, credentials: &Credentials) -> Result<(), ProviderError> {
        info!("Logging in to {}", credentials.server);
        self.run(
            login_command_args(credentials),
            Some(credentials.password.as_str()),
        )
        .await
        .map(|_| ())
    }

    async fn push(&self, reference: &ImageReference) -> Result<(), ProviderError> {
        info!("Pushing {}", reference);
        self.run(vec!["push".to_string(), reference.to_string()], None)
            .await
            .map(|_| ())
    }

    async fn remove_image(&self, reference: &ImageReference) -> Result<(), ProviderError> {
        self.run(
            vec!["image".to_string(), "rm".to_string(), reference.to_string()],
            None,
        )
        .await
        .map(|_| ())
    }
}
