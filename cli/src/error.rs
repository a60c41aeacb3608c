//! Centralized error types for registry-mirror
//!
//! Uses thiserror for typed errors that can be matched on,
//! while still being compatible with anyhow for propagation.

use thiserror::Error;

/// Top-level error type for provisioning operations
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid credentials: {0}")]
    Credentials(#[from] CredentialsError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Resource graph error: {0}")]
    Graph(#[from] GraphError),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Required configuration missing: {field}")]
    MissingField { field: String },

    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Config file not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },
}

/// Registry credential errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CredentialsError {
    #[error("authorization token does not contain both a username and a password")]
    Invalid,

    #[error("authorization token could not be decoded: {message}")]
    Decode { message: String },

    #[error("authorization token response has no proxy endpoint")]
    MissingServer,
}

/// Errors surfaced by the registry provider or the container runtime
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("`{command}` failed (exit code {code:?}): {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Required tool not found: {tool}. Install it or set {env_var}")]
    ToolNotFound { tool: String, env_var: String },

    #[error("Unexpected response from `{command}`: {message}")]
    UnexpectedResponse { command: String, message: String },

    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Stack state persistence errors
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to read state file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write state file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("State file {path} is corrupt: {message}")]
    Parse { path: String, message: String },
}

/// Resource graph declaration errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum GraphError {
    #[error("Resource {resource} depends on unknown resource {dependency}")]
    UnknownDependency {
        resource: String,
        dependency: String,
    },

    #[error("Dependency cycle detected involving: {}", resources.join(", "))]
    Cycle { resources: Vec<String> },

    #[error("Resource {resource} declared more than once")]
    DuplicateResource { resource: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingField {
            field: "imageTag".to_string(),
        };
        assert_eq!(err.to_string(), "Required configuration missing: imageTag");
    }

    #[test]
    fn test_error_conversion() {
        let provision_err: ProvisionError = CredentialsError::Invalid.into();
        assert!(matches!(provision_err, ProvisionError::Credentials(_)));
    }

    #[test]
    fn test_provider_error_keeps_stderr() {
        let err = ProviderError::CommandFailed {
            command: "docker push".to_string(),
            code: Some(1),
            stderr: "denied: not authorized".to_string(),
        };
        assert!(err.to_string().contains("denied: not authorized"));
    }

    #[test]
    fn test_cycle_display_lists_resources() {
        let err = GraphError::Cycle {
            resources: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "Dependency cycle detected involving: a, b");
    }
}
