//! Runtime tool path resolution
//!
//! Every external tool (`aws`, `docker`) is resolved the same way:
//! 1. Check for an environment variable `{TOOL}_BIN` (e.g., `DOCKER_BIN`)
//! 2. Fall back to PATH-based invocation if the envvar is not set
//!
//! This lets a wrapper pin exact binaries while keeping PATH lookup for
//! development.

use std::env;

use crate::error::ProviderError;

/// AWS CLI, used for the ECR registry provider
pub const AWS: &str = "aws";

/// Docker CLI, used as the container runtime
pub const DOCKER: &str = "docker";

/// Name of the environment variable that overrides a tool's path
///
/// Uppercases the tool name and maps `-` to `_`, so `docker-buildx`
/// becomes `DOCKER_BUILDX_BIN`.
pub fn tool_env_var(tool: &str) -> String {
    format!("{}_BIN", tool.to_uppercase().replace('-', "_"))
}

/// Get the path to an external tool
///
/// Returns the value of `{TOOL}_BIN` if set, otherwise the tool name itself
/// (which relies on PATH).
///
/// # Examples
///
/// ```rust,ignore
/// // With DOCKER_BIN="/usr/local/bin/docker"
/// assert_eq!(get_tool_path("docker"), "/usr/local/bin/docker");
///
/// // Without DOCKER_BIN set
/// assert_eq!(get_tool_path("docker"), "docker");
/// ```
pub fn get_tool_path(tool: &str) -> String {
    env::var(tool_env_var(tool)).unwrap_or_else(|_| tool.to_string())
}

/// Verify that a tool resolves to an executable before any work starts
pub fn require_tool(tool: &str) -> Result<std::path::PathBuf, ProviderError> {
    which::which(get_tool_path(tool)).map_err(|_| ProviderError::ToolNotFound {
        tool: tool.to_string(),
        env_var: tool_env_var(tool),
    })
}
