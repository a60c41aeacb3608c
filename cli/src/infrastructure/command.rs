//! External command execution
//!
//! Arguments are always passed as a vector, never through a shell. Secrets
//! go through stdin so they never appear in process listings or errors.

use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::ProviderError;

/// Captured result of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: Option<i32>,
    pub success: bool,
}

/// Render a command line for logs and error messages
pub fn display_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run a command to completion, capturing stdout and stderr
pub async fn run(
    program: &str,
    args: &[String],
    stdin: Option<&str>,
) -> Result<CommandOutput, ProviderError> {
    let command_line = display_command(program, args);
    debug!("Running: {}", command_line);

    let mut child = Command::new(program)
        .args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ProviderError::Spawn {
            command: command_line.clone(),
            source,
        })?;

    // A child may exit without reading stdin; a failed exit status then
    // takes precedence over the write error
    let mut write_error = None;
    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        if let Err(e) = pipe.write_all(input.as_bytes()).await {
            debug!("Writing stdin of {} failed: {}", command_line, e);
            write_error = Some(e);
        }
        // Dropping the handle closes stdin so the child sees EOF
        drop(pipe);
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|source| ProviderError::Spawn {
            command: command_line.clone(),
            source,
        })?;

    if let Some(source) = write_error {
        if output.status.success() {
            return Err(ProviderError::Spawn {
                command: command_line,
                source,
            });
        }
    }

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        code: output.status.code(),
        success: output.status.success(),
    })
}

/// Run a command and fail with its stderr if it exits non-zero
pub async fn run_checked(
    program: &str,
    args: &[String],
    stdin: Option<&str>,
) -> Result<String, ProviderError> {
    let output = run(program, args, stdin).await?;
    if !output.success {
        return Err(failure(program, args, &output));
    }
    Ok(output.stdout)
}

/// Build a `CommandFailed` error from a finished command
pub fn failure(program: &str, args: &[String], output: &CommandOutput) -> ProviderError {
    ProviderError::CommandFailed {
        command: display_command(program, args),
        code: output.code,
        stderr: output.stderr.clone(),
    }
}
