//! Validation for names that end up in registry API calls and docker commands
//!
//! Everything here is passed as a discrete argument (never through a shell),
//! but rejecting malformed values early gives a configuration error instead
//! of an opaque provider failure halfway through a run.

use crate::error::ConfigError;

/// Maximum length for a registry repository name
pub const REPOSITORY_MAX_LENGTH: usize = 256;

/// Maximum length for a docker tag
pub const TAG_MAX_LENGTH: usize = 128;

/// Separators allowed inside repository names
const REPOSITORY_ALLOWED_CHARS: &[char] = &['.', '_', '-', '/'];

/// Characters allowed in tags besides ASCII alphanumerics
const TAG_ALLOWED_CHARS: &[char] = &['_', '.', '-'];

/// Characters allowed in logical and stack names besides ASCII alphanumerics
const NAME_ALLOWED_CHARS: &[char] = &['_', '-'];

fn invalid(field: &str, value: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: format!("{:?} ({})", value, reason),
    }
}

/// Validate a registry repository name
///
/// Repository names must:
/// - Be 2 to 256 characters
/// - Start with a lowercase letter or digit
/// - Contain only lowercase letters, digits, `.`, `_`, `-` and `/`
/// - Not contain empty path segments (`//`) or end with `/`
pub fn validate_repository_name(name: &str, field: &str) -> Result<(), ConfigError> {
    if name.len() < 2 || name.len() > REPOSITORY_MAX_LENGTH {
        return Err(invalid(
            field,
            name,
            format!("length must be between 2 and {}", REPOSITORY_MAX_LENGTH),
        ));
    }

    if !name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    {
        return Err(invalid(field, name, "must start with a lowercase letter or digit"));
    }

    let invalid_chars: Vec<char> = name
        .chars()
        .filter(|c| {
            !c.is_ascii_lowercase() && !c.is_ascii_digit() && !REPOSITORY_ALLOWED_CHARS.contains(c)
        })
        .collect();

    if !invalid_chars.is_empty() {
        return Err(invalid(
            field,
            name,
            format!("contains invalid characters: {:?}", invalid_chars),
        ));
    }

    if name.split('/').any(str::is_empty) {
        return Err(invalid(field, name, "contains an empty path segment"));
    }

    Ok(())
}

/// Validate a docker image tag: `[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}`
pub fn validate_image_tag(tag: &str, field: &str) -> Result<(), ConfigError> {
    if tag.is_empty() || tag.len() > TAG_MAX_LENGTH {
        return Err(invalid(
            field,
            tag,
            format!("length must be between 1 and {}", TAG_MAX_LENGTH),
        ));
    }

    if tag.starts_with(['.', '-']) {
        return Err(invalid(field, tag, "must not start with '.' or '-'"));
    }

    let invalid_chars: Vec<char> = tag
        .chars()
        .filter(|c| !c.is_ascii_alphanumeric() && !TAG_ALLOWED_CHARS.contains(c))
        .collect();

    if !invalid_chars.is_empty() {
        return Err(invalid(
            field,
            tag,
            format!("contains invalid characters: {:?}", invalid_chars),
        ));
    }

    Ok(())
}

/// Validate a logical image or stack name (used in resource ids and file names)
pub fn validate_name(name: &str, field: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(invalid(field, name, "cannot be empty"));
    }

    if name
        .chars()
        .any(|c| !c.is_ascii_alphanumeric() && !NAME_ALLOWED_CHARS.contains(&c))
    {
        return Err(invalid(field, name, "allowed: a-z, A-Z, 0-9, _, -"));
    }

    Ok(())
}
