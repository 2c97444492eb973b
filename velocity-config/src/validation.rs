//! Configuration validation traits and utilities

use crate::error::{ConfigError, ConfigResult};

/// Trait for validatable configuration
pub trait Validatable {
    /// Validate the configuration
    fn validate(&self) -> ConfigResult<()>;

    /// Get the domain name for error reporting
    fn domain_name(&self) -> &'static str;

    /// Helper to create a domain-specific validation error
    fn validation_error(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::Invalid {
            domain: self.domain_name().to_string(),
            message: message.into(),
        }
    }
}

/// Validate a required string field
pub fn validate_required_string(value: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    if value.is_empty() {
        return Err(ConfigError::Invalid {
            domain: domain.to_string(),
            message: format!("{} cannot be empty", field_name),
        });
    }
    Ok(())
}

/// Validate a positive number
pub fn validate_positive<T>(value: T, field_name: &str, domain: &str) -> ConfigResult<()>
where
    T: PartialOrd + Default + std::fmt::Display,
{
    if value <= T::default() {
        return Err(ConfigError::Invalid {
            domain: domain.to_string(),
            message: format!("{} must be greater than 0, got {}", field_name, value),
        });
    }
    Ok(())
}

/// Validate a URL; `{bytes}` placeholders are substituted before parsing
pub fn validate_url(url: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    if url.is_empty() {
        return Err(ConfigError::Invalid {
            domain: domain.to_string(),
            message: format!("{} cannot be empty", field_name),
        });
    }

    let concrete = url.replace("{bytes}", "0");
    let parsed = url::Url::parse(&concrete).map_err(|e| ConfigError::Invalid {
        domain: domain.to_string(),
        message: format!("{} has invalid URL format: {}", field_name, e),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ConfigError::Invalid {
            domain: domain.to_string(),
            message: format!("{} scheme '{}' not allowed (only http/https)", field_name, scheme),
        }),
    }
}

/// Validate that `min < max`
pub fn validate_range(min: f64, max: f64, field_name: &str, domain: &str) -> ConfigResult<()> {
    if !(min >= 0.0 && min < max) {
        return Err(ConfigError::Invalid {
            domain: domain.to_string(),
            message: format!(
                "{} must satisfy 0 <= min < max, got {}..{}",
                field_name, min, max
            ),
        });
    }
    Ok(())
}

/// Validate a non-empty, strictly ascending list of sizes
pub fn validate_ascending_sizes(sizes: &[u64], field_name: &str, domain: &str) -> ConfigResult<()> {
    if sizes.is_empty() {
        return Err(ConfigError::Invalid {
            domain: domain.to_string(),
            message: format!("{} must list at least one payload size", field_name),
        });
    }
    if sizes.iter().any(|s| *s == 0) {
        return Err(ConfigError::Invalid {
            domain: domain.to_string(),
            message: format!("{} cannot contain a zero payload size", field_name),
        });
    }
    if sizes.windows(2).any(|w| w[0] >= w[1]) {
        return Err(ConfigError::Invalid {
            domain: domain.to_string(),
            message: format!("{} must be strictly ascending, got {:?}", field_name, sizes),
        });
    }
    Ok(())
}

/// Validate an enum choice
pub fn validate_enum_choice<T>(value: &str, valid_choices: &[T], field_name: &str, domain: &str) -> ConfigResult<()>
where
    T: AsRef<str>,
{
    let valid: Vec<&str> = valid_choices.iter().map(|c| c.as_ref()).collect();

    if !valid.iter().any(|&v| v.eq_ignore_ascii_case(value)) {
        return Err(ConfigError::Invalid {
            domain: domain.to_string(),
            message: format!(
                "{} has invalid value '{}'. Valid choices: {}",
                field_name,
                value,
                valid.join(", ")
            ),
        });
    }

    Ok(())
}
