use crate::config::{parse_duration, Config, SCHEMA_VERSION};
use crate::error::{Result, TriageError, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every problem
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_backend(config, &mut errors);
        Self::validate_upload(config, &mut errors);
        Self::validate_export(config, &mut errors);
        Self::validate_notifications(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(TriageError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_backend(config: &Config, errors: &mut Vec<ValidationError>) {
        let base_url = &config.backend.base_url;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            errors.push(ValidationError::new(
                "backend.base_url",
                format!("Base URL must start with http:// or https://, got '{}'", base_url),
            ));
        }

        let endpoints = [
            ("backend.batch_endpoint", &config.backend.batch_endpoint),
            ("backend.query_endpoint", &config.backend.query_endpoint),
            ("backend.history_endpoint", &config.backend.history_endpoint),
        ];
        for (path, endpoint) in endpoints {
            if endpoint.trim().is_empty() {
                errors.push(ValidationError::new(path, "Endpoint path cannot be empty"));
            }
        }

        match parse_duration(&config.backend.timeout) {
            Some(d) if d.is_zero() => errors.push(ValidationError::new(
                "backend.timeout",
                "Timeout must be greater than 0",
            )),
            Some(_) => {}
            None => errors.push(ValidationError::new(
                "backend.timeout",
                format!("Invalid duration format: {}", config.backend.timeout),
            )),
        }
    }

    fn validate_upload(config: &Config, errors: &mut Vec<ValidationError>) {
        let extensions = &config.upload.allowed_extensions;
        if extensions.is_empty() {
            errors.push(ValidationError::new(
                "upload.allowed_extensions",
                "At least one file extension must be allowed",
            ));
        }

        for ext in extensions {
            if ext.is_empty() || ext.starts_with('.') {
                errors.push(ValidationError::new(
                    "upload.allowed_extensions",
                    format!("Extensions are written without a dot, got '{}'", ext),
                ));
            }
        }
    }

    fn validate_export(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.export.output_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "export.output_dir",
                "Output directory cannot be empty",
            ));
        }
    }

    fn validate_notifications(config: &Config, errors: &mut Vec<ValidationError>) {
        if parse_duration(&config.notifications.dismiss_after).is_none() {
            errors.push(ValidationError::new(
                "notifications.dismiss_after",
                format!(
                    "Invalid duration format: {}",
                    config.notifications.dismiss_after
                ),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_base_url() {
        let mut config = Config::default();
        config.backend.base_url = "localhost:8080".to_string();
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_errors_are_collected() {
        let mut config = Config::default();
        config.backend.timeout = "0s".to_string();
        config.upload.allowed_extensions = vec![".csv".to_string()];
        config.export.output_dir = PathBuf::new();

        match ConfigValidator::validate(&config) {
            Err(TriageError::ConfigValidation { errors }) => assert_eq!(errors.len(), 3),
            other => panic!("expected validation errors, got {:?}", other),
        }
    }
}
