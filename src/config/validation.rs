//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Target URI must parse (static) or be a well-formed template
//! - Mount path shape, socket addresses, log level
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{ProxyConfig, TargetMode};
use crate::routing::template::UriTemplate;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending key.
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_target(config, &mut errors);

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("not a socket address: {}", config.listener.bind_address),
        ));
    }

    let mount = &config.listener.mount_path;
    if !mount.is_empty() && (!mount.starts_with('/') || mount.ends_with('/')) {
        errors.push(ValidationError::new(
            "listener.mount_path",
            "must be empty or start with '/' and not end with '/'",
        ));
    }

    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "listener.request_timeout_secs",
            "must be greater than 0",
        ));
    }

    if config.cookies.namespace.is_empty() && !config.forwarding.preserve_cookies {
        errors.push(ValidationError::new(
            "cookies.namespace",
            "must not be empty unless forwarding.preserve_cookies is set",
        ));
    }
    if config
        .cookies
        .namespace
        .chars()
        .any(|c| c.is_ascii_control() || "()<>@,;:\\\"/[]?={} \t".contains(c))
    {
        errors.push(ValidationError::new(
            "cookies.namespace",
            "must only contain cookie-name token characters",
        ));
    }

    if !matches!(
        config.observability.log_level.to_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    ) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level: {}", config.observability.log_level),
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "not a socket address: {}",
                config.observability.metrics_address
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_target(config: &ProxyConfig, errors: &mut Vec<ValidationError>) {
    let uri = config.target.uri.trim();
    if uri.is_empty() {
        errors.push(ValidationError::new("target.uri", "is required"));
        return;
    }

    match config.target.mode {
        TargetMode::Static => match url::Url::parse(uri) {
            Ok(parsed) if parsed.host_str().is_some() => {}
            Ok(_) => errors.push(ValidationError::new("target.uri", "has no host")),
            Err(e) => errors.push(ValidationError::new(
                "target.uri",
                format!("invalid URI {}: {}", uri, e),
            )),
        },
        TargetMode::Template => {
            if let Err(e) = UriTemplate::parse(uri) {
                errors.push(ValidationError::new("target.uri", e.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_target(uri: &str, mode: TargetMode) -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.target.uri = uri.to_string();
        config.target.mode = mode;
        config
    }

    #[test]
    fn test_valid_static_config() {
        let config = config_with_target("http://localhost:9000/api", TargetMode::Static);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_missing_target() {
        let errors = validate_config(&ProxyConfig::default()).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "target.uri"));
    }

    #[test]
    fn test_invalid_static_target() {
        let config = config_with_target("not a uri", TargetMode::Static);
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "target.uri");
    }

    #[test]
    fn test_template_target_is_not_parsed_as_uri() {
        let config = config_with_target("http://{host}:{port}/{path}", TargetMode::Template);
        assert!(validate_config(&config).is_ok());

        let config = config_with_target("http://{host:9000/", TargetMode::Template);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = config_with_target("", TargetMode::Static);
        config.listener.bind_address = "nowhere".into();
        config.listener.mount_path = "proxy/".into();
        config.observability.log_level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_mount_path_shape() {
        let mut config = config_with_target("http://localhost/", TargetMode::Static);
        config.listener.mount_path = "/proxy".into();
        assert!(validate_config(&config).is_ok());

        config.listener.mount_path = "/proxy/".into();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_namespace_rejects_separators() {
        let mut config = config_with_target("http://localhost/", TargetMode::Static);
        config.cookies.namespace = "a;b".into();
        assert!(validate_config(&config).is_err());
    }
}
