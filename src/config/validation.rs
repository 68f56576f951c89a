//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits and timeouts > 0, addresses parse)
//! - Check route paths and backend URLs
//! - Detect conflicting routes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::http::request::Target;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address {0:?}")]
    BindAddress(String),

    #[error("invalid metrics address {0:?}")]
    MetricsAddress(String),

    #[error("body limit must be greater than zero")]
    ZeroBodyLimit,

    #[error("request timeout must be greater than zero")]
    ZeroRequestTimeout,

    #[error("route {route:?}: path {path:?} must start with '/'")]
    RelativePath { route: String, path: String },

    #[error("route {route:?}: path {path:?} uses ':' or '*' segments; use {{param}} and {{*rest}}")]
    LegacyPathSyntax { route: String, path: String },

    #[error("route {route:?}: duplicate path {path:?}")]
    DuplicatePath { route: String, path: String },

    #[error("route {route:?}: {reason}")]
    InvalidHost { route: String, reason: String },
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }
    if config.body.limit_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    let mut seen_paths = HashSet::new();
    for route in &config.routes {
        if !route.path.starts_with('/') {
            errors.push(ValidationError::RelativePath {
                route: route.name.clone(),
                path: route.path.clone(),
            });
        } else if route
            .path
            .split('/')
            .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
        {
            errors.push(ValidationError::LegacyPathSyntax {
                route: route.name.clone(),
                path: route.path.clone(),
            });
        }

        if !seen_paths.insert(route.path.as_str()) {
            errors.push(ValidationError::DuplicatePath {
                route: route.name.clone(),
                path: route.path.clone(),
            });
        }

        for host in [route.host.as_deref(), route.options.url.as_deref()]
            .into_iter()
            .flatten()
        {
            if let Err(e) = Target::parse(host) {
                errors.push(ValidationError::InvalidHost {
                    route: route.name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RouteConfig;

    fn route(name: &str, path: &str, host: Option<&str>) -> RouteConfig {
        RouteConfig {
            name: name.into(),
            path: path.into(),
            host: host.map(Into::into),
            options: Default::default(),
            fail_quiet: false,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn test_valid_routes() {
        let mut config = GatewayConfig::default();
        config.routes.push(route("a", "/a/{*rest}", Some("http://127.0.0.1:3000")));
        config.routes.push(route("b", "/b", None));
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.body.limit_bytes = 0;
        config.timeouts.request_secs = 0;
        config.routes.push(route("rel", "users", None));
        config.routes.push(route("legacy", "/users/:id", None));
        config.routes.push(route("dup1", "/same", Some("http://a.internal")));
        config.routes.push(route("dup2", "/same", Some("https://b.internal")));

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 7);
        assert!(errors.contains(&ValidationError::BindAddress("nowhere".into())));
        assert!(errors.contains(&ValidationError::ZeroBodyLimit));
        assert!(errors.contains(&ValidationError::ZeroRequestTimeout));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::RelativePath { .. })));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::LegacyPathSyntax { .. })));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::DuplicatePath { .. })));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidHost { .. })));
    }
}
