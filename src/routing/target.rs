//! Backend target resolution.
//!
//! # Responsibilities
//! - Parse a static target once at startup
//! - Expand a templated target per request
//! - Expose target host, port and scheme for header rewriting
//!
//! # Design Decisions
//! - The base URI is kept exactly as configured (or as expanded) so that
//!   redirect `Location` prefix matching sees the same string
//! - An invalid static target is a configuration error; an invalid
//!   expanded target fails only the current request

use url::Url;

use crate::config::{TargetConfig, TargetMode};
use crate::error::{ProxyError, Result};
use crate::rewrite::codec::EncodeMode;
use crate::routing::template::UriTemplate;

/// The backend a single request is forwarded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Base URI, e.g. `http://backend:8080/api`.
    pub base_uri: String,
    /// `http` or `https`.
    pub scheme: String,
    /// Host name or bracketed IPv6 literal.
    pub host: String,
    /// Explicit port, `None` when it is the scheme default.
    pub port: Option<u16>,
    /// Query left after template expansion. Only set for templated targets.
    pub residual_query: Option<String>,
    templated: bool,
}

impl ResolvedTarget {
    fn from_uri(base_uri: String, templated: bool) -> std::result::Result<Self, String> {
        let url = Url::parse(&base_uri).map_err(|e| e.to_string())?;
        let host = url
            .host_str()
            .ok_or_else(|| "target has no host".to_string())?
            .to_string();
        Ok(Self {
            scheme: url.scheme().to_string(),
            host,
            port: url.port(),
            base_uri,
            residual_query: None,
            templated,
        })
    }

    /// Value for the outbound `Host` header: host, plus port when it is
    /// not the scheme default.
    pub fn host_header(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.clone(),
        }
    }

    /// The query to forward, given the inbound one.
    pub fn forward_query<'a>(&'a self, inbound: Option<&'a str>) -> Option<&'a str> {
        if self.templated {
            self.residual_query.as_deref()
        } else {
            inbound
        }
    }

    /// Character set used when encoding the forwarded query and fragment.
    pub fn encode_mode(&self) -> EncodeMode {
        if self.templated {
            EncodeMode::Template
        } else {
            EncodeMode::Static
        }
    }
}

/// Computes the backend target for each request.
#[derive(Debug, Clone)]
pub enum TargetResolver {
    /// One target for every request.
    Static(ResolvedTarget),
    /// Target filled from query parameters per request.
    Templated(UriTemplate),
}

impl TargetResolver {
    /// Build the resolver selected by configuration.
    pub fn from_config(config: &TargetConfig) -> Result<Self> {
        let uri = config.uri.trim();
        if uri.is_empty() {
            return Err(ProxyError::config("target.uri is required"));
        }
        match config.mode {
            TargetMode::Static => ResolvedTarget::from_uri(uri.to_string(), false)
                .map(Self::Static)
                .map_err(|reason| {
                    ProxyError::config(format!("invalid target uri {}: {}", uri, reason))
                }),
            TargetMode::Template => UriTemplate::parse(uri).map(Self::Templated),
        }
    }

    /// Resolve the target for a request with the given raw query string.
    pub fn resolve(&self, query: Option<&str>) -> Result<ResolvedTarget> {
        match self {
            Self::Static(target) => Ok(target.clone()),
            Self::Templated(template) => {
                let expansion = template.expand(query)?;
                let mut target = ResolvedTarget::from_uri(expansion.target.clone(), true)
                    .map_err(|reason| ProxyError::InvalidTarget {
                        target: expansion.target,
                        reason,
                    })?;
                target.residual_query = expansion.residual_query;
                Ok(target)
            }
        }
    }
}
