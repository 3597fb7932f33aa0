//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for one proxy instance.
///
/// Read once at startup and shared read-only by every request.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, mount path).
    pub listener: ListenerConfig,

    /// Backend target (static URI or template).
    pub target: TargetConfig,

    /// Header, cookie and redirect forwarding switches.
    pub forwarding: ForwardingConfig,

    /// Cookie namespace settings.
    pub cookies: CookieConfig,

    /// Backend client timeouts and pool size.
    pub client: ClientConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Externally visible mount path of the proxy (context + route prefix).
    /// Empty means the proxy owns the whole origin.
    pub mount_path: String,

    /// Overall inbound request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            mount_path: String::new(),
            request_timeout_secs: 60,
        }
    }
}

/// How the `target.uri` value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetMode {
    /// A fixed URI parsed once at startup.
    #[default]
    Static,
    /// A URI template filled per request from query parameters.
    Template,
}

/// Backend target configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TargetConfig {
    /// Target URI (static) or URI template (e.g. `http://{host}:{port}/{path}`).
    pub uri: String,

    /// Static or templated target.
    pub mode: TargetMode,
}

/// Forwarding behaviour switches.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForwardingConfig {
    /// Append the caller's address to `X-Forwarded-For`.
    pub forward_client_ip: bool,

    /// Set `X-Forwarded-Proto` alongside `X-Forwarded-For`.
    pub forward_proto: bool,

    /// Keep the client's `Host`/`Origin` instead of the target's.
    pub preserve_host: bool,

    /// Pass cookies through without namespacing.
    pub preserve_cookies: bool,

    /// Keep the backend-issued cookie path.
    pub preserve_cookie_path: bool,

    /// Follow backend redirects in the client instead of relaying them.
    pub handle_redirects: bool,

    /// Forward the URL fragment if a client sends one.
    pub send_url_fragment: bool,

    /// Let the proxy negotiate and decode response compression itself.
    pub handle_compression: bool,
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            forward_client_ip: true,
            forward_proto: true,
            preserve_host: false,
            preserve_cookies: false,
            preserve_cookie_path: false,
            handle_redirects: false,
            send_url_fragment: true,
            handle_compression: false,
        }
    }
}

/// Cookie namespace configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Stable per-deployment identifier seeding the cookie name prefix.
    pub namespace: String,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            namespace: "proxy".to_string(),
        }
    }
}

impl CookieConfig {
    /// The string prepended to cookie names handed to the client.
    pub fn prefix(&self) -> String {
        format!("!Proxy!{}", self.namespace)
    }
}

/// Backend client configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Connection establishment timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,

    /// Maximum wait for the backend response head in milliseconds.
    pub read_timeout_ms: Option<u64>,

    /// Maximum wait for a free backend connection in milliseconds.
    pub connection_request_timeout_ms: Option<u64>,

    /// Maximum concurrent backend connections (0 = unlimited).
    pub max_connections: usize,
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    pub fn connection_request_timeout(&self) -> Option<Duration> {
        self.connection_request_timeout_ms.map(Duration::from_millis)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Log the inbound and outbound URL of every proxied request.
    pub log_requests: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            log_requests: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
