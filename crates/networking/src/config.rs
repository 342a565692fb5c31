//! Process configuration.
//!
//! Defaults reproduce the stock deployment: port 3000 on all interfaces,
//! development mode unless `NODE_ENV`/`ECHO_ENV` says `production`, and the
//! tunnel namespace under `/bare/`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{NetworkError, NetworkResult};

/// Default listen port
pub const DEFAULT_PORT: u16 = 3000;

/// Default path prefix of the tunnel namespace
pub const DEFAULT_TUNNEL_PREFIX: &str = "/bare/";

/// Largest JSON body the application API will read (64 KiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

/// How application assets are served
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServeMode {
    /// Uncached files from the dev root behind the dev middleware chain
    Development,
    /// Built files from the dist directory
    Production,
}

impl ServeMode {
    /// Anything other than `production` means development
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("production") => ServeMode::Production,
            _ => ServeMode::Development,
        }
    }
}

/// Assistant panel backend settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// API key; the panel answers with an error message when unset
    #[serde(skip_serializing, default)]
    pub api_key: Option<String>,
    /// Model name passed to the generation endpoint
    pub model: String,
    /// Base URL of the generation API
    pub endpoint: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }
}

/// Central server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    pub bind_addr: IpAddr,
    /// Listen port (0 = OS-assigned)
    pub port: u16,
    /// Asset serving mode
    pub mode: ServeMode,
    /// Root served in development mode
    pub dev_root: PathBuf,
    /// Always-served static directory
    pub public_dir: PathBuf,
    /// Build output served in production mode
    pub dist_dir: PathBuf,
    /// Content-rewriting bundle (service worker, handler, bundle)
    pub uv_dir: PathBuf,
    /// Path prefix claimed by the tunnel
    pub tunnel_prefix: String,
    /// Running bare server that tunnel traffic is relayed to
    pub bare_upstream: Option<Url>,
    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,
    /// Maximum API request body size
    pub max_body_bytes: usize,
    /// Assistant panel settings
    pub assistant: AssistantConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            mode: ServeMode::Development,
            dev_root: PathBuf::from("."),
            public_dir: PathBuf::from("public"),
            dist_dir: PathBuf::from("dist"),
            uv_dir: PathBuf::from("node_modules/@titaniumnetwork-dev/ultraviolet/dist"),
            tunnel_prefix: DEFAULT_TUNNEL_PREFIX.to_string(),
            bare_upstream: None,
            max_connections: 256,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            assistant: AssistantConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Build the configuration from process environment variables
    pub fn from_env() -> NetworkResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> NetworkResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup("HOST") {
            config.bind_addr = host
                .parse()
                .map_err(|_| NetworkError::ConfigError(format!("Invalid HOST: {}", host)))?;
        }
        if let Some(port) = lookup("PORT") {
            config.port = port
                .parse()
                .map_err(|_| NetworkError::ConfigError(format!("Invalid PORT: {}", port)))?;
        }

        let env = lookup("ECHO_ENV").or_else(|| lookup("NODE_ENV"));
        config.mode = ServeMode::from_env_value(env.as_deref());

        if let Some(dir) = lookup("ECHO_DEV_ROOT") {
            config.dev_root = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("ECHO_PUBLIC_DIR") {
            config.public_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("ECHO_DIST_DIR") {
            config.dist_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("ECHO_UV_DIR") {
            config.uv_dir = PathBuf::from(dir);
        }
        if let Some(prefix) = lookup("ECHO_TUNNEL_PREFIX") {
            config.tunnel_prefix = normalize_prefix(&prefix)?;
        }
        if let Some(upstream) = lookup("ECHO_BARE_UPSTREAM").filter(|v| !v.trim().is_empty()) {
            config.bare_upstream = Some(Url::parse(upstream.trim())?);
        }
        if let Some(max) = lookup("ECHO_MAX_CONNECTIONS") {
            config.max_connections = max.parse().map_err(|_| {
                NetworkError::ConfigError(format!("Invalid ECHO_MAX_CONNECTIONS: {}", max))
            })?;
        }

        config.assistant.api_key = lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty());
        if let Some(model) = lookup("ECHO_ASSISTANT_MODEL") {
            config.assistant.model = model;
        }

        Ok(config)
    }

    /// Address the listener binds to
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    /// Directory application files are served from in the current mode
    pub fn app_root(&self) -> &PathBuf {
        match self.mode {
            ServeMode::Development => &self.dev_root,
            ServeMode::Production => &self.dist_dir,
        }
    }
}

/// Ensure the prefix starts and ends with `/`
fn normalize_prefix(prefix: &str) -> NetworkResult<String> {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Err(NetworkError::ConfigError(
            "ECHO_TUNNEL_PREFIX must not be empty".to_string(),
        ));
    }
    Ok(format!("/{}/", trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:3000");
        assert_eq!(config.mode, ServeMode::Development);
        assert_eq!(config.tunnel_prefix, "/bare/");
        assert_eq!(config.assistant.api_key, None);
        assert_eq!(config.app_root(), &PathBuf::from("."));
    }

    #[test]
    fn test_production_mode() {
        let config = ServerConfig::from_lookup(lookup(&[("NODE_ENV", "production")])).unwrap();
        assert_eq!(config.mode, ServeMode::Production);
        assert_eq!(config.app_root(), &PathBuf::from("dist"));

        let config = ServerConfig::from_lookup(lookup(&[
            ("NODE_ENV", "production"),
            ("ECHO_ENV", "development"),
        ]))
        .unwrap();
        assert_eq!(config.mode, ServeMode::Development);
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("HOST", "127.0.0.1"),
            ("ECHO_TUNNEL_PREFIX", "tunnel"),
            ("ECHO_BARE_UPSTREAM", "http://127.0.0.1:9000/"),
            ("GEMINI_API_KEY", "secret"),
            ("ECHO_MAX_CONNECTIONS", "0"),
        ]))
        .unwrap();

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8080");
        assert_eq!(config.tunnel_prefix, "/tunnel/");
        assert_eq!(
            config.bare_upstream.as_ref().map(Url::as_str),
            Some("http://127.0.0.1:9000/")
        );
        assert_eq!(config.assistant.api_key.as_deref(), Some("secret"));
        assert_eq!(config.max_connections, 0);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[("PORT", "eighty")])),
            Err(NetworkError::ConfigError(_))
        ));
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[("ECHO_TUNNEL_PREFIX", "/")])),
            Err(NetworkError::ConfigError(_))
        ));
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[("ECHO_BARE_UPSTREAM", "not a url")])),
            Err(NetworkError::UrlError(_))
        ));
    }

    #[test]
    fn test_api_key_is_not_serialized() {
        let mut config = ServerConfig::default();
        config.assistant.api_key = Some("secret".into());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
