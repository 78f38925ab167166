//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use apoyo_shared::constants::{DEFAULT_HTTP_PORT, DEFAULT_SUBSCRIBER_QUEUE_CAPACITY};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`, or `PORT` to bind `0.0.0.0:<PORT>`
    /// Default: `0.0.0.0:8000`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./apoyo.db`
    pub database_path: PathBuf,

    /// Origin allowed by CORS (the web frontend).
    /// Env: `FRONTEND_URL`
    /// Default: `http://localhost:5173`
    pub frontend_url: String,

    /// Path prefix under which every route is mounted. Empty mounts at `/`.
    /// Env: `API_PREFIX`
    /// Default: `/api`
    pub api_prefix: String,

    /// Outbound frames buffered per WebSocket subscriber.
    /// Env: `SUBSCRIBER_QUEUE_CAPACITY`
    /// Default: `256`
    pub subscriber_queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./apoyo.db"),
            frontend_url: "http://localhost:5173".to_string(),
            api_prefix: "/api".to_string(),
            subscriber_queue_capacity: DEFAULT_SUBSCRIBER_QUEUE_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(port) = get("PORT") {
            match port.parse::<u16>() {
                Ok(port) => config.http_addr.set_port(port),
                Err(_) => tracing::warn!(value = %port, "Invalid PORT, using default"),
            }
        }

        // HTTP_ADDR wins over PORT when both are set.
        if let Some(addr) = get("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(
                    value = %addr,
                    "Invalid HTTP_ADDR, using default"
                );
            }
        }

        if let Some(path) = get("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(url) = get("FRONTEND_URL") {
            if !url.is_empty() {
                config.frontend_url = url;
            }
        }

        if let Some(prefix) = get("API_PREFIX") {
            config.api_prefix = normalize_prefix(&prefix);
        }

        if let Some(val) = get("SUBSCRIBER_QUEUE_CAPACITY") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.subscriber_queue_capacity = n,
                _ => tracing::warn!(
                    value = %val,
                    "Invalid SUBSCRIBER_QUEUE_CAPACITY, using default"
                ),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

/// `"api/"` -> `"/api"`, `"/"` -> `""`.
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> ServerConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8000).into());
        assert_eq!(config.api_prefix, "/api");
        assert_eq!(config.subscriber_queue_capacity, 256);
    }

    #[test]
    fn test_port_override() {
        let config = load(&[("PORT", "9100")]);
        assert_eq!(config.http_addr.port(), 9100);
    }

    #[test]
    fn test_http_addr_beats_port() {
        let config = load(&[("PORT", "9100"), ("HTTP_ADDR", "127.0.0.1:7000")]);
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 7000).into());
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = load(&[("PORT", "not-a-port"), ("SUBSCRIBER_QUEUE_CAPACITY", "0")]);
        assert_eq!(config.http_addr.port(), 8000);
        assert_eq!(config.subscriber_queue_capacity, 256);
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("api/"), "/api");
        assert_eq!(normalize_prefix("/v1/api"), "/v1/api");
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix(""), "");
    }
}
