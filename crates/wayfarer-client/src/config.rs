//! Client configuration loaded from environment variables.
//!
//! All settings have defaults so the client can start with zero
//! configuration; without a backend URL it runs purely on local storage.

use std::path::PathBuf;
use std::time::Duration;

use wayfarer_shared::constants::DEFAULT_REQUEST_TIMEOUT_SECS;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the hosted backend, e.g. `https://xyz.example.co`.
    /// Env: `WAYFARER_BACKEND_URL`
    /// Default: none (offline mode).
    pub backend_url: Option<String>,

    /// Public (anon) API key sent with every backend request.
    /// Env: `WAYFARER_ANON_KEY`
    /// Default: empty.
    pub anon_key: String,

    /// Directory holding the local database.
    /// Env: `WAYFARER_DATA_DIR`
    /// Default: the platform data directory.
    pub data_dir: Option<PathBuf>,

    /// Per-request timeout for backend calls.
    /// Env: `WAYFARER_REQUEST_TIMEOUT_SECS`
    /// Default: 15 seconds.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            anon_key: String::new(),
            data_dir: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("WAYFARER_BACKEND_URL") {
            let url = url.trim();
            if url.starts_with("http://") || url.starts_with("https://") {
                config.backend_url = Some(url.trim_end_matches('/').to_string());
            } else if !url.is_empty() {
                tracing::warn!(value = %url, "Invalid WAYFARER_BACKEND_URL, running offline");
            }
        }

        if let Some(key) = lookup("WAYFARER_ANON_KEY") {
            config.anon_key = key;
        }

        if let Some(dir) = lookup("WAYFARER_DATA_DIR") {
            if !dir.is_empty() {
                config.data_dir = Some(PathBuf::from(dir));
            }
        }

        if let Some(val) = lookup("WAYFARER_REQUEST_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.request_timeout = Duration::from_secs(secs),
                _ => tracing::warn!(value = %val, "Invalid WAYFARER_REQUEST_TIMEOUT_SECS, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    pub fn is_offline(&self) -> bool {
        self.backend_url.is_none()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert!(config.is_offline());
        assert_eq!(config.request_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_full_env() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("WAYFARER_BACKEND_URL", "https://demo.example.co/"),
            ("WAYFARER_ANON_KEY", "anon"),
            ("WAYFARER_DATA_DIR", "/tmp/wayfarer"),
            ("WAYFARER_REQUEST_TIMEOUT_SECS", "3"),
        ]));
        assert_eq!(config.backend_url.as_deref(), Some("https://demo.example.co"));
        assert_eq!(config.anon_key, "anon");
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/wayfarer")));
        assert_eq!(config.request_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_invalid_values_are_ignored() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("WAYFARER_BACKEND_URL", "localhost:54321"),
            ("WAYFARER_REQUEST_TIMEOUT_SECS", "soon"),
        ]));
        assert!(config.is_offline());
        assert_eq!(config.request_timeout, Duration::from_secs(15));
    }
}
