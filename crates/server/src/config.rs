use std::path::{Path, PathBuf};
use std::time::Duration;

use orchestrator::{HttpExecutorConfig, ServiceSettings};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const CONFIG_FILE: &str = "crewflow.toml";
const CONFIG_PATH_ENV: &str = "CREWFLOW_CONFIG";

/// Process-wide service configuration.
///
/// Loaded from an optional TOML file, then overridden by environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Base URL of the remote phase executor service.
    pub executor_url: String,
    pub executor_timeout_secs: u64,
    pub executor_max_retries: u32,
    pub executor_retry_delay_ms: u64,
    pub cleanup_grace_secs: u64,
    pub status_poll_interval_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            executor_url: "http://localhost:8000".to_string(),
            executor_timeout_secs: 300,
            executor_max_retries: 3,
            executor_retry_delay_ms: 1000,
            cleanup_grace_secs: 5,
            status_poll_interval_ms: 1000,
        }
    }
}

impl ServiceConfig {
    /// File config (if any) with environment overrides applied.
    pub fn load() -> Self {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(CONFIG_FILE));

        let mut config = Self::read(&path);
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Read a TOML file, falling back to defaults when missing or malformed.
    pub fn read(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "Config file does not exist, using defaults");
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    debug!(path = %path.display(), "Config loaded successfully");
                    config
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to parse config, using defaults"
                    );
                    Self::default()
                }
            },
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to read config file, using defaults"
                );
                Self::default()
            }
        }
    }

    /// Apply overrides from `lookup` (normally the process environment).
    /// Unparseable values are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("SERVICE_HOST") {
            self.host = host;
        }
        if let Some(url) = lookup("EXECUTOR_URL") {
            self.executor_url = url;
        }
        override_parsed(&lookup, "SERVICE_PORT", &mut self.port);
        override_parsed(&lookup, "EXECUTOR_TIMEOUT_SECS", &mut self.executor_timeout_secs);
        override_parsed(&lookup, "EXECUTOR_MAX_RETRIES", &mut self.executor_max_retries);
        override_parsed(&lookup, "EXECUTOR_RETRY_DELAY_MS", &mut self.executor_retry_delay_ms);
        override_parsed(&lookup, "CLEANUP_GRACE_SECS", &mut self.cleanup_grace_secs);
        override_parsed(&lookup, "STATUS_POLL_INTERVAL_MS", &mut self.status_poll_interval_ms);
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            cleanup_grace: Duration::from_secs(self.cleanup_grace_secs),
            poll_interval: Duration::from_millis(self.status_poll_interval_ms.max(1)),
        }
    }

    pub fn executor_config(&self) -> HttpExecutorConfig {
        HttpExecutorConfig::new(self.executor_url.clone())
            .with_timeout(Duration::from_secs(self.executor_timeout_secs))
            .with_retries(
                self.executor_max_retries,
                Duration::from_millis(self.executor_retry_delay_ms),
            )
    }
}

fn override_parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *target = value,
        Err(_) => warn!(key, value = %raw, "Ignoring unparseable config override"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = ServiceConfig::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.executor_max_retries, 3);
        assert_eq!(config.service_settings(), ServiceSettings::default());
    }

    #[test]
    fn test_config_read_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let config = ServiceConfig::read(&temp_dir.path().join("missing.toml"));
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn test_config_read_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "port = 6100\nexecutor_url = \"http://crew:9000\"\n").unwrap();

        let config = ServiceConfig::read(&path);
        assert_eq!(config.port, 6100);
        assert_eq!(config.executor_url, "http://crew:9000");
        assert_eq!(config.cleanup_grace_secs, 5);
    }

    #[test]
    fn test_config_read_malformed_falls_back() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "port = \"not a number\"").unwrap();

        assert_eq!(ServiceConfig::read(&path), ServiceConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("SERVICE_PORT", "7000"),
            ("CLEANUP_GRACE_SECS", "30"),
            ("STATUS_POLL_INTERVAL_MS", "250"),
            ("EXECUTOR_MAX_RETRIES", "many"),
        ]);

        let mut config = ServiceConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.port, 7000);
        assert_eq!(config.executor_max_retries, 3);
        assert_eq!(config.bind_address(), "0.0.0.0:7000");

        let settings = config.service_settings();
        assert_eq!(settings.cleanup_grace, Duration::from_secs(30));
        assert_eq!(settings.poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_executor_config() {
        let config = ServiceConfig {
            executor_retry_delay_ms: 50,
            ..Default::default()
        };
        let executor = config.executor_config();
        assert_eq!(executor.base_url, "http://localhost:8000");
        assert_eq!(executor.retry_delay, Duration::from_millis(50));
        assert_eq!(executor.max_retries, 3);
    }
}
