//! Server configuration
//!
//! Layered configuration: built-in defaults, then an optional `config.toml`,
//! then `CDN_*` environment variables. Loaded once and shared read-only.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;

const CONFIG_FILE: &str = "config";
const ENV_PREFIX: &str = "CDN";

/// Storage backends the server can run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    // ═══ CREDENTIALS ═══
    pub admin_username: String,
    /// Argon2id PHC string; empty disables login.
    pub admin_password_hash: String,

    // ═══ STORAGE ═══
    pub storage_type: StorageBackend,
    pub storage_root: String,
    /// Prefix for the public URLs handed out in listings.
    pub base_url: String,

    // ═══ NETWORK ═══
    pub bind_address: String,
    pub port: u16,

    // ═══ BEHAVIOUR ═══
    pub app_env: String,
    pub readonly: bool,
    pub enable_metrics: bool,
    /// Bytes.
    pub max_upload_size: u64,
    pub rate_limit_requests: u32,
    /// Milliseconds.
    pub rate_limit_window: u64,
    pub thumbnail_size: u32,
    pub thumbnail_quality: u8,
    pub log_level: String,
    pub session_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            admin_username: "admin".to_string(),
            admin_password_hash: String::new(),
            storage_type: StorageBackend::Local,
            storage_root: "./storage".to_string(),
            base_url: "http://localhost:8080".to_string(),
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
            app_env: "development".to_string(),
            readonly: false,
            enable_metrics: true,
            max_upload_size: 10 * 1024 * 1024,
            rate_limit_requests: 100,
            rate_limit_window: 60_000,
            thumbnail_size: 128,
            thumbnail_quality: 85,
            log_level: "info".to_string(),
            session_ttl_secs: 24 * 60 * 60,
        }
    }
}

impl ServerConfig {
    /// Load configuration from defaults, `config.toml` and `CDN_*` variables.
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Self::defaults()?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;
        Self::from_settings(settings)
    }

    /// Builder pre-populated with every default value.
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let d = Self::default();
        Config::builder()
            .set_default("admin_username", d.admin_username)?
            .set_default("admin_password_hash", d.admin_password_hash)?
            .set_default("storage_type", "local")?
            .set_default("storage_root", d.storage_root)?
            .set_default("base_url", d.base_url)?
            .set_default("bind_address", d.bind_address)?
            .set_default("port", i64::from(d.port))?
            .set_default("app_env", d.app_env)?
            .set_default("readonly", d.readonly)?
            .set_default("enable_metrics", d.enable_metrics)?
            .set_default("max_upload_size", d.max_upload_size as i64)?
            .set_default("rate_limit_requests", i64::from(d.rate_limit_requests))?
            .set_default("rate_limit_window", d.rate_limit_window as i64)?
            .set_default("thumbnail_size", i64::from(d.thumbnail_size))?
            .set_default("thumbnail_quality", i64::from(d.thumbnail_quality))?
            .set_default("log_level", d.log_level)?
            .set_default("session_ttl_secs", d.session_ttl_secs as i64)
    }

    pub fn from_settings(settings: Config) -> Result<Self, ConfigError> {
        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Message("port cannot be 0".into()));
        }

        if self.storage_root.trim().is_empty() {
            return Err(ConfigError::Message("storage_root cannot be empty".into()));
        }

        if self.max_upload_size == 0 {
            return Err(ConfigError::Message(
                "max_upload_size must be greater than 0".into(),
            ));
        }

        if self.rate_limit_requests == 0 || self.rate_limit_window == 0 {
            return Err(ConfigError::Message(
                "rate_limit_requests and rate_limit_window must be greater than 0".into(),
            ));
        }

        if self.thumbnail_size == 0 {
            return Err(ConfigError::Message(
                "thumbnail_size must be greater than 0".into(),
            ));
        }

        if !(1..=100).contains(&self.thumbnail_quality) {
            return Err(ConfigError::Message(
                "thumbnail_quality must be between 1 and 100".into(),
            ));
        }

        if self.is_production() && self.admin_password_hash.is_empty() {
            return Err(ConfigError::Message(
                "admin_password_hash is required in production".into(),
            ));
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    pub fn storage_root_path(&self) -> PathBuf {
        PathBuf::from(&self.storage_root)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Listener address built from `bind_address` and `port`.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|e| ConfigError::Message(format!("invalid bind address: {e}")))
    }

    /// Public base URL without a trailing slash.
    pub fn public_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(toml: &str) -> Result<ServerConfig, ConfigError> {
        let settings = ServerConfig::defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        ServerConfig::from_settings(settings)
    }

    #[test]
    fn defaults_load_without_any_source() {
        let config = from_toml("").unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.max_upload_size, 10_485_760);
        assert_eq!(config.rate_limit_requests, 100);
        assert_eq!(config.rate_limit_window(), Duration::from_secs(60));
        assert_eq!(config.thumbnail_size, 128);
        assert_eq!(config.thumbnail_quality, 85);
        assert_eq!(config.storage_type, StorageBackend::Local);
        assert!(!config.readonly);
        assert!(config.enable_metrics);
    }

    #[test]
    fn file_values_override_defaults() {
        let config = from_toml(
            r#"
            port = 8081
            readonly = true
            storage_root = "/srv/cdn"
            base_url = "https://cdn.example.com/"
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 8081);
        assert!(config.readonly);
        assert_eq!(config.storage_root_path(), PathBuf::from("/srv/cdn"));
        assert_eq!(config.public_base_url(), "https://cdn.example.com");
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(from_toml("port = 0").is_err());
        assert!(from_toml("thumbnail_quality = 0").is_err());
        assert!(from_toml("rate_limit_requests = 0").is_err());
        assert!(from_toml("storage_type = \"s3\"").is_err());
    }

    #[test]
    fn production_requires_password_hash() {
        assert!(from_toml("app_env = \"production\"").is_err());
        assert!(
            from_toml("app_env = \"production\"\nadmin_password_hash = \"$argon2id$x\"").is_ok()
        );
    }

    #[test]
    fn socket_addr_combines_host_and_port() {
        let config = ServerConfig::default();
        assert_eq!(config.socket_addr().unwrap().port(), 3000);
    }
}
