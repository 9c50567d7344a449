//! Cache configuration management with precedence and validation
//!
//! A [`CacheConfig`] is immutable once a [`crate::Cache`] is opened. Scoped
//! changes are expressed as [`ConfigOverrides`] layered on top of it.

use crate::errors::{Error, RecoveryHint, Result, SerializationOp};
use callcache_utils::xdg::XdgPaths;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an alternative config file
pub const CONFIG_FILE_ENV: &str = "CALLCACHE_CONFIG";

const DEFAULT_LOCK_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Effective cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// SQLite database holding the cache entries
    pub cache_db_path: PathBuf,
    /// Directory holding file-backed payloads
    pub cache_files_dir: PathBuf,
    /// Master switch; when off every call computes directly
    pub use_cache: bool,
    /// Default expiration applied to new entries
    pub expiration: Option<DateTime<Utc>>,
    /// Default tag applied to new and touched entries
    pub tag: Option<String>,
    /// How often a waiter re-reads a locked entry
    #[serde(with = "duration_millis")]
    pub lock_poll_interval: Duration,
    /// Give up waiting on a locked entry after this long and compute uncached
    #[serde(with = "option_duration_millis")]
    pub lock_wait_timeout: Option<Duration>,
    /// Verify file checksums when materializing file-backed values
    pub verify_checksums: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_db_path: XdgPaths::database_file(),
            cache_files_dir: XdgPaths::files_dir(),
            use_cache: true,
            expiration: None,
            tag: None,
            lock_poll_interval: DEFAULT_LOCK_POLL_INTERVAL,
            lock_wait_timeout: None,
            verify_checksums: true,
        }
    }
}

impl CacheConfig {
    /// Configuration rooted in a single directory, convenient for tests and tools
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            cache_db_path: dir.join("callcache.sqlite"),
            cache_files_dir: dir.join("files"),
            ..Self::default()
        }
    }

    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::new()
    }

    /// Render as the pretty-printed JSON accepted by the config file
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization {
            key: "config".to_string(),
            operation: SerializationOp::Serialize,
            source: Box::new(e),
            recovery_hint: RecoveryHint::UpdateConfiguration,
        })
    }

    /// Reject configurations the orchestrator cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.lock_poll_interval.is_zero() {
            return Err(Error::configuration(
                "lock_poll_interval must be greater than zero",
            ));
        }
        if self.cache_files_dir.as_os_str().is_empty() {
            return Err(Error::configuration("cache_files_dir must not be empty"));
        }
        Ok(())
    }

    /// Apply `overrides` on top of this configuration
    pub fn layered(&self, overrides: &ConfigOverrides) -> Self {
        let mut config = self.clone();
        if let Some(use_cache) = overrides.use_cache {
            config.use_cache = use_cache;
        }
        if let Some(expiration) = overrides.expiration {
            config.expiration = expiration;
        }
        if let Some(tag) = &overrides.tag {
            config.tag = tag.clone();
        }
        if let Some(interval) = overrides.lock_poll_interval {
            config.lock_poll_interval = interval;
        }
        if let Some(timeout) = overrides.lock_wait_timeout {
            config.lock_wait_timeout = timeout;
        }
        if let Some(verify) = overrides.verify_checksums {
            config.verify_checksums = verify;
        }
        config
    }
}

/// Partial configuration applied over a base configuration
///
/// The storage locations are fixed for the lifetime of a cache and cannot be
/// overridden here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub use_cache: Option<bool>,
    pub expiration: Option<Option<DateTime<Utc>>>,
    pub tag: Option<Option<String>>,
    pub lock_poll_interval: Option<Duration>,
    pub lock_wait_timeout: Option<Option<Duration>>,
    pub verify_checksums: Option<bool>,
}

impl ConfigOverrides {
    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = Some(use_cache);
        self
    }

    pub fn expiration(mut self, expiration: Option<DateTime<Utc>>) -> Self {
        self.expiration = Some(expiration);
        self
    }

    pub fn tag(mut self, tag: Option<impl Into<String>>) -> Self {
        self.tag = Some(tag.map(Into::into));
        self
    }

    pub fn lock_poll_interval(mut self, interval: Duration) -> Self {
        self.lock_poll_interval = Some(interval);
        self
    }

    pub fn lock_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_wait_timeout = Some(timeout);
        self
    }

    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = Some(verify);
        self
    }
}

/// Builder for creating cache configurations
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: CacheConfig::default(),
        }
    }

    /// Place the database and files area under `dir`
    pub fn with_root(mut self, dir: impl AsRef<Path>) -> Self {
        let rooted = CacheConfig::in_dir(dir);
        self.config.cache_db_path = rooted.cache_db_path;
        self.config.cache_files_dir = rooted.cache_files_dir;
        self
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cache_db_path = path.into();
        self
    }

    pub fn with_files_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cache_files_dir = dir.into();
        self
    }

    pub fn with_use_cache(mut self, use_cache: bool) -> Self {
        self.config.use_cache = use_cache;
        self
    }

    pub fn with_expiration(mut self, expiration: DateTime<Utc>) -> Self {
        self.config.expiration = Some(expiration);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.config.tag = Some(tag.into());
        self
    }

    pub fn with_lock_poll_interval(mut self, interval: Duration) -> Self {
        self.config.lock_poll_interval = interval;
        self
    }

    pub fn with_lock_wait_timeout(mut self, timeout: Duration) -> Self {
        self.config.lock_wait_timeout = Some(timeout);
        self
    }

    pub fn with_verify_checksums(mut self, verify: bool) -> Self {
        self.config.verify_checksums = verify;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<CacheConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for CacheConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration loader that handles precedence
///
/// Defaults, then the JSON config file, then `CALLCACHE_*` environment
/// variables.
pub struct CacheConfigLoader;

impl CacheConfigLoader {
    /// Load configuration with full precedence handling
    pub fn load() -> Result<CacheConfig> {
        Self::load_with_file(&Self::config_file_path())
    }

    /// Load configuration using an explicit config file location
    pub fn load_with_file(path: &Path) -> Result<CacheConfig> {
        let mut config = match Self::load_from_config_file(path)? {
            Some(file_config) => file_config,
            None => CacheConfig::default(),
        };
        Self::apply_env(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Config file location: `$CALLCACHE_CONFIG` or the XDG default
    pub fn config_file_path() -> PathBuf {
        std::env::var_os(CONFIG_FILE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(XdgPaths::config_file)
    }

    fn load_from_config_file(path: &Path) -> Result<Option<CacheConfig>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| Error::Io {
            path: path.to_path_buf(),
            operation: "read config file",
            source: e,
            recovery_hint: RecoveryHint::CheckPermissions {
                path: path.to_path_buf(),
            },
        })?;

        let config = serde_json::from_str(&content).map_err(|e| Error::Serialization {
            key: path.display().to_string(),
            operation: SerializationOp::Deserialize,
            source: Box::new(e),
            recovery_hint: RecoveryHint::Manual {
                instructions: "Check config file syntax".to_string(),
            },
        })?;

        Ok(Some(config))
    }

    fn apply_env(config: &mut CacheConfig) -> Result<()> {
        if let Some(value) = env_var("CALLCACHE_USE_CACHE") {
            config.use_cache = parse_bool("CALLCACHE_USE_CACHE", &value)?;
        }

        if let Some(value) = env_var("CALLCACHE_TAG") {
            config.tag = non_empty(value);
        }

        if let Some(value) = env_var("CALLCACHE_EXPIRATION") {
            config.expiration = match non_empty(value) {
                Some(text) => Some(
                    DateTime::parse_from_rfc3339(&text)
                        .map_err(|e| {
                            Error::configuration(format!(
                                "CALLCACHE_EXPIRATION must be an RFC 3339 timestamp: {e}"
                            ))
                        })?
                        .with_timezone(&Utc),
                ),
                None => None,
            };
        }

        if let Some(value) = env_var("CALLCACHE_DB_PATH") {
            config.cache_db_path = PathBuf::from(value);
        }

        if let Some(value) = env_var("CALLCACHE_FILES_DIR") {
            config.cache_files_dir = PathBuf::from(value);
        }

        if let Some(value) = env_var("CALLCACHE_LOCK_POLL_MS") {
            config.lock_poll_interval =
                Duration::from_millis(parse_millis("CALLCACHE_LOCK_POLL_MS", &value)?);
        }

        if let Some(value) = env_var("CALLCACHE_LOCK_TIMEOUT_MS") {
            config.lock_wait_timeout = match non_empty(value) {
                Some(text) => Some(Duration::from_millis(parse_millis(
                    "CALLCACHE_LOCK_TIMEOUT_MS",
                    &text,
                )?)),
                None => None,
            };
        }

        if let Some(value) = env_var("CALLCACHE_VERIFY_CHECKSUMS") {
            config.verify_checksums = parse_bool("CALLCACHE_VERIFY_CHECKSUMS", &value)?;
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::configuration(format!(
            "{name} must be a boolean, got '{other}'"
        ))),
    }
}

fn parse_millis(name: &str, value: &str) -> Result<u64> {
    value.trim().parse::<u64>().map_err(|_| {
        Error::configuration(format!(
            "{name} must be a whole number of milliseconds, got '{value}'"
        ))
    })
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

mod option_duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&(duration.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    const ENV_VARS: &[&str] = &[
        "CALLCACHE_USE_CACHE",
        "CALLCACHE_TAG",
        "CALLCACHE_EXPIRATION",
        "CALLCACHE_DB_PATH",
        "CALLCACHE_FILES_DIR",
        "CALLCACHE_LOCK_POLL_MS",
        "CALLCACHE_LOCK_TIMEOUT_MS",
        "CALLCACHE_VERIFY_CHECKSUMS",
    ];

    fn clear_env() {
        for name in ENV_VARS {
            std::env::remove_var(name);
        }
    }

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert!(config.use_cache);
        assert!(config.verify_checksums);
        assert_eq!(config.lock_poll_interval, Duration::from_secs(1));
        assert_eq!(config.lock_wait_timeout, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let result = CacheConfig::builder()
            .with_lock_poll_interval(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }

    #[test]
    fn test_overrides_layer() {
        let base = CacheConfig::builder().with_tag("base").build().unwrap();
        let layered = base.layered(
            &ConfigOverrides::default()
                .use_cache(false)
                .tag(None::<String>),
        );
        assert!(!layered.use_cache);
        assert_eq!(layered.tag, None);
        assert_eq!(layered.cache_db_path, base.cache_db_path);
        assert_eq!(base.tag.as_deref(), Some("base"));
    }

    #[test]
    #[serial]
    fn test_rendered_config_loads_back() {
        clear_env();
        let temp = TempDir::new().unwrap();
        let mut config = CacheConfig::in_dir(temp.path());
        config.tag = Some("nightly".to_string());
        config.lock_wait_timeout = Some(Duration::from_millis(750));

        let path = temp.path().join("config.json");
        std::fs::write(&path, config.to_json_pretty().unwrap()).unwrap();
        assert_eq!(CacheConfigLoader::load_with_file(&path).unwrap(), config);
    }

    #[test]
    #[serial]
    fn test_file_then_env_precedence() {
        clear_env();
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"tag": "from-file", "lock_poll_interval": 50, "use_cache": false}"#,
        )
        .unwrap();

        let config = CacheConfigLoader::load_with_file(&path).unwrap();
        assert_eq!(config.tag.as_deref(), Some("from-file"));
        assert_eq!(config.lock_poll_interval, Duration::from_millis(50));
        assert!(!config.use_cache);

        std::env::set_var("CALLCACHE_TAG", "from-env");
        std::env::set_var("CALLCACHE_USE_CACHE", "true");
        std::env::set_var("CALLCACHE_LOCK_TIMEOUT_MS", "2500");
        let config = CacheConfigLoader::load_with_file(&path).unwrap();
        clear_env();

        assert_eq!(config.tag.as_deref(), Some("from-env"));
        assert!(config.use_cache);
        assert_eq!(config.lock_wait_timeout, Some(Duration::from_millis(2500)));
    }

    #[test]
    #[serial]
    fn test_invalid_env_value_is_configuration_error() {
        clear_env();
        std::env::set_var("CALLCACHE_USE_CACHE", "maybe");
        let result = CacheConfigLoader::load_with_file(Path::new("/nonexistent/config.json"));
        clear_env();
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }

    #[test]
    #[serial]
    fn test_expiration_from_env() {
        clear_env();
        std::env::set_var("CALLCACHE_EXPIRATION", "2030-01-02T03:04:05Z");
        let config =
            CacheConfigLoader::load_with_file(Path::new("/nonexistent/config.json")).unwrap();
        clear_env();
        assert_eq!(
            config.expiration.map(|e| e.to_rfc3339()),
            Some("2030-01-02T03:04:05+00:00".to_string())
        );
    }
}
