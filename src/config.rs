//! Configuration file parser for `newsfeed.toml`.
//!
//! The config file is optional. A missing file yields `Config::default()`.
//! Unknown keys are accepted, though we log a warning when the file contains
//! potential typos.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::feed::{ChannelMetadata, DEFAULT_INDENT};
use crate::util::UrlPolicy;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output file stem. The feed is written to `<output>.xml`.
    pub output: String,

    /// Spaces per nesting level in the feed document.
    pub indent: usize,

    /// Channel metadata. Key order is kept and becomes element order.
    pub channel: toml::Table,

    pub couchdb: CouchDbConfig,

    pub images: ImageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: "feed".to_string(),
            indent: DEFAULT_INDENT,
            channel: toml::Table::new(),
            couchdb: CouchDbConfig::default(),
            images: ImageConfig::default(),
        }
    }
}

/// Document store connection.
///
/// `COUCHDB_HOST`, `COUCHDB_USER` and `COUCHDB_PASSWORD` take precedence
/// over the file.
#[derive(Deserialize)]
#[serde(default)]
pub struct CouchDbConfig {
    pub host: String,
    pub database: String,
    pub user: Option<String>,
    pub password: Option<SecretString>,
}

impl Default for CouchDbConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:5984".to_string(),
            database: "articles".to_string(),
            user: None,
            password: None,
        }
    }
}

/// Mask the password in Debug output to prevent secret leakage.
impl std::fmt::Debug for CouchDbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CouchDbConfig")
            .field("host", &self.host)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Article image enrichment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Download each article image to record its byte size.
    pub fetch_length: bool,

    /// Maximum concurrent image downloads.
    pub concurrency: usize,

    /// Allow image URLs on loopback and private networks.
    pub allow_private_hosts: bool,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            fetch_length: false,
            concurrency: 8,
            allow_private_hosts: false,
        }
    }
}

impl ImageConfig {
    pub fn url_policy(&self) -> UrlPolicy {
        if self.allow_private_hosts {
            UrlPolicy::AllowPrivate
        } else {
            UrlPolicy::PublicOnly
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: &'static [&'static str] = &["output", "indent", "channel", "couchdb", "images"];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), output = %config.output, "Loaded configuration");
        Ok(config)
    }

    /// Applies `COUCHDB_*` environment variables over the file values.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(host) = lookup("COUCHDB_HOST") {
            self.couchdb.host = host;
        }
        if let Some(user) = lookup("COUCHDB_USER") {
            self.couchdb.user = Some(user);
        }
        if let Some(password) = lookup("COUCHDB_PASSWORD") {
            self.couchdb.password = Some(SecretString::from(password));
        }
        self
    }

    /// Channel metadata as a record, in file order.
    pub fn channel_metadata(&self) -> ChannelMetadata {
        ChannelMetadata::from(self.channel.clone())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FieldValue;
    use secrecy::ExposeSecret;

    fn write_config(name: &str, content: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("newsfeed_config_test_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("newsfeed.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    fn cleanup(path: &Path) {
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.output, "feed");
        assert_eq!(config.indent, 2);
        assert!(config.channel.is_empty());
        assert_eq!(config.couchdb.host, "http://localhost:5984");
        assert_eq!(config.couchdb.database, "articles");
        assert!(config.couchdb.user.is_none());
        assert!(!config.images.fetch_length);
        assert_eq!(config.images.concurrency, 8);
        assert_eq!(config.images.url_policy(), UrlPolicy::PublicOnly);
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/newsfeed_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.output, "feed");
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let path = write_config("whitespace", "   \n  \n  ");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.output, "feed");
        cleanup(&path);
    }

    #[test]
    fn test_full_config() {
        let path = write_config(
            "full",
            r#"
output = "sports"
indent = 4

[channel]
title = "Sports"
link = "https://news.example.com/sports"
description = "Latest sports news"
image = "https://news.example.com/logo.png"

[couchdb]
host = "http://db:5984"
database = "crawl"
user = "admin"
password = "secret"

[images]
fetch_length = true
concurrency = 2
allow_private_hosts = true
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.output, "sports");
        assert_eq!(config.indent, 4);
        assert_eq!(config.couchdb.host, "http://db:5984");
        assert_eq!(config.couchdb.database, "crawl");
        assert_eq!(config.couchdb.user.as_deref(), Some("admin"));
        assert_eq!(
            config.couchdb.password.as_ref().map(|p| p.expose_secret()),
            Some("secret")
        );
        assert!(config.images.fetch_length);
        assert_eq!(config.images.concurrency, 2);
        assert_eq!(config.images.url_policy(), UrlPolicy::AllowPrivate);

        cleanup(&path);
    }

    #[test]
    fn test_channel_metadata_keeps_file_order() {
        let path = write_config(
            "channel_order",
            "[channel]\ntitle = \"News\"\nlink = \"https://x\"\ndescription = \"d\"\nlanguage = \"en\"\n",
        );

        let channel = Config::load(&path).unwrap().channel_metadata();
        let names: Vec<_> = channel.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["title", "link", "description", "language"]);
        assert_eq!(channel.get("title"), Some(&FieldValue::Text("News".into())));

        cleanup(&path);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let path = write_config("invalid", "this is not [valid toml");

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));

        cleanup(&path);
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let path = write_config("unknown", "output = \"feed\"\ntotally_fake_key = 42\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.output, "feed");
        cleanup(&path);
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let path = write_config("wrongtype", "indent = \"two\"\n");
        assert!(Config::load(&path).is_err());
        cleanup(&path);
    }

    #[test]
    fn test_too_large_file_rejected() {
        let path = write_config("too_large", &"a".repeat(1_048_577));

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        cleanup(&path);
    }

    #[test]
    fn test_env_overrides_take_precedence() {
        let mut config = Config::default();
        config.couchdb.user = Some("file-user".into());

        let config = config.with_overrides_from(|key| match key {
            "COUCHDB_HOST" => Some("http://env-host:5984".into()),
            "COUCHDB_PASSWORD" => Some("env-secret".into()),
            _ => None,
        });

        assert_eq!(config.couchdb.host, "http://env-host:5984");
        assert_eq!(config.couchdb.user.as_deref(), Some("file-user"));
        assert_eq!(
            config.couchdb.password.as_ref().map(|p| p.expose_secret()),
            Some("env-secret")
        );
    }

    #[test]
    fn test_debug_masks_password() {
        let mut config = Config::default();
        config.couchdb.password = Some(SecretString::from("super-secret-12345".to_string()));

        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("super-secret-12345"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
