//! YAML configuration for the Gemini pipeline.
//!
//! A single document describes where the store lives, where the external
//! services listen, and which vocabulary to load:
//!
//! ```yaml
//! version: "1.0"
//! mode: file
//!
//! store:
//!   backend: redb
//!   host: 127.0.0.1
//!   port: 9042
//!   keyspace: hashes
//!   data_dir: /var/lib/gemini
//!
//! services:
//!   ast_endpoint: "http://127.0.0.1:9432/parse"
//!   features_endpoint: "http://127.0.0.1:9001/extract"
//!
//! vocabulary:
//!   path: /var/lib/gemini/docfreq.json.zst
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use index::BackendConfig;
use sketch::Mode;

/// Errors loading or validating a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Configuration format version.
    pub version: String,

    /// Similarity mode this run operates in.
    #[serde(default = "default_mode")]
    pub mode: Mode,

    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub services: ServiceSettings,

    #[serde(default)]
    pub vocabulary: VocabularySettings,
}

fn default_mode() -> Mode {
    Mode::File
}

/// Where the fingerprint store lives.
///
/// `host`/`port` address a wide-column cluster when an out-of-tree driver is
/// in use; the embedded backend maps `keyspace` to a database file under
/// `data_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "StoreSettings::default_backend")]
    pub backend: String,
    #[serde(default = "StoreSettings::default_host")]
    pub host: String,
    #[serde(default = "StoreSettings::default_port")]
    pub port: u16,
    #[serde(default = "StoreSettings::default_keyspace")]
    pub keyspace: String,
    #[serde(default = "StoreSettings::default_data_dir")]
    pub data_dir: PathBuf,
}

impl StoreSettings {
    fn default_backend() -> String {
        "redb".to_string()
    }

    fn default_host() -> String {
        "127.0.0.1".to_string()
    }

    fn default_port() -> u16 {
        9042
    }

    fn default_keyspace() -> String {
        "hashes".to_string()
    }

    fn default_data_dir() -> PathBuf {
        PathBuf::from(".")
    }

    /// Resolve these settings into a concrete backend.
    pub fn backend_config(&self) -> Result<BackendConfig, ConfigError> {
        match self.backend.as_str() {
            "memory" => Ok(BackendConfig::InMemory),
            "redb" => Ok(BackendConfig::redb(
                self.data_dir.join(format!("{}.redb", self.keyspace)),
            )),
            other => Err(ConfigError::Validation(format!(
                "unknown store backend '{other}'; expected 'redb' or 'memory'"
            ))),
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: Self::default_backend(),
            host: Self::default_host(),
            port: Self::default_port(),
            keyspace: Self::default_keyspace(),
            data_dir: Self::default_data_dir(),
        }
    }
}

/// Endpoints of the external services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    #[serde(default = "ServiceSettings::default_ast_endpoint")]
    pub ast_endpoint: String,
    #[serde(default = "ServiceSettings::default_features_endpoint")]
    pub features_endpoint: String,
}

impl ServiceSettings {
    fn default_ast_endpoint() -> String {
        "http://127.0.0.1:9432/parse".to_string()
    }

    fn default_features_endpoint() -> String {
        "http://127.0.0.1:9001/extract".to_string()
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            ast_endpoint: Self::default_ast_endpoint(),
            features_endpoint: Self::default_features_endpoint(),
        }
    }
}

/// Vocabulary source. When `path` is set the JSON file wins over the copy
/// persisted in the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VocabularySettings {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl GeminiConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: GeminiConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self.version.as_str() {
            "1" | "1.0" => {}
            v => return Err(ConfigError::UnsupportedVersion(v.to_string())),
        }
        if self.store.keyspace.is_empty() {
            return Err(ConfigError::Validation("keyspace must not be empty".into()));
        }
        self.store.backend_config().map(|_| ())
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            mode: Mode::File,
            store: StoreSettings::default(),
            services: ServiceSettings::default(),
            vocabulary: VocabularySettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_yaml_gets_defaults() {
        let cfg = GeminiConfig::from_yaml("version: \"1.0\"").unwrap();
        assert_eq!(cfg.mode, Mode::File);
        assert_eq!(cfg.store.keyspace, "hashes");
        assert_eq!(cfg.store.port, 9042);
        assert!(cfg.vocabulary.path.is_none());
    }

    #[test]
    fn full_yaml_round_trips() {
        let yaml = r#"
version: "1.0"
mode: func
store:
  backend: memory
  keyspace: corpus
services:
  ast_endpoint: "http://ast:9432/parse"
  features_endpoint: "http://fe:9001/extract"
vocabulary:
  path: /data/docfreq.json
"#;
        let cfg = GeminiConfig::from_yaml(yaml).unwrap();
        assert_eq!(cfg.mode, Mode::Func);
        assert_eq!(cfg.store.keyspace, "corpus");
        assert!(matches!(
            cfg.store.backend_config().unwrap(),
            BackendConfig::InMemory
        ));
        assert_eq!(cfg.services.ast_endpoint, "http://ast:9432/parse");
        assert_eq!(
            cfg.vocabulary.path.as_deref(),
            Some(Path::new("/data/docfreq.json"))
        );
    }

    #[test]
    fn redb_backend_maps_keyspace_to_a_file() {
        let cfg = GeminiConfig::from_yaml(
            "version: \"1.0\"\nstore:\n  keyspace: corpus\n  data_dir: /tmp/gem\n",
        )
        .unwrap();
        match cfg.store.backend_config().unwrap() {
            BackendConfig::Redb { path } => {
                assert_eq!(path, PathBuf::from("/tmp/gem/corpus.redb"));
            }
            other => panic!("expected redb backend, got {other:?}"),
        }
    }

    #[test]
    fn unknown_version_is_rejected() {
        assert!(matches!(
            GeminiConfig::from_yaml("version: \"7\""),
            Err(ConfigError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = GeminiConfig::from_yaml("version: \"1.0\"\nstore:\n  backend: cassandra\n");
        assert!(matches!(err, Err(ConfigError::Validation(_))));
    }
}
