//! Configuration file handling.
//!
//! Configuration is stored in ~/.audiomatch/config.yaml unless a path is
//! given on the command line. A missing file is created empty, and every
//! field has a default.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use audiomatch_embed::{AudioEmbedder, EmbedConfig, FbankEmbedder, HttpEmbedder};
use audiomatch_engine::{EngineConfig, EngineContext, EngineParts, FsBlobStore};
use audiomatch_kv::RedbStore;
use audiomatch_vecstore::VectorDb;
use serde::{Deserialize, Serialize};

/// Default base configuration directory name.
pub const DEFAULT_BASE_DIR: &str = ".audiomatch";
/// Default configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

const DB_FILE: &str = "audiomatch.redb";
const UPLOADS_DIR: &str = "uploads";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the database and uploads. Defaults to
    /// ~/.audiomatch/data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    #[serde(default)]
    pub embedder: EmbedderConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub server: ServerConfig,

    /// Path the config was loaded from (not serialized).
    #[serde(skip)]
    config_path: PathBuf,
}

/// Which embedder to run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmbedderConfig {
    /// Local pooled log-mel embedder.
    #[default]
    Fbank,
    /// Remote embedding service.
    Http {
        base_url: String,
        #[serde(default)]
        dimension: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,
        #[serde(default)]
        timeout_secs: u64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    /// Largest accepted upload, in MiB.
    pub max_upload_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:5000".into(),
            max_upload_mb: 16,
        }
    }
}

impl Config {
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_BASE_DIR))
    }

    pub fn default_config_path() -> Option<PathBuf> {
        Self::default_config_dir().map(|dir| dir.join(DEFAULT_CONFIG_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Resolved data directory.
    pub fn data_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        Self::default_config_dir()
            .map(|d| d.join("data"))
            .ok_or_else(|| anyhow::anyhow!("cannot determine data directory"))
    }

    pub fn build_embedder(&self) -> Arc<dyn AudioEmbedder> {
        match &self.embedder {
            EmbedderConfig::Fbank => Arc::new(FbankEmbedder::new()),
            EmbedderConfig::Http {
                base_url,
                dimension,
                api_key,
                timeout_secs,
            } => {
                let mut cfg = EmbedConfig::default()
                    .with_base_url(base_url)
                    .with_dimension(*dimension)
                    .with_timeout_secs(*timeout_secs);
                if let Some(key) = api_key {
                    cfg = cfg.with_api_key(key);
                }
                Arc::new(HttpEmbedder::with_config(cfg))
            }
        }
    }

    /// Opens the database and uploads directory and builds the engine.
    pub fn build_engine(&self) -> anyhow::Result<EngineContext> {
        let dir = self.data_dir()?;
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create data dir {}", dir.display()))?;

        let db_path = dir.join(DB_FILE);
        let store = RedbStore::open(&db_path)
            .with_context(|| format!("open database {}", db_path.display()))?;
        tracing::debug!(path = %db_path.display(), "database opened");

        let engine = EngineContext::new(EngineParts {
            db: VectorDb::open(Arc::new(store)),
            embedder: self.build_embedder(),
            blobs: Arc::new(FsBlobStore::new(dir.join(UPLOADS_DIR))),
            config: self.engine.clone(),
        })?;
        Ok(engine)
    }
}

/// Loads the configuration, creating an empty file when none exists.
pub fn load_config(custom_path: Option<&Path>) -> anyhow::Result<Config> {
    let config_path = match custom_path {
        Some(p) => p.to_path_buf(),
        None => Config::default_config_path()
            .ok_or_else(|| anyhow::anyhow!("cannot determine config path"))?,
    };

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut cfg: Config = if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        if content.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("parse {}", config_path.display()))?
        }
    } else {
        let cfg = Config::default();
        std::fs::write(&config_path, serde_yaml::to_string(&cfg)?)?;
        cfg
    };

    cfg.config_path = config_path;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let cfg = load_config(Some(&path)).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.path(), path.as_path());
        assert_eq!(cfg.embedder, EmbedderConfig::Fbank);
        assert_eq!(cfg.engine, EngineConfig::default());

        // The written file loads back.
        load_config(Some(&path)).unwrap();
    }

    #[test]
    fn sections_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "data_dir: /var/lib/audiomatch\n\
             embedder:\n  kind: http\n  base_url: http://embed:9000\n  dimension: 768\n\
             engine:\n  nprobe: 16\n  reference_collection: refs\n\
             server:\n  addr: 0.0.0.0:8080\n",
        )
        .unwrap();

        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.data_dir().unwrap(), PathBuf::from("/var/lib/audiomatch"));
        assert!(matches!(
            &cfg.embedder,
            EmbedderConfig::Http { base_url, dimension: 768, .. } if base_url == "http://embed:9000"
        ));
        assert_eq!(cfg.engine.nprobe, 16);
        assert_eq!(cfg.engine.reference_collection, "refs");
        assert_eq!(cfg.engine.query_log_collection, "short_term_collection");
        assert_eq!(cfg.server.addr, "0.0.0.0:8080");
        assert_eq!(cfg.server.max_upload_mb, 16);
        assert_eq!(cfg.build_embedder().dimension(), 768);
    }

    #[test]
    fn engine_builds_in_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config {
            data_dir: Some(dir.path().join("data")),
            ..Config::default()
        };
        let engine = cfg.build_engine().unwrap();
        assert!(dir.path().join("data").join(DB_FILE).exists());
        assert_eq!(engine.config().dim, 768);
    }

    #[test]
    fn bad_yaml_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "engine: [1, 2").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }
}
