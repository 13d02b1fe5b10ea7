use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::semantic::{DEFAULT_CACHE_CAPACITY, DEFAULT_HASHING_DIMENSIONS, DEFAULT_MODEL};

const CONFIG_FILE: &str = "config.yaml";

/// Content weight used when the caller does not pass one
const DEFAULT_ALPHA: f32 = 0.7;
const DEFAULT_TOP_K: usize = 3;
/// Messages per persona that count towards content affinity
const DEFAULT_RECENCY_WINDOW: usize = 20;
const DEFAULT_NEIGHBORS: usize = 5;
/// Default model download timeout in seconds
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecommenderConfig {
    /// Weight of content affinity in [0.0, 1.0]; the rest goes to collaborative
    #[serde(default = "default_alpha")]
    pub alpha: f32,

    /// Number of personas returned per request
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Most recent messages per (user, persona) used for content scores
    #[serde(default = "default_recency_window")]
    pub recency_window: usize,

    /// Similar users consulted for collaborative scores
    #[serde(default = "default_neighbors")]
    pub neighbors: usize,

    /// Users whose aggregate vectors are kept in memory (0 disables)
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            top_k: DEFAULT_TOP_K,
            recency_window: DEFAULT_RECENCY_WINDOW,
            neighbors: DEFAULT_NEIGHBORS,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    #[default]
    Fastembed,
    Hashing,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,

    /// Model name for fastembed (e.g., "all-MiniLM-L6-v2")
    #[serde(default = "default_model")]
    pub model: String,

    /// Vector size for the hashing provider
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Timeout for model download in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            model: DEFAULT_MODEL.to_string(),
            dimensions: DEFAULT_HASHING_DIMENSIONS,
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
        }
    }
}

fn default_alpha() -> f32 {
    DEFAULT_ALPHA
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_recency_window() -> usize {
    DEFAULT_RECENCY_WINDOW
}

fn default_neighbors() -> usize {
    DEFAULT_NEIGHBORS
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_dimensions() -> usize {
    DEFAULT_HASHING_DIMENSIONS
}

fn default_download_timeout_secs() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT_SECS
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub recommender: RecommenderConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// YAML list of personas; the built-in registry is used when unset
    #[serde(default)]
    pub personas_file: Option<String>,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        let rec = &self.recommender;
        if !(0.0..=1.0).contains(&rec.alpha) {
            bail!(
                "recommender.alpha must be between 0.0 and 1.0, got {}",
                rec.alpha
            );
        }
        if rec.top_k == 0 {
            bail!("recommender.top_k must be greater than 0");
        }
        if rec.recency_window == 0 {
            bail!("recommender.recency_window must be greater than 0");
        }
        if rec.neighbors == 0 {
            bail!("recommender.neighbors must be greater than 0");
        }

        let emb = &self.embedding;
        if emb.provider == EmbeddingProvider::Hashing && emb.dimensions == 0 {
            bail!("embedding.dimensions must be greater than 0");
        }
        if emb.download_timeout_secs == 0 {
            bail!("embedding.download_timeout_secs must be greater than 0");
        }

        Ok(())
    }

    /// Load `config.yaml` from `base_path`, creating it with defaults if missing.
    pub fn load_with<P: AsRef<Path>>(base_path: P) -> anyhow::Result<Self> {
        let base_path = base_path.as_ref();
        let path = base_path.join(CONFIG_FILE);

        if !path.exists() {
            std::fs::create_dir_all(base_path)
                .with_context(|| format!("failed to create {}", base_path.display()))?;
            write_atomic(&path, &serde_yml::to_string(&Self::default())?)?;
        }

        let config_str = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;

        config.base_path = base_path.to_path_buf();
        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_str = serde_yml::to_string(&self)?;
        write_atomic(&self.base_path.join(CONFIG_FILE), &config_str)
    }

    /// Personas file resolved against the base directory.
    pub fn personas_path(&self) -> Option<PathBuf> {
        self.personas_file.as_ref().map(|f| self.base_path.join(f))
    }
}

fn write_atomic(path: &Path, data: &str) -> anyhow::Result<()> {
    let temp_path = path.with_extension("yaml-tmp");
    std::fs::write(&temp_path, data)
        .with_context(|| format!("failed to write {}", temp_path.display()))?;
    std::fs::rename(&temp_path, path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_creates_default_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load_with(tmp.path()).unwrap();

        assert!(tmp.path().join(CONFIG_FILE).exists());
        assert!((config.recommender.alpha - DEFAULT_ALPHA).abs() < f32::EPSILON);
        assert_eq!(config.recommender.top_k, 3);
        assert_eq!(config.recommender.recency_window, 20);
        assert_eq!(config.recommender.neighbors, 5);
        assert_eq!(config.embedding.provider, EmbeddingProvider::Fastembed);
        assert!(config.personas_path().is_none());
    }

    #[test]
    fn test_partial_file_is_upgraded() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "recommender:\n  alpha: 0.5\nembedding:\n  provider: hashing\n",
        )
        .unwrap();

        let config = Config::load_with(tmp.path()).unwrap();
        assert!((config.recommender.alpha - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.recommender.top_k, 3);
        assert_eq!(config.embedding.provider, EmbeddingProvider::Hashing);

        let saved = std::fs::read_to_string(tmp.path().join(CONFIG_FILE)).unwrap();
        assert!(saved.contains("recency_window"));
    }

    #[test]
    fn test_rejects_out_of_range_alpha() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), "recommender:\n  alpha: 1.5\n").unwrap();
        assert!(Config::load_with(tmp.path()).is_err());
    }

    #[test]
    fn test_rejects_zero_top_k() {
        let mut config = Config::default();
        config.recommender.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_personas_path_is_relative_to_base() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "personas_file: personas.yaml\n",
        )
        .unwrap();

        let config = Config::load_with(tmp.path()).unwrap();
        assert_eq!(config.personas_path(), Some(tmp.path().join("personas.yaml")));
    }
}
