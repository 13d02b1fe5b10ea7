use crate::{
    config::{Config, EmbeddingProvider},
    conversations::BackendCsv,
    personas::PersonaRegistry,
    recommend::Recommender,
    semantic::{Embedder, EmbeddingError, EmbeddingModel, HashingEmbedder},
};
use anyhow::{Context, Result};
use homedir::my_home;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Wires configuration, storage, registry and embedder into a `Recommender`
pub struct AppFactory;

impl AppFactory {
    /// Get application paths, creating the base directory
    pub fn get_paths() -> Result<AppPaths> {
        let base_path = Self::get_base_path()?;
        std::fs::create_dir_all(&base_path)
            .context("Failed to create application base directory")?;
        Ok(AppPaths::new(base_path))
    }

    pub fn create_config(paths: &AppPaths) -> Result<Config> {
        Config::load_with(&paths.base_path)
    }

    pub fn create_store(paths: &AppPaths) -> Result<Arc<BackendCsv>> {
        let store = BackendCsv::load(&paths.conversations_path).with_context(|| {
            format!(
                "Failed to open conversation log {}",
                paths.conversations_path.display()
            )
        })?;
        Ok(Arc::new(store))
    }

    pub fn create_registry(config: &Config) -> Result<Arc<PersonaRegistry>> {
        let registry = match config.personas_path() {
            Some(path) => PersonaRegistry::load(&path)
                .with_context(|| format!("Failed to load personas from {}", path.display()))?,
            None => PersonaRegistry::builtin(),
        };
        Ok(Arc::new(registry))
    }

    /// Load the configured embedding provider.
    pub fn create_embedder(
        config: &Config,
        base_path: &Path,
    ) -> Result<Arc<dyn Embedder>, EmbeddingError> {
        let emb = &config.embedding;
        match emb.provider {
            EmbeddingProvider::Fastembed => {
                let timeout = Duration::from_secs(emb.download_timeout_secs);
                let model = EmbeddingModel::new(&emb.model, base_path.to_path_buf(), Some(timeout))?;
                Ok(Arc::new(model))
            }
            EmbeddingProvider::Hashing => Ok(Arc::new(HashingEmbedder::new(emb.dimensions)?)),
        }
    }

    /// Full recommender over the CSV log. A model that fails to load yields a
    /// disabled recommender rather than an error.
    pub fn create_recommender(
        paths: &AppPaths,
        config: &Config,
        store: Arc<BackendCsv>,
    ) -> Result<Recommender> {
        let registry = Self::create_registry(config)?;
        let embedder = Self::create_embedder(config, &paths.base_path);

        Ok(Recommender::from_embedder(
            embedder,
            registry,
            store,
            config.recommender.clone(),
        ))
    }

    fn get_base_path() -> Result<PathBuf> {
        if let Ok(base_path) = std::env::var("PREC_BASE_PATH") {
            return Ok(PathBuf::from(base_path));
        }

        let home = my_home()
            .map_err(|e| anyhow::anyhow!("Could not determine home directory: {e:?}"))?
            .context("Home directory path is empty")?;
        Ok(home.join(".local/share/persona-rec"))
    }
}

/// Application paths structure
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub base_path: PathBuf,
    pub conversations_path: PathBuf,
}

impl AppPaths {
    pub fn new<P: Into<PathBuf>>(base_path: P) -> Self {
        let base_path = base_path.into();
        Self {
            conversations_path: base_path.join("conversations.csv"),
            base_path,
        }
    }
}
