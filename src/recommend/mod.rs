//! Hybrid persona recommendation.
//!
//! `Recommender` owns everything a request needs: the embedder, the persona
//! registry with its precomputed vectors, the interaction store and the
//! profile memo. Requests share it read-only.

pub mod collaborative;
pub mod content;
pub mod fusion;

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::config::RecommenderConfig;
use crate::conversations::{InteractionStore, StoreError, UserId};
use crate::personas::PersonaRegistry;
use crate::semantic::{persona_profile_text, Embedder, EmbeddingError, ProfileCache};

pub use fusion::{Recommendation, Strategy};

/// persona_id -> score
pub type ScoreMap = HashMap<String, f32>;

/// persona_id -> persona vector, ordered by id
pub type PersonaVectors = BTreeMap<String, Vec<f32>>;

#[derive(thiserror::Error, Debug)]
pub enum RecommendError {
    #[error("embedding model unavailable, recommendations are disabled")]
    EmbeddingUnavailable,

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("recommendation task failed: {0}")]
    Task(String),
}

/// Result of one request.
#[derive(Debug, Clone, Serialize)]
pub struct RecommendationSet {
    pub user_id: UserId,
    pub strategy: Strategy,
    pub alpha: f32,
    pub items: Vec<Recommendation>,
}

impl RecommendationSet {
    pub fn ids(&self) -> Vec<String> {
        self.items.iter().map(|r| r.persona_id.clone()).collect()
    }
}

struct Engine {
    embedder: Arc<dyn Embedder>,
    persona_vectors: PersonaVectors,
}

pub struct Recommender {
    /// None when the embedding model could not be loaded
    engine: Option<Engine>,
    registry: Arc<PersonaRegistry>,
    store: Arc<dyn InteractionStore>,
    config: RecommenderConfig,
    profiles: ProfileCache,
}

impl Recommender {
    /// Build a recommender, embedding every persona up front.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        registry: Arc<PersonaRegistry>,
        store: Arc<dyn InteractionStore>,
        config: RecommenderConfig,
    ) -> Result<Self, RecommendError> {
        let persona_vectors = Self::embed_personas(embedder.as_ref(), &registry)?;

        log::info!(
            "Recommender ready: {} personas embedded with '{}' ({} dims)",
            persona_vectors.len(),
            embedder.name(),
            embedder.dimensions()
        );

        Ok(Self {
            engine: Some(Engine {
                embedder,
                persona_vectors,
            }),
            profiles: ProfileCache::new(config.cache_capacity),
            registry,
            store,
            config,
        })
    }

    /// A recommender whose every request fails with `EmbeddingUnavailable`.
    pub fn disabled(
        registry: Arc<PersonaRegistry>,
        store: Arc<dyn InteractionStore>,
        config: RecommenderConfig,
    ) -> Self {
        Self {
            engine: None,
            profiles: ProfileCache::new(0),
            registry,
            store,
            config,
        }
    }

    /// Build from the outcome of loading the embedding model, degrading to a
    /// disabled recommender instead of failing.
    pub fn from_embedder(
        embedder: Result<Arc<dyn Embedder>, EmbeddingError>,
        registry: Arc<PersonaRegistry>,
        store: Arc<dyn InteractionStore>,
        config: RecommenderConfig,
    ) -> Self {
        let embedder = match embedder {
            Ok(embedder) => embedder,
            Err(e) => {
                log::error!("embedding model failed to load, recommendations disabled: {e}");
                return Self::disabled(registry, store, config);
            }
        };

        match Self::new(embedder, registry.clone(), store.clone(), config.clone()) {
            Ok(recommender) => recommender,
            Err(e) => {
                log::error!("failed to embed personas, recommendations disabled: {e}");
                Self::disabled(registry, store, config)
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.engine.is_some()
    }

    pub fn registry(&self) -> &PersonaRegistry {
        &self.registry
    }

    /// Up to `k` persona ids for `user_id`, best first.
    ///
    /// `alpha` and `k` fall back to the configured defaults.
    pub fn recommend(
        &self,
        user_id: &UserId,
        alpha: Option<f32>,
        k: Option<usize>,
    ) -> Result<Vec<String>, RecommendError> {
        self.recommend_detailed(user_id, alpha, k).map(|set| set.ids())
    }

    pub fn recommend_detailed(
        &self,
        user_id: &UserId,
        alpha: Option<f32>,
        k: Option<usize>,
    ) -> Result<RecommendationSet, RecommendError> {
        let engine = self
            .engine
            .as_ref()
            .ok_or(RecommendError::EmbeddingUnavailable)?;

        let alpha = alpha
            .filter(|a| a.is_finite())
            .unwrap_or(self.config.alpha)
            .clamp(0.0, 1.0);
        let k = k.unwrap_or(self.config.top_k);

        let _span = tracing::info_span!("recommend", user = %user_id, alpha, k).entered();

        let interacted: BTreeSet<String> = self
            .store
            .user_messages(user_id)?
            .into_iter()
            .map(|r| r.persona_id)
            .filter(|persona_id| self.registry.contains(persona_id))
            .collect();

        if interacted.is_empty() {
            let pool: Vec<String> = self.registry.ids().map(str::to_string).collect();
            let picked = fusion::cold_start(&pool, k, &mut rand::rng());
            log::info!("cold start for user {user_id}: {picked:?}");

            return Ok(RecommendationSet {
                user_id: user_id.clone(),
                strategy: Strategy::ColdStart,
                alpha,
                items: picked
                    .into_iter()
                    .map(|persona_id| Recommendation {
                        persona_id,
                        score: 0.0,
                        content_score: 0.0,
                        collab_score: 0.0,
                        novel: true,
                    })
                    .collect(),
            });
        }

        let (content, collab) = rayon::join(
            || {
                content::content_scores(
                    self.store.as_ref(),
                    engine.embedder.as_ref(),
                    &engine.persona_vectors,
                    user_id,
                    self.config.recency_window,
                )
            },
            || {
                if alpha >= 1.0 {
                    log::debug!("alpha is 1.0, skipping collaborative scores");
                    return Ok(ScoreMap::new());
                }
                self.collaborative(engine, user_id)
            },
        );
        let content = content?;
        let collab = collab?;

        let ranked = fusion::fuse(&content, &collab, alpha, &interacted);
        log::debug!("fused ranking for user {user_id}: {ranked:?}");

        let (strategy, items) = fusion::select(ranked, k);
        log::info!(
            "recommendations for user {user_id} ({strategy:?}): {:?}",
            items.iter().map(|r| &r.persona_id).collect::<Vec<_>>()
        );

        Ok(RecommendationSet {
            user_id: user_id.clone(),
            strategy,
            alpha,
            items,
        })
    }

    /// Run `recommend_detailed` on the blocking pool so async callers are not stalled.
    pub async fn recommend_async(
        self: Arc<Self>,
        user_id: UserId,
        alpha: Option<f32>,
        k: Option<usize>,
    ) -> Result<RecommendationSet, RecommendError> {
        tokio::task::spawn_blocking(move || self.recommend_detailed(&user_id, alpha, k))
            .await
            .map_err(|e| RecommendError::Task(e.to_string()))?
    }

    fn collaborative(&self, engine: &Engine, user_id: &UserId) -> Result<ScoreMap, RecommendError> {
        let messages = self.store.all_messages()?;
        let interactions = self.store.all_interactions()?;

        let profiles = collaborative::user_profiles(
            &messages,
            &self.registry,
            engine.embedder.as_ref(),
            &self.profiles,
        )?;

        let raw = collaborative::collaborative_scores(
            user_id,
            &profiles,
            &interactions,
            &self.registry,
            self.config.neighbors,
        );
        let normalized = collaborative::normalize(&raw);
        log::debug!("collaborative scores for user {user_id}: {normalized:?}");
        Ok(normalized)
    }

    fn embed_personas(
        embedder: &dyn Embedder,
        registry: &PersonaRegistry,
    ) -> Result<PersonaVectors, RecommendError> {
        let ids: Vec<String> = registry.ids().map(str::to_string).collect();
        let texts: Vec<String> = registry
            .iter()
            .map(|p| persona_profile_text(&p.description, &p.system_prompt))
            .collect();

        let vectors = embedder.embed_batch(&texts)?;
        if vectors.len() != ids.len() {
            return Err(EmbeddingError::EmbeddingFailed(format!(
                "expected {} persona embeddings, got {}",
                ids.len(),
                vectors.len()
            ))
            .into());
        }

        Ok(ids.into_iter().zip(vectors).collect())
    }
}
