//! Collaborative affinity: users whose whole conversational profile resembles
//! the target user's vote for the personas they talk to.

use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::conversations::{ConversationRecord, UserId};
use crate::personas::PersonaRegistry;
use crate::semantic::{
    content_hash, cosine_similarity, join_messages, Embedder, EmbeddingError, ProfileCache,
};

use super::{RecommendError, ScoreMap};

/// Aggregate vector per user, ordered by user id.
pub type UserProfiles = BTreeMap<UserId, Arc<Vec<f32>>>;

/// Embed the concatenation of every user's messages with known personas.
///
/// Users whose history hash matches a cached entry are not re-embedded.
pub fn user_profiles(
    messages: &[ConversationRecord],
    registry: &PersonaRegistry,
    embedder: &dyn Embedder,
    cache: &ProfileCache,
) -> Result<UserProfiles, RecommendError> {
    let mut by_user: BTreeMap<&UserId, Vec<&str>> = BTreeMap::new();
    let mut orphaned = 0usize;

    for msg in messages {
        if !registry.contains(&msg.persona_id) {
            orphaned += 1;
            continue;
        }
        by_user
            .entry(&msg.user_id)
            .or_default()
            .push(msg.content.as_str());
    }

    if orphaned > 0 {
        log::debug!("ignored {orphaned} messages that reference unknown personas");
    }

    let mut profiles = UserProfiles::new();
    let mut pending: Vec<(UserId, [u8; 32])> = Vec::new();
    let mut pending_texts = Vec::new();

    for (user_id, contents) in by_user {
        let text = join_messages(contents);
        let hash = content_hash(&text);

        match cache.get(user_id, &hash) {
            Some(vector) => {
                profiles.insert(user_id.clone(), vector);
            }
            None => {
                pending.push((user_id.clone(), hash));
                pending_texts.push(text);
            }
        }
    }

    log::debug!(
        "user profiles: {} cached, {} to embed",
        profiles.len(),
        pending.len()
    );

    let vectors = embedder.embed_batch(&pending_texts)?;
    if vectors.len() != pending.len() {
        return Err(EmbeddingError::EmbeddingFailed(format!(
            "expected {} embeddings, got {}",
            pending.len(),
            vectors.len()
        ))
        .into());
    }

    for ((user_id, hash), vector) in pending.into_iter().zip(vectors) {
        let vector = Arc::new(vector);
        cache.insert(user_id.clone(), hash, vector.clone());
        profiles.insert(user_id, vector);
    }

    Ok(profiles)
}

/// The `n` users most similar to `target`, best first, ties by ascending user id.
pub fn nearest_neighbors(target: &UserId, profiles: &UserProfiles, n: usize) -> Vec<(UserId, f32)> {
    let Some(target_vector) = profiles.get(target) else {
        return vec![];
    };

    let mut similarities: Vec<(UserId, f32)> = profiles
        .par_iter()
        .filter(|(user_id, _)| *user_id != target)
        .map(|(user_id, vector)| (user_id.clone(), cosine_similarity(target_vector, vector)))
        .collect();

    similarities.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    similarities.truncate(n);
    similarities
}

/// Raw collaborative scores: each neighbor adds its similarity to every known
/// persona it has talked to.
///
/// Empty when the target has no profile or there is nobody to compare with.
pub fn collaborative_scores(
    target: &UserId,
    profiles: &UserProfiles,
    interactions: &[(UserId, String)],
    registry: &PersonaRegistry,
    neighbors: usize,
) -> ScoreMap {
    let mut raw = ScoreMap::new();

    if profiles.len() < 2 || !profiles.contains_key(target) {
        log::debug!("no peers for user {target}, collaborative scores empty");
        return raw;
    }

    let mut personas_by_user: BTreeMap<&UserId, BTreeSet<&str>> = BTreeMap::new();
    for (user_id, persona_id) in interactions {
        if registry.contains(persona_id) {
            personas_by_user
                .entry(user_id)
                .or_default()
                .insert(persona_id.as_str());
        }
    }

    for (user_id, similarity) in nearest_neighbors(target, profiles, neighbors) {
        log::debug!("neighbor {user_id} similarity {similarity:.4}");
        let Some(personas) = personas_by_user.get(&user_id) else {
            continue;
        };
        for persona_id in personas {
            *raw.entry(persona_id.to_string()).or_insert(0.0) += similarity;
        }
    }

    raw
}

/// Scale raw scores by their maximum into [0, 1].
///
/// Empty stays empty; when no score is positive every score becomes 0.0.
pub fn normalize(raw: &ScoreMap) -> ScoreMap {
    let max = raw.values().copied().fold(f32::NEG_INFINITY, f32::max);

    raw.iter()
        .map(|(persona_id, score)| {
            let normalized = if max > 0.0 {
                (score / max).clamp(0.0, 1.0)
            } else {
                0.0
            };
            (persona_id.clone(), normalized)
        })
        .collect()
}
