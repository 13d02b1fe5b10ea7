//! Content affinity: the user's recent conversation with each persona compared
//! against that persona's own text.

use crate::conversations::{InteractionStore, UserId};
use crate::semantic::{cosine_similarity, join_messages, Embedder, EmbeddingError};

use super::{PersonaVectors, RecommendError, ScoreMap};

/// Score every persona in `persona_vectors` for `user_id`.
///
/// Personas without messages (or with only blank messages) score exactly 0.0.
/// Negative similarity counts as no affinity, so scores lie in [0, 1].
pub fn content_scores(
    store: &dyn InteractionStore,
    embedder: &dyn Embedder,
    persona_vectors: &PersonaVectors,
    user_id: &UserId,
    recency_window: usize,
) -> Result<ScoreMap, RecommendError> {
    let mut scores = ScoreMap::with_capacity(persona_vectors.len());
    let mut pending_ids = Vec::new();
    let mut pending_texts = Vec::new();

    for persona_id in persona_vectors.keys() {
        let messages = store.recent_messages(user_id, persona_id, recency_window)?;
        let text = join_messages(messages.iter().map(|m| m.content.as_str()));

        if text.is_empty() {
            scores.insert(persona_id.clone(), 0.0);
        } else {
            pending_ids.push(persona_id);
            pending_texts.push(text);
        }
    }

    let vectors = embedder.embed_batch(&pending_texts)?;
    if vectors.len() != pending_texts.len() {
        return Err(EmbeddingError::EmbeddingFailed(format!(
            "expected {} embeddings, got {}",
            pending_texts.len(),
            vectors.len()
        ))
        .into());
    }

    for (persona_id, vector) in pending_ids.into_iter().zip(vectors) {
        let similarity = persona_vectors
            .get(persona_id)
            .map(|persona_vector| cosine_similarity(&vector, persona_vector))
            .unwrap_or(0.0);
        scores.insert(persona_id.clone(), similarity.clamp(0.0, 1.0));
    }

    log::debug!("content scores for user {user_id}: {scores:?}");
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversations::{BackendMemory, ConversationRecord, Role};
    use crate::semantic::HashingEmbedder;
    use chrono::{TimeZone, Utc};

    fn record(user: &str, persona: &str, content: &str, secs: i64) -> ConversationRecord {
        ConversationRecord {
            user_id: UserId::from(user),
            persona_id: persona.to_string(),
            role: Role::Human,
            content: content.to_string(),
            timestamp: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        }
    }

    fn vectors(embedder: &HashingEmbedder, items: &[(&str, &str)]) -> PersonaVectors {
        items
            .iter()
            .map(|(id, text)| (id.to_string(), embedder.embed(text).unwrap()))
            .collect()
    }

    #[test]
    fn test_no_messages_scores_zero() {
        let embedder = HashingEmbedder::default();
        let store = BackendMemory::default();
        let personas = vectors(&embedder, &[("A", "cats"), ("B", "dogs")]);

        let scores = content_scores(&store, &embedder, &personas, &UserId::from("1"), 20).unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores["A"], 0.0);
        assert_eq!(scores["B"], 0.0);
    }

    #[test]
    fn test_matching_conversation_scores_high() {
        let embedder = HashingEmbedder::default();
        let store = BackendMemory::new(vec![
            record("1", "A", "cheerful support", 1),
            record("1", "A", "cheerful friend", 2),
        ]);
        let personas = vectors(
            &embedder,
            &[("A", "cheerful support friend"), ("B", "career portfolio")],
        );

        let scores = content_scores(&store, &embedder, &personas, &UserId::from("1"), 20).unwrap();
        assert!(scores["A"] > 0.8, "got {}", scores["A"]);
        assert!(scores["B"] < scores["A"]);
    }

    #[test]
    fn test_only_recent_window_counts() {
        let embedder = HashingEmbedder::default();
        let store = BackendMemory::new(vec![
            record("1", "A", "portfolio interview", 1),
            record("1", "A", "cheerful", 2),
            record("1", "A", "cheerful", 3),
        ]);
        let personas = vectors(&embedder, &[("A", "portfolio interview")]);

        let wide = content_scores(&store, &embedder, &personas, &UserId::from("1"), 20).unwrap();
        let narrow = content_scores(&store, &embedder, &personas, &UserId::from("1"), 2).unwrap();
        assert!(wide["A"] > 0.0);
        assert!(narrow["A"] < wide["A"]);
    }

    #[test]
    fn test_other_users_ignored() {
        let embedder = HashingEmbedder::default();
        let store = BackendMemory::new(vec![record("2", "A", "cats", 1)]);
        let personas = vectors(&embedder, &[("A", "cats")]);

        let scores = content_scores(&store, &embedder, &personas, &UserId::from("1"), 20).unwrap();
        assert_eq!(scores["A"], 0.0);
    }
}
