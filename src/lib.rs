//! Hybrid persona recommendations from conversation history.
//!
//! Content affinity (a user's recent messages vs. each persona's own text) is
//! fused with collaborative affinity (what similar users talk to) into a short
//! ranked list of persona ids.

pub mod config;
pub mod conversations;
pub mod factory;
pub mod personas;
pub mod recommend;
pub mod semantic;
#[cfg(test)]
mod tests;

pub use conversations::{ConversationRecord, InteractionStore, Role, UserId};
pub use personas::{Persona, PersonaRegistry};
pub use recommend::{RecommendError, Recommendation, RecommendationSet, Recommender, Strategy};
