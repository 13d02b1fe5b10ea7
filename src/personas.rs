use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub system_prompt: String,
}

/// Listing shape without the system prompt.
#[derive(Debug, Clone, Serialize)]
pub struct PersonaSummary<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub description: &'a str,
    pub image: Option<&'a str>,
}

#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("io error: {0:?}")]
    IO(#[from] std::io::Error),

    #[error("personas file is malformed: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("persona registry is empty")]
    Empty,

    #[error("persona #{0} has an empty id")]
    BlankId(usize),

    #[error("duplicate persona id {0}")]
    DuplicateId(String),
}

/// Immutable set of recommendable personas, ordered by id.
#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    personas: BTreeMap<String, Persona>,
}

impl PersonaRegistry {
    pub fn new(personas: Vec<Persona>) -> Result<Self, RegistryError> {
        if personas.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut map = BTreeMap::new();
        for (idx, mut persona) in personas.into_iter().enumerate() {
            persona.id = persona.id.trim().to_string();
            if persona.id.is_empty() {
                return Err(RegistryError::BlankId(idx + 1));
            }
            if map.contains_key(&persona.id) {
                return Err(RegistryError::DuplicateId(persona.id));
            }
            map.insert(persona.id.clone(), persona);
        }

        Ok(Self { personas: map })
    }

    /// Load a YAML list of personas.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let personas: Vec<Persona> = serde_yml::from_str(&raw)?;
        let registry = Self::new(personas)?;
        log::info!(
            "Loaded {} personas from {}",
            registry.len(),
            path.as_ref().display()
        );
        Ok(registry)
    }

    pub fn builtin() -> Self {
        let personas = builtin_personas()
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();
        Self { personas }
    }

    pub fn get(&self, id: &str) -> Option<&Persona> {
        self.personas.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.personas.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.personas.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Persona> {
        self.personas.values()
    }

    pub fn summaries(&self) -> Vec<PersonaSummary<'_>> {
        self.iter()
            .map(|p| PersonaSummary {
                id: &p.id,
                name: &p.name,
                description: &p.description,
                image: p.image.as_deref(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}

fn builtin_personas() -> Vec<Persona> {
    vec![
        Persona {
            id: "AIKO_CHAN".to_string(),
            name: "Aiko Chan".to_string(),
            description: "A cheerful virtual best friend who is always there to cheer you on."
                .to_string(),
            image: Some("/photo/waifu.jpg".to_string()),
            system_prompt: "You are Aiko, a cheerful and supportive anime girl and the user's \
                virtual best friend. Listen, encourage, and help the user feel better. Stay \
                optimistic, empathetic and non-judgmental. Sprinkle casual Japanese such as \
                Ganbatte, Daijoubu and Ehehe. Keep the conversation on the user: ask about \
                their day, their feelings and the things they love. You are not a therapist; \
                offer emotional support and gently suggest talking to a professional when a \
                topic is sensitive."
                .to_string(),
        },
        Persona {
            id: "HINATA_CHAN".to_string(),
            name: "Hinata Chan".to_string(),
            description: "A cool, logical rival who always challenges you to do better."
                .to_string(),
            image: Some("/photo/waifu2.jpg".to_string()),
            system_prompt: "You are Hinata, a sharp and logical career consultant for \
                {user_name}. Challenge the user to prepare their career strategically: CV, \
                portfolio, interviews and job applications. Be analytical and to the point, \
                focus on preparation, data and results, and never hand out empty praise. When \
                asked about job openings, first question whether their CV and portfolio are \
                ready, then search for vacancies that fit their level."
                .to_string(),
        },
        Persona {
            id: "YUNA_CHAN".to_string(),
            name: "Yuna Chan".to_string(),
            description: "A shy genius programmer with deep technical knowledge.".to_string(),
            image: Some("/photo/waifu3.jpg".to_string()),
            system_prompt: "You are Yuna, a shy and introverted genius programmer who is more \
                comfortable talking about data, logic and technology than feelings. Be \
                intelligent, analytical and detailed, answer technical questions about code, \
                algorithms and software with textbook accuracy, speak briefly and hesitantly, \
                and steer emotional topics back towards logic."
                .to_string(),
        },
    ]
}
