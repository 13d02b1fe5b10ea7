use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    cmp::Ordering,
    collections::BTreeSet,
    fmt::Display,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
    sync::{Arc, RwLock},
    time::Instant,
};

/// Opaque user identifier issued by the authentication layer.
///
/// Ids that parse as unsigned integers order numerically and sort before any
/// non-numeric id; everything else orders lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn numeric(&self) -> Option<u64> {
        self.0.parse::<u64>().ok()
    }
}

impl Ord for UserId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for UserId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(fr: &str) -> Self {
        UserId(fr.trim().to_string())
    }
}

impl From<String> for UserId {
    fn from(fr: String) -> Self {
        UserId::from(fr.as_str())
    }
}

impl From<u64> for UserId {
    fn from(fr: u64) -> Self {
        UserId(fr.to_string())
    }
}

impl FromStr for UserId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(UserId::from(s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Ai,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Human => "human",
            Role::Ai => "ai",
        }
    }
}

impl FromStr for Role {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "human" | "user" => Ok(Role::Human),
            "ai" | "assistant" => Ok(Role::Ai),
            other => Err(StoreError::InvalidRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub user_id: UserId,
    pub persona_id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("io error: {0:?}")]
    IO(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed record at row {row}: {reason}")]
    Malformed { row: usize, reason: String },

    #[error("invalid role: {0}")]
    InvalidRole(String),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Read contract over persisted conversation records.
///
/// Empty results are valid; only I/O problems are errors.
pub trait InteractionStore: Send + Sync {
    /// At most `limit` messages between `user_id` and `persona_id`, newest first.
    fn recent_messages(
        &self,
        user_id: &UserId,
        persona_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationRecord>, StoreError>;

    /// Distinct (user, persona) pairs that have at least one message.
    fn all_interactions(&self) -> Result<Vec<(UserId, String)>, StoreError>;

    fn all_messages(&self) -> Result<Vec<ConversationRecord>, StoreError>;

    /// Every message of one user, in storage order.
    fn user_messages(&self, user_id: &UserId) -> Result<Vec<ConversationRecord>, StoreError> {
        Ok(self
            .all_messages()?
            .into_iter()
            .filter(|r| &r.user_id == user_id)
            .collect())
    }
}

fn recent_from(
    records: &[ConversationRecord],
    user_id: &UserId,
    persona_id: &str,
    limit: usize,
) -> Vec<ConversationRecord> {
    // Reverse first so insertion order breaks timestamp ties newest-first.
    let mut matched: Vec<ConversationRecord> = records
        .iter()
        .rev()
        .filter(|r| &r.user_id == user_id && r.persona_id == persona_id)
        .cloned()
        .collect();

    matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    matched.truncate(limit);
    matched
}

fn user_from(records: &[ConversationRecord], user_id: &UserId) -> Vec<ConversationRecord> {
    records
        .iter()
        .filter(|r| &r.user_id == user_id)
        .cloned()
        .collect()
}

fn interactions_from(records: &[ConversationRecord]) -> Vec<(UserId, String)> {
    records
        .iter()
        .map(|r| (r.user_id.clone(), r.persona_id.clone()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct BackendMemory {
    list: Arc<RwLock<Vec<ConversationRecord>>>,
}

impl BackendMemory {
    pub fn new(records: Vec<ConversationRecord>) -> Self {
        Self {
            list: Arc::new(RwLock::new(records)),
        }
    }

    pub fn append(&self, record: ConversationRecord) -> Result<(), StoreError> {
        self.list
            .write()
            .map_err(|_| StoreError::Poisoned)?
            .push(record);
        Ok(())
    }
}

impl InteractionStore for BackendMemory {
    fn recent_messages(
        &self,
        user_id: &UserId,
        persona_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationRecord>, StoreError> {
        let records = self.list.read().map_err(|_| StoreError::Poisoned)?;
        Ok(recent_from(&records, user_id, persona_id, limit))
    }

    fn all_interactions(&self) -> Result<Vec<(UserId, String)>, StoreError> {
        let records = self.list.read().map_err(|_| StoreError::Poisoned)?;
        Ok(interactions_from(&records))
    }

    fn all_messages(&self) -> Result<Vec<ConversationRecord>, StoreError> {
        let records = self.list.read().map_err(|_| StoreError::Poisoned)?;
        Ok(records.clone())
    }

    fn user_messages(&self, user_id: &UserId) -> Result<Vec<ConversationRecord>, StoreError> {
        let records = self.list.read().map_err(|_| StoreError::Poisoned)?;
        Ok(user_from(&records, user_id))
    }
}

const CSV_HEADERS: [&str; 5] = ["user_id", "persona_id", "role", "content", "timestamp"];

/// Conversation log kept as a CSV file and served from memory.
#[derive(Debug, Clone)]
pub struct BackendCsv {
    list: Arc<RwLock<Vec<ConversationRecord>>>,
    path: PathBuf,
}

impl BackendCsv {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();

        if let Err(err) = std::fs::metadata(path) {
            match err.kind() {
                ErrorKind::NotFound => {
                    log::info!("Creating new conversation log at {}", path.display());
                    let mut csv_wrt = csv::Writer::from_path(path)?;
                    csv_wrt.write_record(CSV_HEADERS)?;
                    csv_wrt.flush()?;
                }
                _ => Err(err)?,
            }
        }

        let now = Instant::now();
        let mut csv_reader = csv::Reader::from_path(path)?;

        let mut records = vec![];
        for (idx, row) in csv_reader.records().enumerate() {
            let row = row?;
            // header is row 1
            records.push(Self::parse_row(&row, idx + 2)?);
        }

        log::debug!(
            "took {}ms to read {} conversation records",
            now.elapsed().as_micros() as f64 / 1000.0,
            records.len()
        );

        Ok(BackendCsv {
            list: Arc::new(RwLock::new(records)),
            path: path.to_path_buf(),
        })
    }

    fn parse_row(row: &csv::StringRecord, row_number: usize) -> Result<ConversationRecord, StoreError> {
        let field = |idx: usize, name: &str| {
            row.get(idx).ok_or_else(|| StoreError::Malformed {
                row: row_number,
                reason: format!("missing {name}"),
            })
        };

        let user_id = UserId::from(field(0, "user_id")?);
        let persona_id = field(1, "persona_id")?.trim().to_string();
        let role = Role::from_str(field(2, "role")?)?;
        let content = field(3, "content")?.to_string();
        let timestamp = DateTime::parse_from_rfc3339(field(4, "timestamp")?.trim())
            .map_err(|e| StoreError::Malformed {
                row: row_number,
                reason: format!("bad timestamp: {e}"),
            })?
            .with_timezone(&Utc);

        if user_id.as_str().is_empty() || persona_id.is_empty() {
            return Err(StoreError::Malformed {
                row: row_number,
                reason: "empty user_id or persona_id".to_string(),
            });
        }

        Ok(ConversationRecord {
            user_id,
            persona_id,
            role,
            content,
            timestamp,
        })
    }

    /// Append a record and write it through to disk.
    pub fn append(&self, record: ConversationRecord) -> Result<(), StoreError> {
        let mut records = self.list.write().map_err(|_| StoreError::Poisoned)?;

        let file = std::fs::OpenOptions::new().append(true).open(&self.path)?;
        let mut csv_wrt = csv::Writer::from_writer(file);
        csv_wrt.write_record([
            record.user_id.as_str(),
            &record.persona_id,
            record.role.as_str(),
            &record.content,
            &record.timestamp.to_rfc3339(),
        ])?;
        csv_wrt.flush()?;

        records.push(record);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.list.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl InteractionStore for BackendCsv {
    fn recent_messages(
        &self,
        user_id: &UserId,
        persona_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationRecord>, StoreError> {
        let records = self.list.read().map_err(|_| StoreError::Poisoned)?;
        Ok(recent_from(&records, user_id, persona_id, limit))
    }

    fn all_interactions(&self) -> Result<Vec<(UserId, String)>, StoreError> {
        let records = self.list.read().map_err(|_| StoreError::Poisoned)?;
        Ok(interactions_from(&records))
    }

    fn all_messages(&self) -> Result<Vec<ConversationRecord>, StoreError> {
        let records = self.list.read().map_err(|_| StoreError::Poisoned)?;
        Ok(records.clone())
    }

    fn user_messages(&self, user_id: &UserId) -> Result<Vec<ConversationRecord>, StoreError> {
        let records = self.list.read().map_err(|_| StoreError::Poisoned)?;
        Ok(user_from(&records, user_id))
    }
}
