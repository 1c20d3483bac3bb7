//! ============================================================================
//! Memory Types - Records, collections and agent payloads
//! ============================================================================
//! Records are typed here and only become string-keyed payload maps at the
//! store boundary (`to_payload` / `from_payload`).
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{MemoryError, MemoryResult};

/// Payload attached to a stored point
pub type Payload = HashMap<String, String>;

/// Sentinel returned by `retrieve` when all three searches come back empty
pub const NO_MEMORY_SENTINEL: &str = "No previous memory found for this user.";

/// Research mode used when the agent result does not name one
pub const DEFAULT_MODE: &str = "quick";

/// Fact topic used when the agent result does not name one
pub const DEFAULT_TOPIC: &str = "general";

const PREFERENCES_HEADER: &str = "USER PREFERENCES:";
const RESEARCH_HEADER: &str = "PAST RESEARCH:";
const FACTS_HEADER: &str = "KEY FACTS FROM PAST SESSIONS:";

// Payload keys
const USER_ID: &str = "user_id";
const TIMESTAMP: &str = "timestamp";
const PREFERENCE: &str = "preference";
const QUERY: &str = "query";
const SUMMARY: &str = "summary";
const MODE: &str = "mode";
const FACT: &str = "fact";
const TOPIC: &str = "topic";

// ============================================================================
// Collections
// ============================================================================

/// The three logical collections of the memory store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    UserPreferences,
    ResearchHistory,
    KeyFacts,
}

impl Collection {
    /// All collections, in the order the reader renders them
    pub const ALL: [Collection; 3] = [
        Collection::UserPreferences,
        Collection::ResearchHistory,
        Collection::KeyFacts,
    ];

    /// Collection name in the vector store
    pub fn name(&self) -> &'static str {
        match self {
            Collection::UserPreferences => "user_preferences",
            Collection::ResearchHistory => "research_history",
            Collection::KeyFacts => "key_facts",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| format!("Unknown collection: {}", s))
    }
}

// ============================================================================
// Records
// ============================================================================

fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn required(payload: &Payload, collection: Collection, key: &str) -> MemoryResult<String> {
    payload
        .get(key)
        .cloned()
        .ok_or_else(|| MemoryError::malformed(collection.name(), key))
}

fn optional(payload: &Payload, key: &str, default: &str) -> String {
    payload
        .get(key)
        .cloned()
        .unwrap_or_else(|| default.to_string())
}

/// One statement of user preference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceRecord {
    pub id: Uuid,
    pub user_id: String,
    pub preference: String,
    pub timestamp: String,
}

impl PreferenceRecord {
    pub fn new(user_id: &str, preference: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            preference: preference.to_string(),
            timestamp: now_iso8601(),
        }
    }
}

/// One past research interaction. Embedded by its query, not its summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchRecord {
    pub id: Uuid,
    pub user_id: String,
    pub query: String,
    pub summary: String,
    /// Free-form label such as "quick" or "deep"
    pub mode: String,
    pub timestamp: String,
}

impl ResearchRecord {
    pub fn new(user_id: &str, query: &str, summary: &str, mode: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            query: query.to_string(),
            summary: summary.to_string(),
            mode: mode.to_string(),
            timestamp: now_iso8601(),
        }
    }
}

/// One atomic extracted fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRecord {
    pub id: Uuid,
    pub user_id: String,
    pub fact: String,
    pub topic: String,
    pub timestamp: String,
}

impl FactRecord {
    pub fn new(user_id: &str, fact: &str, topic: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            fact: fact.to_string(),
            topic: topic.to_string(),
            timestamp: now_iso8601(),
        }
    }
}

/// A record of any kind, tagged by its collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemoryRecord {
    Preference(PreferenceRecord),
    Research(ResearchRecord),
    Fact(FactRecord),
}

impl MemoryRecord {
    /// Collection this record lives in
    pub fn collection(&self) -> Collection {
        match self {
            MemoryRecord::Preference(_) => Collection::UserPreferences,
            MemoryRecord::Research(_) => Collection::ResearchHistory,
            MemoryRecord::Fact(_) => Collection::KeyFacts,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            MemoryRecord::Preference(r) => r.id,
            MemoryRecord::Research(r) => r.id,
            MemoryRecord::Fact(r) => r.id,
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            MemoryRecord::Preference(r) => &r.user_id,
            MemoryRecord::Research(r) => &r.user_id,
            MemoryRecord::Fact(r) => &r.user_id,
        }
    }

    /// The text whose embedding becomes this record's vector
    pub fn embedding_text(&self) -> &str {
        match self {
            MemoryRecord::Preference(r) => &r.preference,
            MemoryRecord::Research(r) => &r.query,
            MemoryRecord::Fact(r) => &r.fact,
        }
    }

    /// Flatten into the store's payload map
    pub fn to_payload(&self) -> Payload {
        let mut payload = Payload::new();
        match self {
            MemoryRecord::Preference(r) => {
                payload.insert(USER_ID.into(), r.user_id.clone());
                payload.insert(PREFERENCE.into(), r.preference.clone());
                payload.insert(TIMESTAMP.into(), r.timestamp.clone());
            }
            MemoryRecord::Research(r) => {
                payload.insert(USER_ID.into(), r.user_id.clone());
                payload.insert(QUERY.into(), r.query.clone());
                payload.insert(SUMMARY.into(), r.summary.clone());
                payload.insert(MODE.into(), r.mode.clone());
                payload.insert(TIMESTAMP.into(), r.timestamp.clone());
            }
            MemoryRecord::Fact(r) => {
                payload.insert(USER_ID.into(), r.user_id.clone());
                payload.insert(FACT.into(), r.fact.clone());
                payload.insert(TOPIC.into(), r.topic.clone());
                payload.insert(TIMESTAMP.into(), r.timestamp.clone());
            }
        }
        payload
    }

    /// Rebuild a record from a stored payload.
    ///
    /// `user_id` and the text fields are required. `timestamp`, `mode` and
    /// `topic` fall back to defaults since rendering does not depend on them.
    pub fn from_payload(collection: Collection, id: Uuid, payload: &Payload) -> MemoryResult<Self> {
        let user_id = required(payload, collection, USER_ID)?;
        let timestamp = optional(payload, TIMESTAMP, "");

        let record = match collection {
            Collection::UserPreferences => MemoryRecord::Preference(PreferenceRecord {
                id,
                user_id,
                preference: required(payload, collection, PREFERENCE)?,
                timestamp,
            }),
            Collection::ResearchHistory => MemoryRecord::Research(ResearchRecord {
                id,
                user_id,
                query: required(payload, collection, QUERY)?,
                summary: required(payload, collection, SUMMARY)?,
                mode: optional(payload, MODE, DEFAULT_MODE),
                timestamp,
            }),
            Collection::KeyFacts => MemoryRecord::Fact(FactRecord {
                id,
                user_id,
                fact: required(payload, collection, FACT)?,
                topic: optional(payload, TOPIC, DEFAULT_TOPIC),
                timestamp,
            }),
        };

        Ok(record)
    }
}

// ============================================================================
// Agent payloads
// ============================================================================

/// Output of one agent turn, as handed to `MemoryManager::store`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub preference: Option<String>,
    #[serde(default)]
    pub fact: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
}

impl AgentResult {
    pub fn summary(&self) -> &str {
        self.summary.as_deref().unwrap_or("")
    }

    pub fn mode(&self) -> &str {
        self.mode.as_deref().unwrap_or(DEFAULT_MODE)
    }

    pub fn topic(&self) -> &str {
        self.topic.as_deref().unwrap_or(DEFAULT_TOPIC)
    }

    /// Preference to store, if present and non-empty
    pub fn preference(&self) -> Option<&str> {
        self.preference.as_deref().filter(|p| !p.is_empty())
    }

    /// Fact to store, if present and non-empty
    pub fn fact(&self) -> Option<&str> {
        self.fact.as_deref().filter(|f| !f.is_empty())
    }
}

/// Result of a `clear` request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearOutcome {
    /// Forgetting a user is not implemented; nothing was removed
    NotSupported,
}

// ============================================================================
// Recalled context
// ============================================================================

/// Records recalled for one query, grouped by section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecalledContext {
    pub preferences: Vec<PreferenceRecord>,
    pub research: Vec<ResearchRecord>,
    pub facts: Vec<FactRecord>,
}

impl RecalledContext {
    pub fn is_empty(&self) -> bool {
        self.preferences.is_empty() && self.research.is_empty() && self.facts.is_empty()
    }

    /// Sort a recalled record into its section, keeping arrival order
    pub fn push(&mut self, record: MemoryRecord) {
        match record {
            MemoryRecord::Preference(r) => self.preferences.push(r),
            MemoryRecord::Research(r) => self.research.push(r),
            MemoryRecord::Fact(r) => self.facts.push(r),
        }
    }

    /// Render the context block handed back to the agent.
    ///
    /// Sections appear in fixed order and are separated by a blank line;
    /// empty sections are omitted. Returns [`NO_MEMORY_SENTINEL`] when
    /// nothing was recalled.
    ///
    /// The block never starts with a newline. Older agents prefixed
    /// `"\nPAST RESEARCH:"` even when no preferences preceded it, leaving a
    /// stray leading blank line; here `PAST RESEARCH:` opens the block when it
    /// is the first non-empty section.
    pub fn render(&self) -> String {
        let mut sections: Vec<String> = Vec::new();

        if !self.preferences.is_empty() {
            let mut section = format!("{}\n", PREFERENCES_HEADER);
            for p in &self.preferences {
                section.push_str(&format!("  - {}\n", p.preference));
            }
            sections.push(section);
        }

        if !self.research.is_empty() {
            let mut section = format!("{}\n", RESEARCH_HEADER);
            for r in &self.research {
                section.push_str(&format!("  - Asked: {}\n", r.query));
                section.push_str(&format!("    Summary: {}\n", r.summary));
            }
            sections.push(section);
        }

        if !self.facts.is_empty() {
            let mut section = format!("{}\n", FACTS_HEADER);
            for f in &self.facts {
                section.push_str(&format!("  - {}\n", f.fact));
            }
            sections.push(section);
        }

        if sections.is_empty() {
            return NO_MEMORY_SENTINEL.to_string();
        }

        sections.join("\n")
    }
}
