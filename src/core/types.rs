//! Common types used across the ledger.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Anchor value stored as the `previous_hash` of a department genesis block.
pub const GENESIS_SENTINEL: &str = "0";

/// A block hash as lowercase hex (SHA-256), or the genesis sentinel.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockHash(String);

impl BlockHash {
    /// Wrap an existing hex string.
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// The root-tier genesis anchor.
    pub fn sentinel() -> Self {
        Self(GENESIS_SENTINEL.to_string())
    }

    /// Whether this is the root-tier genesis anchor.
    pub fn is_sentinel(&self) -> bool {
        self.0 == GENESIS_SENTINEL
    }

    /// SHA-256 of the concatenated chunks, hex encoded.
    pub fn digest(chunks: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for chunk in chunks {
            hasher.update(chunk);
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// True when the hash starts with `difficulty` zero hex digits.
    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        self.0.len() >= difficulty && self.0.bytes().take(difficulty).all(|b| b == b'0')
    }

    /// Get the hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BlockHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque, stable identifier of a department, class or student.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Create an ID from an existing string.
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    /// Generate a unique ID.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the ID string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Position of a chain in the anchoring hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Root tier, anchored to the sentinel
    Department,
    /// Mid tier, anchored to a department
    Class,
    /// Leaf tier, anchored to a class; carries attendance
    Student,
}

impl Tier {
    /// All tiers, root first.
    pub const ALL: [Tier; 3] = [Tier::Department, Tier::Class, Tier::Student];

    /// Tier of the chain this tier anchors to.
    pub fn parent(self) -> Option<Tier> {
        match self {
            Tier::Department => None,
            Tier::Class => Some(Tier::Department),
            Tier::Student => Some(Tier::Class),
        }
    }

    /// Tier of the chains anchored under this one.
    pub fn child(self) -> Option<Tier> {
        match self {
            Tier::Department => Some(Tier::Class),
            Tier::Class => Some(Tier::Student),
            Tier::Student => None,
        }
    }

    /// Human-readable tier name.
    pub fn label(self) -> &'static str {
        match self {
            Tier::Department => "Department",
            Tier::Class => "Class",
            Tier::Student => "Student",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Timestamp wrapper for consistent serialization.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Get current UTC timestamp.
pub fn now() -> Timestamp {
    chrono::Utc::now()
}
