//! Transaction payloads carried by ledger blocks.
//!
//! Every block holds exactly one tagged transaction. The serialized form is
//! part of the block hash, so field order and map ordering must stay stable:
//! struct fields serialize in declaration order and [`Fields`] is a `BTreeMap`.

use crate::core::{BlockHash, EntityId, Error, Tier, Timestamp};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Named entity fields (`name`, `rollNumber`, ...).
pub type Fields = BTreeMap<String, serde_json::Value>;

/// Attendance mark for one calendar date.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Leave,
}

impl FromStr for AttendanceStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Present" => Ok(AttendanceStatus::Present),
            "Absent" => Ok(AttendanceStatus::Absent),
            "Leave" => Ok(AttendanceStatus::Leave),
            other => Err(Error::InvalidAttendanceStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttendanceStatus::Present => write!(f, "Present"),
            AttendanceStatus::Absent => write!(f, "Absent"),
            AttendanceStatus::Leave => write!(f, "Leave"),
        }
    }
}

/// Payload tag without its data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Creation,
    Update,
    Deletion,
    Attendance,
}

/// A ledger transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Transaction {
    /// Genesis payload of every chain
    Creation {
        entity_id: EntityId,
        tier: Tier,
        parent_id: Option<EntityId>,
        /// Parent tip hash at creation time, mirrored from the block's
        /// `previous_hash` for independent re-verification
        parent_creation_hash: Option<BlockHash>,
        fields: Fields,
        created_at: Timestamp,
    },
    /// Partial field update
    Update {
        entity_id: EntityId,
        updated_fields: Fields,
        recorded_at: Timestamp,
    },
    /// Tombstone
    Deletion {
        entity_id: EntityId,
        recorded_at: Timestamp,
    },
    /// Student attendance mark
    Attendance {
        entity_id: EntityId,
        status: AttendanceStatus,
        date: NaiveDate,
        recorded_at: Timestamp,
    },
}

impl Transaction {
    /// The payload tag.
    pub fn kind(&self) -> TransactionKind {
        match self {
            Transaction::Creation { .. } => TransactionKind::Creation,
            Transaction::Update { .. } => TransactionKind::Update,
            Transaction::Deletion { .. } => TransactionKind::Deletion,
            Transaction::Attendance { .. } => TransactionKind::Attendance,
        }
    }

    /// Entity the transaction applies to.
    pub fn entity_id(&self) -> &EntityId {
        match self {
            Transaction::Creation { entity_id, .. }
            | Transaction::Update { entity_id, .. }
            | Transaction::Deletion { entity_id, .. }
            | Transaction::Attendance { entity_id, .. } => entity_id,
        }
    }

    /// Parent anchor recorded in a genesis payload, if any.
    pub fn parent_creation_hash(&self) -> Option<&BlockHash> {
        match self {
            Transaction::Creation {
                parent_creation_hash,
                ..
            } => parent_creation_hash.as_ref(),
            _ => None,
        }
    }

    /// Canonical serialization used for hashing.
    ///
    /// Cannot fail: every map key is a string and payload values are
    /// already `serde_json::Value`s.
    pub fn canonical_json(&self) -> String {
        let json = serde_json::to_string(self);
        debug_assert!(json.is_ok(), "transaction payload failed to serialize");
        json.unwrap_or_default()
    }
}
