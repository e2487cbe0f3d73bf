//! Entity descriptions and projected state.

use crate::core::{EntityId, Tier};
use crate::ledger::transaction::Fields;
use serde::{Deserialize, Serialize};

/// Field holding an entity's display name.
pub const FIELD_NAME: &str = "name";
/// Field holding a student's roll number.
pub const FIELD_ROLL_NUMBER: &str = "rollNumber";
/// Field holding the owning department of a class or student.
pub const FIELD_DEPARTMENT_ID: &str = "departmentId";
/// Field holding the owning class of a student.
pub const FIELD_CLASS_ID: &str = "classId";

/// What is needed to create an entity; the variant selects the tier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tier", rename_all = "lowercase")]
pub enum EntityInfo {
    Department {
        name: String,
    },
    Class {
        name: String,
        department_id: EntityId,
    },
    Student {
        name: String,
        roll_number: String,
        class_id: EntityId,
    },
}

impl EntityInfo {
    /// Create department info.
    pub fn department(name: &str) -> Self {
        EntityInfo::Department {
            name: name.to_string(),
        }
    }

    /// Create class info.
    pub fn class(name: &str, department_id: &EntityId) -> Self {
        EntityInfo::Class {
            name: name.to_string(),
            department_id: department_id.clone(),
        }
    }

    /// Create student info.
    pub fn student(name: &str, roll_number: &str, class_id: &EntityId) -> Self {
        EntityInfo::Student {
            name: name.to_string(),
            roll_number: roll_number.to_string(),
            class_id: class_id.clone(),
        }
    }

    /// Tier of the chain this info creates.
    pub fn tier(&self) -> Tier {
        match self {
            EntityInfo::Department { .. } => Tier::Department,
            EntityInfo::Class { .. } => Tier::Class,
            EntityInfo::Student { .. } => Tier::Student,
        }
    }

    /// The parent entity the new chain anchors to.
    pub fn parent_id(&self) -> Option<&EntityId> {
        match self {
            EntityInfo::Department { .. } => None,
            EntityInfo::Class { department_id, .. } => Some(department_id),
            EntityInfo::Student { class_id, .. } => Some(class_id),
        }
    }

    /// Identifying fields recorded in the genesis payload.
    pub fn fields(&self) -> Fields {
        let mut fields = Fields::new();
        match self {
            EntityInfo::Department { name } => {
                fields.insert(FIELD_NAME.into(), name.as_str().into());
            }
            EntityInfo::Class {
                name,
                department_id,
            } => {
                fields.insert(FIELD_NAME.into(), name.as_str().into());
                fields.insert(FIELD_DEPARTMENT_ID.into(), department_id.as_str().into());
            }
            EntityInfo::Student {
                name,
                roll_number,
                class_id,
            } => {
                fields.insert(FIELD_NAME.into(), name.as_str().into());
                fields.insert(FIELD_ROLL_NUMBER.into(), roll_number.as_str().into());
                fields.insert(FIELD_CLASS_ID.into(), class_id.as_str().into());
            }
        }
        fields
    }
}

/// Lifecycle status derived from a chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    Active,
    Deleted,
}

/// Current view of an entity, folded from its chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub entity_id: EntityId,
    pub tier: Tier,
    pub parent_id: Option<EntityId>,
    pub status: EntityStatus,
    /// Empty once deleted
    pub fields: Fields,
    pub block_count: usize,
}

impl EntityState {
    /// Whether the entity has been tombstoned.
    pub fn is_deleted(&self) -> bool {
        self.status == EntityStatus::Deleted
    }

    /// String value of a field, if present.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_str())
    }

    /// Display name.
    pub fn name(&self) -> Option<&str> {
        self.field_str(FIELD_NAME)
    }
}

/// Whether list queries include tombstoned entities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Visibility {
    #[default]
    ActiveOnly,
    IncludeDeleted,
}

impl Visibility {
    /// Whether a state passes this filter.
    pub fn admits(self, state: &EntityState) -> bool {
        self == Visibility::IncludeDeleted || !state.is_deleted()
    }
}
