//! Tiered registry of department, class and student chains.
//!
//! Owns every chain plus the parent -> children indices. Child chains refer
//! to their parent by id only; the registry resolves the link.

use crate::config::LedgerConfig;
use crate::core::{EntityId, Error, Result, Tier};
use crate::ledger::block::Block;
use crate::ledger::chain::Chain;
use crate::ledger::entity::{
    EntityInfo, EntityState, Visibility, FIELD_DEPARTMENT_ID, FIELD_NAME, FIELD_ROLL_NUMBER,
};
use crate::ledger::transaction::{AttendanceStatus, Fields, Transaction};
use crate::ledger::validator::{self, ChainLookup, ChainValidation};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;

/// Chains of one tier, in creation order.
#[derive(Debug, Default)]
struct TierStore {
    chains: HashMap<EntityId, Chain>,
    order: Vec<EntityId>,
}

impl TierStore {
    fn insert(&mut self, chain: Chain) {
        self.order.push(chain.entity_id().clone());
        self.chains.insert(chain.entity_id().clone(), chain);
    }

    fn get(&self, id: &EntityId) -> Option<&Chain> {
        self.chains.get(id)
    }

    fn get_mut(&mut self, id: &EntityId) -> Option<&mut Chain> {
        self.chains.get_mut(id)
    }

    fn iter(&self) -> impl Iterator<Item = &Chain> {
        self.order.iter().filter_map(|id| self.chains.get(id))
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

/// Projected state plus the full block sequence, for chain visualisation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityRecord {
    pub state: EntityState,
    pub chain: Vec<Block>,
}

/// Result of a mutation: the appended block and the state after it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MutationOutcome {
    pub block: Block,
    pub state: EntityState,
}

/// Validation result of one chain inside a ledger-wide report.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityValidation {
    pub entity_id: EntityId,
    pub tier: Tier,
    #[serde(flatten)]
    pub result: ChainValidation,
}

/// Ledger-wide validation report.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerValidation {
    /// True when every chain in every tier is valid
    pub valid: bool,
    /// One line per invalid chain
    pub errors: Vec<String>,
    pub departments: Vec<EntityValidation>,
    pub classes: Vec<EntityValidation>,
    pub students: Vec<EntityValidation>,
}

impl LedgerValidation {
    /// Per-chain results of one tier.
    pub fn tier(&self, tier: Tier) -> &[EntityValidation] {
        match tier {
            Tier::Department => &self.departments,
            Tier::Class => &self.classes,
            Tier::Student => &self.students,
        }
    }
}

/// In-memory registry of all chains.
#[derive(Debug)]
pub struct Registry {
    config: LedgerConfig,
    departments: TierStore,
    classes: TierStore,
    students: TierStore,
    /// department id -> class ids
    classes_by_department: HashMap<EntityId, Vec<EntityId>>,
    /// class id -> student ids
    students_by_class: HashMap<EntityId, Vec<EntityId>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new(config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            departments: TierStore::default(),
            classes: TierStore::default(),
            students: TierStore::default(),
            classes_by_department: HashMap::new(),
            students_by_class: HashMap::new(),
        })
    }

    /// Create a registry seeded with the configured default departments.
    pub fn with_defaults(config: LedgerConfig) -> Result<Self> {
        let mut registry = Self::new(config)?;
        let names = registry.config.default_departments.clone();
        for name in &names {
            registry.create_entity(EntityInfo::department(name))?;
        }
        tracing::info!(departments = names.len(), "registry seeded");
        Ok(registry)
    }

    /// Active configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn store(&self, tier: Tier) -> &TierStore {
        match tier {
            Tier::Department => &self.departments,
            Tier::Class => &self.classes,
            Tier::Student => &self.students,
        }
    }

    fn store_mut(&mut self, tier: Tier) -> &mut TierStore {
        match tier {
            Tier::Department => &mut self.departments,
            Tier::Class => &mut self.classes,
            Tier::Student => &mut self.students,
        }
    }

    fn child_index(&self, parent_tier: Tier) -> Option<&HashMap<EntityId, Vec<EntityId>>> {
        match parent_tier {
            Tier::Department => Some(&self.classes_by_department),
            Tier::Class => Some(&self.students_by_class),
            Tier::Student => None,
        }
    }

    /// Chain of the given tier.
    pub fn chain(&self, tier: Tier, id: &EntityId) -> Option<&Chain> {
        self.store(tier).get(id)
    }

    /// Chain of any tier.
    pub fn find_chain(&self, id: &EntityId) -> Option<&Chain> {
        Tier::ALL.iter().find_map(|tier| self.store(*tier).get(id))
    }

    fn find_chain_mut(&mut self, id: &EntityId) -> Result<&mut Chain> {
        let tier = Tier::ALL
            .into_iter()
            .find(|tier| self.store(*tier).get(id).is_some())
            .ok_or_else(|| Error::unknown_entity(id))?;
        self.store_mut(tier)
            .get_mut(id)
            .ok_or_else(|| Error::unknown_entity(id))
    }

    /// Number of chains in a tier.
    pub fn chain_count(&self, tier: Tier) -> usize {
        self.store(tier).len()
    }

    /// Ids registered under a parent, in creation order.
    pub fn children_of(&self, parent_id: &EntityId) -> &[EntityId] {
        self.find_chain(parent_id)
            .and_then(|parent| self.child_index(parent.tier()))
            .and_then(|index| index.get(parent_id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Create an entity and its chain.
    ///
    /// Class and student chains anchor to the current tip of their parent,
    /// which must exist. A deleted parent still accepts children; its tip is
    /// then the tombstone block.
    pub fn create_entity(&mut self, info: EntityInfo) -> Result<EntityRecord> {
        self.create_entity_cancellable(info, &AtomicBool::new(false))
    }

    /// Like [`create_entity`](Self::create_entity); nothing is registered if
    /// mining is cancelled.
    pub fn create_entity_cancellable(
        &mut self,
        info: EntityInfo,
        cancel: &AtomicBool,
    ) -> Result<EntityRecord> {
        let difficulty = self.config.difficulty;
        let tier = info.tier();
        let mut fields = info.fields();
        let entity_id = EntityId::generate();

        let chain = match (info.parent_id(), tier.parent()) {
            (Some(parent_id), Some(parent_tier)) => {
                let parent = self
                    .store(parent_tier)
                    .get(parent_id)
                    .ok_or_else(|| Error::not_found(parent_tier, parent_id))?;
                if let Some(department_id) = parent.parent_id() {
                    fields.insert(FIELD_DEPARTMENT_ID.into(), department_id.as_str().into());
                }
                Chain::genesis_cancellable(entity_id, tier, fields, Some(parent), difficulty, cancel)?
            }
            _ => Chain::genesis_cancellable(entity_id, tier, fields, None, difficulty, cancel)?,
        };

        let record = EntityRecord {
            state: chain.project_state(),
            chain: chain.blocks().to_vec(),
        };

        match tier {
            Tier::Department => {}
            Tier::Class => {
                if let Some(parent_id) = chain.parent_id() {
                    self.classes_by_department
                        .entry(parent_id.clone())
                        .or_default()
                        .push(chain.entity_id().clone());
                }
            }
            Tier::Student => {
                if let Some(parent_id) = chain.parent_id() {
                    self.students_by_class
                        .entry(parent_id.clone())
                        .or_default()
                        .push(chain.entity_id().clone());
                }
            }
        }
        self.store_mut(tier).insert(chain);

        Ok(record)
    }

    fn append_active(
        &mut self,
        id: &EntityId,
        transaction: Transaction,
        cancel: &AtomicBool,
    ) -> Result<MutationOutcome> {
        let chain = self.find_chain_mut(id)?;
        if chain.project_state().is_deleted() {
            return Err(Error::InvalidState(format!(
                "{} {} is deleted",
                chain.tier(),
                id
            )));
        }
        let block = chain.append_cancellable(transaction, cancel)?.clone();
        Ok(MutationOutcome {
            block,
            state: chain.project_state(),
        })
    }

    /// Append an UPDATE carrying `fields`.
    pub fn update_entity(&mut self, id: &EntityId, fields: Fields) -> Result<MutationOutcome> {
        self.update_entity_cancellable(id, fields, &AtomicBool::new(false))
    }

    /// Cancellable [`update_entity`](Self::update_entity).
    pub fn update_entity_cancellable(
        &mut self,
        id: &EntityId,
        fields: Fields,
        cancel: &AtomicBool,
    ) -> Result<MutationOutcome> {
        let transaction = Transaction::Update {
            entity_id: id.clone(),
            updated_fields: fields,
            recorded_at: crate::core::now(),
        };
        self.append_active(id, transaction, cancel)
    }

    /// Append a DELETION tombstone. Children are left untouched, and a
    /// second deletion is refused like any other mutation of a deleted entity.
    pub fn delete_entity(&mut self, id: &EntityId) -> Result<MutationOutcome> {
        self.delete_entity_cancellable(id, &AtomicBool::new(false))
    }

    /// Cancellable [`delete_entity`](Self::delete_entity).
    pub fn delete_entity_cancellable(
        &mut self,
        id: &EntityId,
        cancel: &AtomicBool,
    ) -> Result<MutationOutcome> {
        let transaction = Transaction::Deletion {
            entity_id: id.clone(),
            recorded_at: crate::core::now(),
        };
        let outcome = self.append_active(id, transaction, cancel)?;
        tracing::info!(tier = %outcome.state.tier, entity_id = %id, "entity deleted");
        Ok(outcome)
    }

    /// Append an ATTENDANCE mark to a student chain.
    pub fn record_attendance(
        &mut self,
        student_id: &EntityId,
        status: AttendanceStatus,
        date: NaiveDate,
    ) -> Result<MutationOutcome> {
        self.record_attendance_cancellable(student_id, status, date, &AtomicBool::new(false))
    }

    /// Cancellable [`record_attendance`](Self::record_attendance).
    pub fn record_attendance_cancellable(
        &mut self,
        student_id: &EntityId,
        status: AttendanceStatus,
        date: NaiveDate,
        cancel: &AtomicBool,
    ) -> Result<MutationOutcome> {
        if self.students.get(student_id).is_none() {
            return Err(Error::not_found(Tier::Student, student_id));
        }
        let transaction = Transaction::Attendance {
            entity_id: student_id.clone(),
            status,
            date,
            recorded_at: crate::core::now(),
        };
        self.append_active(student_id, transaction, cancel)
    }

    /// Projected state of any entity, deleted or not.
    pub fn query_entity(&self, id: &EntityId) -> Result<EntityState> {
        self.find_chain(id)
            .map(Chain::project_state)
            .ok_or_else(|| Error::unknown_entity(id))
    }

    /// Projected state together with the full chain.
    pub fn entity_record(&self, id: &EntityId) -> Result<EntityRecord> {
        let chain = self.find_chain(id).ok_or_else(|| Error::unknown_entity(id))?;
        Ok(EntityRecord {
            state: chain.project_state(),
            chain: chain.blocks().to_vec(),
        })
    }

    /// Children of a parent entity. Unknown parents have no children.
    pub fn query_by_parent(&self, parent_id: &EntityId, visibility: Visibility) -> Vec<EntityState> {
        self.children_of(parent_id)
            .iter()
            .filter_map(|id| self.find_chain(id))
            .map(Chain::project_state)
            .filter(|state| visibility.admits(state))
            .collect()
    }

    /// Every entity of a tier, in creation order.
    pub fn query_all(&self, tier: Tier, visibility: Visibility) -> Vec<EntityState> {
        self.store(tier)
            .iter()
            .map(Chain::project_state)
            .filter(|state| visibility.admits(state))
            .collect()
    }

    /// Active entities whose name (or, for students, roll number) contains
    /// `term`, ignoring case.
    pub fn search(&self, tier: Tier, term: &str) -> Vec<EntityState> {
        let needle = term.to_lowercase();
        let matches = |state: &EntityState, key: &str| {
            state
                .field_str(key)
                .is_some_and(|v| v.to_lowercase().contains(&needle))
        };

        self.query_all(tier, Visibility::ActiveOnly)
            .into_iter()
            .filter(|state| {
                matches(state, FIELD_NAME)
                    || (tier == Tier::Student && matches(state, FIELD_ROLL_NUMBER))
            })
            .collect()
    }

    /// Validate one chain together with its ancestors.
    pub fn validate_one(&self, id: &EntityId) -> Result<ChainValidation> {
        let chain = self.find_chain(id).ok_or_else(|| Error::unknown_entity(id))?;
        Ok(validator::validate_with_ancestors(self, chain))
    }

    /// Validate every chain in every tier.
    pub fn validate_all(&self) -> LedgerValidation {
        let mut errors = Vec::new();
        let mut per_tier = |tier: Tier| -> Vec<EntityValidation> {
            self.store(tier)
                .iter()
                .map(|chain| {
                    let result = validator::validate_with_ancestors(self, chain);
                    if let Some(error) = &result.error {
                        errors.push(format!("{} {}: {}", tier, chain.entity_id(), error));
                    }
                    EntityValidation {
                        entity_id: chain.entity_id().clone(),
                        tier,
                        result,
                    }
                })
                .collect()
        };

        let departments = per_tier(Tier::Department);
        let classes = per_tier(Tier::Class);
        let students = per_tier(Tier::Student);

        if !errors.is_empty() {
            tracing::warn!(invalid_chains = errors.len(), "ledger validation failed");
        }

        LedgerValidation {
            valid: errors.is_empty(),
            errors,
            departments,
            classes,
            students,
        }
    }

    /// Mutable chain access for tamper-injection tests.
    #[cfg(test)]
    pub(crate) fn chain_mut(&mut self, id: &EntityId) -> Option<&mut Chain> {
        self.find_chain_mut(id).ok()
    }
}

impl ChainLookup for Registry {
    fn lookup_chain(&self, id: &EntityId) -> Option<&Chain> {
        self.find_chain(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::entity::{EntityStatus, FIELD_CLASS_ID};
    use crate::ledger::transaction::TransactionKind;
    use crate::ledger::validator::FaultKind;

    fn registry() -> Registry {
        Registry::new(LedgerConfig::default().with_difficulty(2)).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn id_of(record: &EntityRecord) -> EntityId {
        record.state.entity_id.clone()
    }

    /// D1 -> C1 -> S1
    fn hierarchy(reg: &mut Registry) -> (EntityId, EntityId, EntityId) {
        let d1 = id_of(&reg.create_entity(EntityInfo::department("D1")).unwrap());
        let c1 = id_of(&reg.create_entity(EntityInfo::class("C1", &d1)).unwrap());
        let s1 = id_of(&reg.create_entity(EntityInfo::student("S1", "R-001", &c1)).unwrap());
        (d1, c1, s1)
    }

    #[test]
    fn test_scenario_a_single_department_valid() {
        let mut reg = registry();
        reg.create_entity(EntityInfo::department("D1")).unwrap();

        let report = reg.validate_all();
        assert!(report.valid);
        assert!(report.errors.is_empty());
        assert_eq!(report.departments.len(), 1);
        assert_eq!(report.classes.len(), 0);
        assert_eq!(report.students.len(), 0);
    }

    #[test]
    fn test_scenario_b_class_anchors_to_department_tip() {
        let mut reg = registry();
        let d1 = id_of(&reg.create_entity(EntityInfo::department("D1")).unwrap());
        let mut renamed = Fields::new();
        renamed.insert(FIELD_NAME.into(), "D1 renamed".into());
        reg.update_entity(&d1, renamed).unwrap();
        let tip = reg.chain(Tier::Department, &d1).unwrap().tip().hash.clone();

        let c1 = reg.create_entity(EntityInfo::class("C1", &d1)).unwrap();

        assert_eq!(c1.chain[0].previous_hash, tip);
        assert_eq!(c1.chain[0].payload.parent_creation_hash(), Some(&tip));
        assert_eq!(c1.state.parent_id.as_ref(), Some(&d1));
    }

    #[test]
    fn test_scenario_c_attendance_history() {
        let mut reg = registry();
        let (_, _, s1) = hierarchy(&mut reg);

        reg.record_attendance(&s1, AttendanceStatus::Present, date("2024-01-10"))
            .unwrap();

        let chain = reg.chain(Tier::Student, &s1).unwrap();
        let marks = chain.history_of(TransactionKind::Attendance);
        assert_eq!(marks.len(), 1);
        match &marks[0].payload {
            Transaction::Attendance { status, date: d, .. } => {
                assert_eq!(*status, AttendanceStatus::Present);
                assert_eq!(*d, date("2024-01-10"));
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_scenario_d_delete_does_not_cascade_into_index() {
        let mut reg = registry();
        let (d1, c1, s1) = hierarchy(&mut reg);

        reg.delete_entity(&d1).unwrap();

        assert_eq!(reg.query_entity(&d1).unwrap().status, EntityStatus::Deleted);
        let classes = reg.query_by_parent(&d1, Visibility::ActiveOnly);
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].entity_id, c1);

        reg.delete_entity(&s1).unwrap();
        let result = reg.record_attendance(&s1, AttendanceStatus::Absent, date("2024-01-11"));
        assert!(matches!(result, Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_scenario_e_tampered_class_genesis_cascades() {
        let mut reg = registry();
        let (d1, c1, s1) = hierarchy(&mut reg);

        let chain = reg.chain_mut(&c1).unwrap();
        if let Transaction::Creation { fields, .. } = &mut chain.blocks_mut()[0].payload {
            fields.insert(FIELD_NAME.into(), "C1 forged".into());
        }

        let class_result = reg.validate_one(&c1).unwrap();
        assert!(!class_result.valid);
        assert_eq!(class_result.failed_index(), Some(0));

        let student_result = reg.validate_one(&s1).unwrap();
        assert!(!student_result.valid);
        assert_eq!(student_result.fault.as_ref().unwrap().entity_id, c1);
        assert_eq!(
            student_result.fault.unwrap().kind,
            FaultKind::HashMismatch { index: 0 }
        );

        assert!(reg.validate_one(&d1).unwrap().valid);
        let report = reg.validate_all();
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 2);
    }

    #[test]
    fn test_root_tamper_invalidates_all_descendants() {
        let mut reg = registry();
        let (d1, c1, s1) = hierarchy(&mut reg);
        let c2 = id_of(&reg.create_entity(EntityInfo::class("C2", &d1)).unwrap());

        reg.chain_mut(&d1).unwrap().blocks_mut()[0].nonce += 1;

        for id in [&d1, &c1, &c2, &s1] {
            assert!(!reg.validate_one(id).unwrap().valid);
        }
        assert_eq!(reg.validate_all().errors.len(), 4);
    }

    #[test]
    fn test_leaf_tamper_is_isolated() {
        let mut reg = registry();
        let (d1, c1, s1) = hierarchy(&mut reg);
        let s2 = id_of(&reg.create_entity(EntityInfo::student("S2", "R-002", &c1)).unwrap());
        reg.record_attendance(&s1, AttendanceStatus::Leave, date("2024-02-01"))
            .unwrap();

        let chain = reg.chain_mut(&s1).unwrap();
        chain.blocks_mut()[1].previous_hash = crate::core::BlockHash::new("00");

        assert!(!reg.validate_one(&s1).unwrap().valid);
        assert!(reg.validate_one(&s2).unwrap().valid);
        assert!(reg.validate_one(&c1).unwrap().valid);
        assert!(reg.validate_one(&d1).unwrap().valid);
    }

    #[test]
    fn test_create_under_missing_parent() {
        let mut reg = registry();
        let missing = EntityId::new("nope");

        let err = reg.create_entity(EntityInfo::class("C", &missing)).unwrap_err();
        assert_eq!(err.to_string(), "Department not found: nope");

        let err = reg
            .create_entity(EntityInfo::student("S", "R", &missing))
            .unwrap_err();
        assert_eq!(err.to_string(), "Class not found: nope");
    }

    #[test]
    fn test_create_under_deleted_parent_anchors_to_tombstone() {
        let mut reg = registry();
        let d1 = id_of(&reg.create_entity(EntityInfo::department("D1")).unwrap());
        let tombstone = reg.delete_entity(&d1).unwrap().block.hash;

        let c1 = reg.create_entity(EntityInfo::class("C1", &d1)).unwrap();

        assert_eq!(c1.chain[0].previous_hash, tombstone);
        assert_eq!(c1.chain[0].payload.parent_creation_hash(), Some(&tombstone));
        let listed = reg.query_by_parent(&d1, Visibility::ActiveOnly);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].entity_id, c1.state.entity_id);
        assert!(reg.validate_one(&c1.state.entity_id).unwrap().valid);
    }

    #[test]
    fn test_cancelled_create_registers_nothing() {
        let mut reg = Registry::new(LedgerConfig::default().with_difficulty(64)).unwrap();
        let cancel = AtomicBool::new(true);

        let result = reg.create_entity_cancellable(EntityInfo::department("D1"), &cancel);

        assert!(matches!(result, Err(Error::MiningCancelled)));
        assert_eq!(reg.chain_count(Tier::Department), 0);
    }

    #[test]
    fn test_student_records_department() {
        let mut reg = registry();
        let (d1, c1, s1) = hierarchy(&mut reg);

        let state = reg.query_entity(&s1).unwrap();
        assert_eq!(state.field_str(FIELD_DEPARTMENT_ID), Some(d1.as_str()));
        assert_eq!(state.field_str(FIELD_CLASS_ID), Some(c1.as_str()));
        assert_eq!(state.parent_id, Some(c1));
    }

    #[test]
    fn test_update_and_delete_unknown() {
        let mut reg = registry();
        let ghost = EntityId::new("ghost");

        assert!(reg.update_entity(&ghost, Fields::new()).unwrap_err().is_not_found());
        assert!(reg.delete_entity(&ghost).unwrap_err().is_not_found());
        assert!(reg.query_entity(&ghost).unwrap_err().is_not_found());
        assert!(reg.validate_one(&ghost).unwrap_err().is_not_found());
    }

    #[test]
    fn test_attendance_requires_student() {
        let mut reg = registry();
        let (_, c1, _) = hierarchy(&mut reg);

        let err = reg
            .record_attendance(&c1, AttendanceStatus::Present, date("2024-01-10"))
            .unwrap_err();
        assert_eq!(err.to_string(), format!("Student not found: {}", c1));
    }

    #[test]
    fn test_deleted_is_terminal() {
        let mut reg = registry();
        let d1 = id_of(&reg.create_entity(EntityInfo::department("D1")).unwrap());
        reg.delete_entity(&d1).unwrap();

        assert!(matches!(
            reg.update_entity(&d1, Fields::new()),
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(reg.delete_entity(&d1), Err(Error::InvalidState(_))));
        assert_eq!(reg.chain(Tier::Department, &d1).unwrap().len(), 2);
    }

    #[test]
    fn test_update_outcome() {
        let mut reg = registry();
        let d1 = id_of(&reg.create_entity(EntityInfo::department("D1")).unwrap());
        let mut fields = Fields::new();
        fields.insert(FIELD_NAME.into(), "Renamed".into());

        let outcome = reg.update_entity(&d1, fields).unwrap();
        assert_eq!(outcome.block.index, 1);
        assert_eq!(outcome.state.name(), Some("Renamed"));
        assert_eq!(outcome.state.block_count, 2);
    }

    #[test]
    fn test_query_all_visibility_and_order() {
        let mut reg = registry();
        let a = id_of(&reg.create_entity(EntityInfo::department("A")).unwrap());
        let b = id_of(&reg.create_entity(EntityInfo::department("B")).unwrap());
        let c = id_of(&reg.create_entity(EntityInfo::department("C")).unwrap());
        reg.delete_entity(&b).unwrap();

        let active: Vec<_> = reg
            .query_all(Tier::Department, Visibility::ActiveOnly)
            .into_iter()
            .map(|s| s.entity_id)
            .collect();
        assert_eq!(active, vec![a.clone(), c.clone()]);

        let all: Vec<_> = reg
            .query_all(Tier::Department, Visibility::IncludeDeleted)
            .into_iter()
            .map(|s| s.entity_id)
            .collect();
        assert_eq!(all, vec![a, b, c]);
    }

    #[test]
    fn test_query_by_parent_filters_deleted_children() {
        let mut reg = registry();
        let (_, c1, s1) = hierarchy(&mut reg);
        reg.delete_entity(&s1).unwrap();

        assert!(reg.query_by_parent(&c1, Visibility::ActiveOnly).is_empty());
        assert_eq!(reg.query_by_parent(&c1, Visibility::IncludeDeleted).len(), 1);
        assert!(reg
            .query_by_parent(&EntityId::new("unknown"), Visibility::IncludeDeleted)
            .is_empty());
    }

    #[test]
    fn test_search() {
        let mut reg = registry();
        let d1 = id_of(&reg.create_entity(EntityInfo::department("School of Computing")).unwrap());
        reg.create_entity(EntityInfo::department("Arts")).unwrap();
        let c1 = id_of(&reg.create_entity(EntityInfo::class("Compilers", &d1)).unwrap());
        reg.create_entity(EntityInfo::student("Ada", "CS-042", &c1)).unwrap();

        assert_eq!(reg.search(Tier::Department, "computing").len(), 1);
        assert_eq!(reg.search(Tier::Class, "COMP").len(), 1);
        assert_eq!(reg.search(Tier::Student, "cs-04").len(), 1);
        assert_eq!(reg.search(Tier::Student, "ada").len(), 1);
        assert!(reg.search(Tier::Department, "physics").is_empty());
    }

    #[test]
    fn test_entity_record_exposes_chain() {
        let mut reg = registry();
        let (d1, _, _) = hierarchy(&mut reg);
        reg.update_entity(&d1, Fields::new()).unwrap();

        let record = reg.entity_record(&d1).unwrap();
        assert_eq!(record.chain.len(), 2);
        assert_eq!(record.chain[1].previous_hash, record.chain[0].hash);
        assert_eq!(record.state.block_count, 2);
    }

    #[test]
    fn test_with_defaults_seeds_departments() {
        let config = LedgerConfig::default().with_difficulty(1);
        let reg = Registry::with_defaults(config).unwrap();

        let names: Vec<_> = reg
            .query_all(Tier::Department, Visibility::ActiveOnly)
            .iter()
            .filter_map(|s| s.name().map(str::to_string))
            .collect();
        assert_eq!(names, vec!["School of Computing", "School of Software Engineering"]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = LedgerConfig::default().with_difficulty(0);
        assert!(matches!(Registry::new(config), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_validation_report_serializes_flat() {
        let mut reg = registry();
        reg.create_entity(EntityInfo::department("D1")).unwrap();

        let value = serde_json::to_value(reg.validate_all()).unwrap();
        assert_eq!(value["valid"], true);
        assert_eq!(value["errors"], serde_json::json!([]));
        assert_eq!(value["departments"][0]["valid"], true);
        assert!(value["departments"][0]["error"].is_null());
    }
}
