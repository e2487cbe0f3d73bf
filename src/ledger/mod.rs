//! Tiered hash-chain ledger.
//!
//! Records departments, classes and students as append-only chains:
//! - Proof-of-work sealed blocks
//! - Child chains anchored to their parent's tip
//! - Cascading integrity validation across tiers

pub mod attendance;
pub mod block;
pub mod chain;
pub mod entity;
pub mod registry;
pub mod transaction;
pub mod validator;

pub use attendance::{
    AttendanceEntry, AttendanceMark, BulkAttendance, ClassAttendance, RejectedMark,
    StudentAttendance,
};
pub use block::{Block, BlockDraft};
pub use chain::Chain;
pub use entity::{EntityInfo, EntityState, EntityStatus, Visibility};
pub use registry::{EntityRecord, EntityValidation, LedgerValidation, MutationOutcome, Registry};
pub use transaction::{AttendanceStatus, Fields, Transaction, TransactionKind};
pub use validator::{ChainLookup, ChainValidation, FaultKind, ValidationFault};
