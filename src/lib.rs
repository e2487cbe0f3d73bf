//! # Tierchain - Hierarchical Proof-of-Work Ledger
//!
//! A three-tier record keeper where every entity owns its own chain:
//! - **Departments**: root chains anchored to the `"0"` sentinel
//! - **Classes**: chains anchored to their department's tip at creation
//! - **Students**: chains anchored to their class, carrying attendance
//!
//! Entities are never mutated in place. Updates, deletions and attendance
//! marks are appended as mined blocks and the current state is projected
//! from the chain.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tierchain::config::LedgerConfig;
//! use tierchain::ledger::{EntityInfo, Registry};
//! use tierchain::service::{LedgerService, SharedLedger};
//!
//! #[tokio::main]
//! async fn main() {
//!     let ledger = SharedLedger::new(Registry::new(LedgerConfig::default()).unwrap());
//!     let dept = ledger
//!         .create_entity(EntityInfo::department("School of Computing"))
//!         .await
//!         .unwrap();
//!
//!     let report = ledger.validate_one(&dept.state.entity_id).await.unwrap();
//!     println!("valid: {}", report.valid);
//! }
//! ```

pub mod config;
pub mod core;
pub mod ledger;
pub mod service;
pub mod telemetry;

pub use crate::config::LedgerConfig;
pub use crate::core::error::{Error, Result};
pub use crate::core::{BlockHash, EntityId, Tier};
pub use crate::ledger::{Block, Chain, EntityInfo, EntityState, Registry, Visibility};
pub use crate::service::{LedgerService, SharedLedger};
