//! Chain integrity validation.
//!
//! A chain is checked in two stages:
//!
//! 1. its own structure ([`verify_chain`]): genesis anchoring, then each
//!    block's hash, link and proof of work, stopping at the first failure;
//! 2. its ancestry ([`validate_with_ancestors`]): a class or student chain is
//!    only valid while every chain above it is valid too.
//!
//! Failures are values, not errors.

use crate::core::{EntityId, Tier};
use crate::ledger::chain::Chain;
use serde::{Deserialize, Serialize};

/// Resolves a parent id to its chain.
pub trait ChainLookup {
    /// Find a chain in any tier.
    fn lookup_chain(&self, id: &EntityId) -> Option<&Chain>;
}

/// What went wrong in a chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FaultKind {
    /// Department genesis does not point at the sentinel
    RootAnchor,
    /// Child genesis `previous_hash` differs from its recorded parent hash
    ParentAnchor,
    /// Recorded parent hash is not a block of the parent chain
    AnchorNotInParent,
    /// Parent chain is not registered
    MissingParent,
    /// Stored hash differs from the recomputed one
    HashMismatch { index: u64 },
    /// `previous_hash` differs from the prior block's hash
    BrokenLink { index: u64 },
    /// Hash does not meet the difficulty target
    InsufficientWork { index: u64 },
}

impl FaultKind {
    /// Index of the failing block, where one applies.
    pub fn block_index(&self) -> Option<u64> {
        match self {
            FaultKind::RootAnchor | FaultKind::ParentAnchor | FaultKind::AnchorNotInParent => Some(0),
            FaultKind::MissingParent => None,
            FaultKind::HashMismatch { index }
            | FaultKind::BrokenLink { index }
            | FaultKind::InsufficientWork { index } => Some(*index),
        }
    }
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultKind::RootAnchor => write!(f, "Genesis block prev_hash must be 0"),
            FaultKind::ParentAnchor => {
                write!(f, "Genesis block prev_hash does not match stored parent hash")
            }
            FaultKind::AnchorNotInParent => write!(f, "Genesis anchor not found in parent chain"),
            FaultKind::MissingParent => write!(f, "Parent chain not found"),
            FaultKind::HashMismatch { index } => write!(f, "Block {} hash is invalid", index),
            FaultKind::BrokenLink { index } => {
                write!(f, "Block {} prev_hash doesn't match previous block", index)
            }
            FaultKind::InsufficientWork { index } => {
                write!(f, "Block {} doesn't satisfy PoW", index)
            }
        }
    }
}

/// A fault located in a specific chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFault {
    /// Chain where the fault was found
    pub entity_id: EntityId,
    /// Tier of that chain
    pub tier: Tier,
    /// The failure
    pub kind: FaultKind,
}

/// Outcome of validating one chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainValidation {
    /// Whether the chain (and its ancestors, where checked) is intact
    pub valid: bool,
    /// Human-readable reason, `None` when valid
    pub error: Option<String>,
    /// Structured reason, `None` when valid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<ValidationFault>,
}

impl ChainValidation {
    /// A passing result.
    pub fn ok() -> Self {
        Self {
            valid: true,
            error: None,
            fault: None,
        }
    }

    /// A failing result for `subject`. Faults found in an ancestor are
    /// prefixed with the ancestor's tier and id.
    pub fn failed(subject: &EntityId, fault: ValidationFault) -> Self {
        let error = if &fault.entity_id == subject {
            fault.kind.to_string()
        } else {
            format!(
                "Parent {} {}: {}",
                fault.tier.label().to_lowercase(),
                fault.entity_id,
                fault.kind
            )
        };
        Self {
            valid: false,
            error: Some(error),
            fault: Some(fault),
        }
    }

    /// Index of the failing block, if the failure points at one.
    pub fn failed_index(&self) -> Option<u64> {
        self.fault.as_ref().and_then(|f| f.kind.block_index())
    }
}

fn first_fault(chain: &Chain) -> Option<FaultKind> {
    let blocks = chain.blocks();
    let genesis = chain.genesis_block();

    match chain.tier() {
        Tier::Department => {
            if !genesis.previous_hash.is_sentinel() {
                return Some(FaultKind::RootAnchor);
            }
        }
        Tier::Class | Tier::Student => {
            if genesis.payload.parent_creation_hash() != Some(&genesis.previous_hash) {
                return Some(FaultKind::ParentAnchor);
            }
        }
    }

    for (i, block) in blocks.iter().enumerate() {
        let index = i as u64;
        if !block.verify() {
            return Some(FaultKind::HashMismatch { index });
        }
        if i > 0 && block.previous_hash != blocks[i - 1].hash {
            return Some(FaultKind::BrokenLink { index });
        }
        if !block.satisfies_pow(chain.difficulty()) {
            return Some(FaultKind::InsufficientWork { index });
        }
    }

    None
}

/// Validate a single chain without consulting its ancestors.
pub fn verify_chain(chain: &Chain) -> ChainValidation {
    match first_fault(chain) {
        None => ChainValidation::ok(),
        Some(kind) => {
            tracing::warn!(
                tier = %chain.tier(),
                entity_id = %chain.entity_id(),
                reason = %kind,
                "chain failed validation"
            );
            ChainValidation::failed(
                chain.entity_id(),
                ValidationFault {
                    entity_id: chain.entity_id().clone(),
                    tier: chain.tier(),
                    kind,
                },
            )
        }
    }
}

/// Validate a chain and every ancestor up to its department.
///
/// Each parent is checked on its own before the child's genesis anchor is
/// looked up in it, so a corrupted parent is reported against the parent.
pub fn validate_with_ancestors<L>(lookup: &L, chain: &Chain) -> ChainValidation
where
    L: ChainLookup + ?Sized,
{
    let subject = chain.entity_id();
    let own = verify_chain(chain);
    if !own.valid {
        return own;
    }

    let mut current = chain;
    while let Some(parent_id) = current.parent_id() {
        let parent_tier = current.tier().parent().unwrap_or(Tier::Department);
        let parent = match lookup.lookup_chain(parent_id) {
            Some(parent) => parent,
            None => {
                return ChainValidation::failed(
                    subject,
                    ValidationFault {
                        entity_id: parent_id.clone(),
                        tier: parent_tier,
                        kind: FaultKind::MissingParent,
                    },
                )
            }
        };

        let parent_result = verify_chain(parent);
        if let Some(fault) = parent_result.fault {
            return ChainValidation::failed(subject, fault);
        }

        let anchored = current
            .genesis_block()
            .payload
            .parent_creation_hash()
            .is_some_and(|anchor| parent.contains_hash(anchor));
        if !anchored {
            return ChainValidation::failed(
                subject,
                ValidationFault {
                    entity_id: current.entity_id().clone(),
                    tier: current.tier(),
                    kind: FaultKind::AnchorNotInParent,
                },
            );
        }

        current = parent;
    }

    ChainValidation::ok()
}
