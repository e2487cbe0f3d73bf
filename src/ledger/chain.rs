//! Per-entity hash chain.
//!
//! One chain exists per department, class and student. A chain only ever
//! grows: updates, deletions and attendance marks are appended as new blocks.

use crate::core::{BlockHash, EntityId, Error, Result, Tier};
use crate::ledger::block::{Block, BlockDraft};
use crate::ledger::entity::{EntityState, EntityStatus};
use crate::ledger::transaction::{Fields, Transaction, TransactionKind};
use crate::ledger::validator::{self, ChainValidation};
use std::sync::atomic::AtomicBool;

/// Append-only chain of sealed blocks for a single entity.
#[derive(Clone, Debug)]
pub struct Chain {
    entity_id: EntityId,
    tier: Tier,
    /// Resolved through the registry, never owned
    parent_id: Option<EntityId>,
    difficulty: usize,
    /// Never empty
    blocks: Vec<Block>,
}

impl Chain {
    /// Create a chain with a mined CREATION genesis block.
    ///
    /// Department chains anchor to the sentinel. Class and student chains
    /// must be given their parent chain and anchor to its current tip, which
    /// is also recorded in the payload as `parent_creation_hash`.
    pub fn genesis(
        entity_id: EntityId,
        tier: Tier,
        fields: Fields,
        parent: Option<&Chain>,
        difficulty: usize,
    ) -> Result<Self> {
        Self::genesis_with(entity_id, tier, fields, parent, difficulty, |draft| {
            Ok(draft.seal(difficulty))
        })
    }

    /// Like [`genesis`](Self::genesis), but gives up with
    /// [`Error::MiningCancelled`] once `cancel` is raised.
    pub fn genesis_cancellable(
        entity_id: EntityId,
        tier: Tier,
        fields: Fields,
        parent: Option<&Chain>,
        difficulty: usize,
        cancel: &AtomicBool,
    ) -> Result<Self> {
        Self::genesis_with(entity_id, tier, fields, parent, difficulty, |draft| {
            draft.seal_cancellable(difficulty, cancel)
        })
    }

    fn genesis_with<S>(
        entity_id: EntityId,
        tier: Tier,
        fields: Fields,
        parent: Option<&Chain>,
        difficulty: usize,
        seal: S,
    ) -> Result<Self>
    where
        S: FnOnce(BlockDraft) -> Result<Block>,
    {
        let parent_tier = parent.map(|p| p.tier());
        if parent_tier != tier.parent() {
            return Err(Error::InvalidState(format!(
                "{} chain cannot anchor to {}",
                tier,
                parent_tier.map_or("the sentinel", |t| t.label())
            )));
        }

        let anchor = match parent {
            Some(p) => p.tip().hash.clone(),
            None => BlockHash::sentinel(),
        };
        let parent_id = parent.map(|p| p.entity_id().clone());

        let payload = Transaction::Creation {
            entity_id: entity_id.clone(),
            tier,
            parent_id: parent_id.clone(),
            parent_creation_hash: parent.map(|_| anchor.clone()),
            fields,
            created_at: crate::core::now(),
        };
        let genesis = seal(BlockDraft::new(0, payload, anchor))?;

        tracing::info!(
            tier = %tier,
            entity_id = %entity_id,
            hash = %genesis.hash,
            "chain created"
        );

        Ok(Self {
            entity_id,
            tier,
            parent_id,
            difficulty,
            blocks: vec![genesis],
        })
    }

    /// Entity this chain belongs to.
    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    /// Tier of this chain.
    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Parent entity, for class and student chains.
    pub fn parent_id(&self) -> Option<&EntityId> {
        self.parent_id.as_ref()
    }

    /// Required leading zero hex digits.
    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    /// All blocks, genesis first.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false: a chain holds at least its genesis block.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The genesis block.
    pub fn genesis_block(&self) -> &Block {
        &self.blocks[0]
    }

    /// The latest block.
    pub fn tip(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    /// Get block by index.
    pub fn get_block(&self, index: u64) -> Option<&Block> {
        self.blocks.get(index as usize)
    }

    /// Whether any block in this chain has the given hash.
    pub fn contains_hash(&self, hash: &BlockHash) -> bool {
        self.blocks.iter().any(|b| &b.hash == hash)
    }

    fn next_draft(&self, transaction: Transaction) -> BlockDraft {
        BlockDraft::new(self.blocks.len() as u64, transaction, self.tip().hash.clone())
    }

    /// Seal a transaction onto the tip and return the new block.
    ///
    /// The same contract applies to every transaction kind; lifecycle rules
    /// (no updates after deletion) are the registry's concern.
    pub fn append(&mut self, transaction: Transaction) -> &Block {
        let block = self.next_draft(transaction).seal(self.difficulty);
        self.push(block)
    }

    /// Like [`append`](Self::append), but the chain is left untouched if
    /// mining is cancelled.
    pub fn append_cancellable(
        &mut self,
        transaction: Transaction,
        cancel: &AtomicBool,
    ) -> Result<&Block> {
        let block = self
            .next_draft(transaction)
            .seal_cancellable(self.difficulty, cancel)?;
        Ok(self.push(block))
    }

    fn push(&mut self, block: Block) -> &Block {
        tracing::debug!(
            entity_id = %self.entity_id,
            index = block.index,
            kind = ?block.payload.kind(),
            "block appended"
        );
        self.blocks.push(block);
        self.tip()
    }

    /// Fold the chain into the entity's current state.
    ///
    /// Scans newest to oldest and stops at the first DELETION, UPDATE or
    /// CREATION. A deletion yields `Deleted`; otherwise the creation fields
    /// are overlaid with the most recent update's fields only.
    pub fn project_state(&self) -> EntityState {
        let mut latest_update: Option<&Fields> = None;

        for block in self.blocks.iter().rev() {
            match &block.payload {
                Transaction::Deletion { .. } => {
                    return EntityState {
                        entity_id: self.entity_id.clone(),
                        tier: self.tier,
                        parent_id: self.parent_id.clone(),
                        status: EntityStatus::Deleted,
                        fields: Fields::new(),
                        block_count: self.blocks.len(),
                    };
                }
                Transaction::Update { updated_fields, .. } => {
                    latest_update = Some(updated_fields);
                    break;
                }
                Transaction::Creation { .. } => break,
                Transaction::Attendance { .. } => continue,
            }
        }

        let mut fields = match &self.genesis_block().payload {
            Transaction::Creation { fields, .. } => fields.clone(),
            _ => Fields::new(),
        };
        if let Some(update) = latest_update {
            fields.extend(update.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        EntityState {
            entity_id: self.entity_id.clone(),
            tier: self.tier,
            parent_id: self.parent_id.clone(),
            status: EntityStatus::Active,
            fields,
            block_count: self.blocks.len(),
        }
    }

    /// Blocks matching `predicate`, in chain order.
    pub fn history<P>(&self, predicate: P) -> Vec<&Block>
    where
        P: Fn(&Block) -> bool,
    {
        self.blocks.iter().filter(|b| predicate(b)).collect()
    }

    /// Blocks carrying the given transaction kind, in chain order.
    pub fn history_of(&self, kind: TransactionKind) -> Vec<&Block> {
        self.history(|b| b.payload.kind() == kind)
    }

    /// Check this chain on its own: genesis anchoring, hashes, links and PoW.
    pub fn verify_integrity(&self) -> ChainValidation {
        validator::verify_chain(self)
    }

    /// Export the blocks to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.blocks)?)
    }

    /// Direct block access for tamper-injection tests.
    #[cfg(test)]
    pub(crate) fn blocks_mut(&mut self) -> &mut Vec<Block> {
        &mut self.blocks
    }

    /// Raise the target for cancellation tests.
    #[cfg(test)]
    pub(crate) fn set_difficulty(&mut self, difficulty: usize) {
        self.difficulty = difficulty;
    }
}
