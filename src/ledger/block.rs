//! Ledger block structure and proof-of-work sealing.
//!
//! A block starts life as a [`BlockDraft`] and only becomes a [`Block`] once a
//! nonce satisfying the difficulty target has been found.

use crate::core::{now, BlockHash, Error, Result, Timestamp};
use crate::ledger::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// How many nonces are tried between checks of the cancel flag.
const CANCEL_CHECK_INTERVAL: u64 = 4096;

/// Hash of `timestamp ∥ payload ∥ previous_hash ∥ nonce`.
fn hash_parts(timestamp: &Timestamp, payload: &str, previous_hash: &BlockHash, nonce: u64) -> BlockHash {
    let timestamp_str = timestamp.to_rfc3339();
    let nonce_str = nonce.to_string();
    BlockHash::digest(&[
        timestamp_str.as_bytes(),
        payload.as_bytes(),
        previous_hash.as_str().as_bytes(),
        nonce_str.as_bytes(),
    ])
}

/// An unsealed block: every hashed field is fixed, the nonce is not.
#[derive(Clone, Debug)]
pub struct BlockDraft {
    index: u64,
    timestamp: Timestamp,
    payload: Transaction,
    previous_hash: BlockHash,
}

impl BlockDraft {
    /// Create a draft stamped with the current time.
    pub fn new(index: u64, payload: Transaction, previous_hash: BlockHash) -> Self {
        Self {
            index,
            timestamp: now(),
            payload,
            previous_hash,
        }
    }

    /// Search nonces from 0 upward until the hash meets `difficulty`.
    pub fn seal(self, difficulty: usize) -> Block {
        let started = Instant::now();
        let payload_json = self.payload.canonical_json();
        let mut nonce: u64 = 0;

        loop {
            let hash = hash_parts(&self.timestamp, &payload_json, &self.previous_hash, nonce);
            if hash.meets_difficulty(difficulty) {
                return self.into_block(nonce, hash, started);
            }
            nonce += 1;
        }
    }

    /// Like [`seal`](Self::seal), but gives up once `cancel` is raised.
    pub fn seal_cancellable(self, difficulty: usize, cancel: &AtomicBool) -> Result<Block> {
        let started = Instant::now();
        let payload_json = self.payload.canonical_json();
        let mut nonce: u64 = 0;

        loop {
            let hash = hash_parts(&self.timestamp, &payload_json, &self.previous_hash, nonce);
            if hash.meets_difficulty(difficulty) {
                return Ok(self.into_block(nonce, hash, started));
            }

            nonce += 1;
            if nonce % CANCEL_CHECK_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
                tracing::warn!(index = self.index, nonce, "mining cancelled");
                return Err(Error::MiningCancelled);
            }
        }
    }

    fn into_block(self, nonce: u64, hash: BlockHash, started: Instant) -> Block {
        tracing::debug!(
            index = self.index,
            nonce,
            hash = %hash,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "block sealed"
        );
        Block {
            index: self.index,
            timestamp: self.timestamp,
            payload: self.payload,
            previous_hash: self.previous_hash,
            nonce,
            hash,
        }
    }
}

/// A sealed block.
///
/// Fields are public so callers can render the full chain; changing any of
/// them without re-sealing is detected by [`Block::verify`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain, 0 = genesis
    pub index: u64,
    /// Creation instant
    pub timestamp: Timestamp,
    /// The transaction carried by this block
    pub payload: Transaction,
    /// Hash of the preceding block, or the chain's anchor for genesis
    pub previous_hash: BlockHash,
    /// Proof-of-work nonce
    pub nonce: u64,
    /// Content hash
    pub hash: BlockHash,
}

impl Block {
    /// Recompute the hash from the stored fields.
    pub fn compute_hash(&self) -> BlockHash {
        hash_parts(
            &self.timestamp,
            &self.payload.canonical_json(),
            &self.previous_hash,
            self.nonce,
        )
    }

    /// Whether the stored hash matches the content.
    pub fn verify(&self) -> bool {
        self.compute_hash() == self.hash
    }

    /// Whether the stored hash meets the difficulty target.
    pub fn satisfies_pow(&self, difficulty: usize) -> bool {
        self.hash.meets_difficulty(difficulty)
    }

    /// Check if this is the genesis block.
    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    /// Serialize block to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize block from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
