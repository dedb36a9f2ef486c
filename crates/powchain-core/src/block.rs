use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::LedgerError;

/// SHA-256 over `index ‖ previous_hash ‖ timestamp ‖ payload ‖ nonce`, hex encoded.
///
/// Integers are rendered as decimal text and the payload as compact JSON with
/// object keys in insertion order. No separators are inserted.
pub fn calculate_hash(
    index: u64,
    previous_hash: &str,
    timestamp: &str,
    payload: &Value,
    nonce: u64,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(index.to_string());
    hasher.update(previous_hash);
    hasher.update(timestamp);
    hasher.update(payload.to_string());
    hasher.update(nonce.to_string());
    hex::encode(hasher.finalize())
}

/// A block that has not been mined yet.
///
/// Only mining turns a candidate into a [`Block`]; the nonce and hash move
/// only inside that search.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockCandidate {
    pub index: u64,
    pub timestamp: String,
    pub payload: Value,
    pub previous_hash: String,
    pub nonce: u64,
}

impl BlockCandidate {
    /// Builds a candidate from any serializable payload.
    pub fn new<P: Serialize + ?Sized>(
        index: u64,
        timestamp: impl Into<String>,
        payload: &P,
    ) -> Result<Self, LedgerError> {
        Ok(Self::from_value(index, timestamp, serde_json::to_value(payload)?))
    }

    pub fn from_value(index: u64, timestamp: impl Into<String>, payload: Value) -> Self {
        Self {
            index,
            timestamp: timestamp.into(),
            payload,
            previous_hash: String::new(),
            nonce: 0,
        }
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn calculate_hash(&self) -> String {
        calculate_hash(
            self.index,
            &self.previous_hash,
            &self.timestamp,
            &self.payload,
            self.nonce,
        )
    }

    /// Freezes the candidate with the given hash. Callers must pass the hash
    /// of the candidate's current fields.
    pub(crate) fn seal(self, hash: String) -> Block {
        Block {
            index: self.index,
            timestamp: self.timestamp,
            payload: self.payload,
            previous_hash: self.previous_hash,
            nonce: self.nonce,
            hash,
        }
    }
}

/// An immutable, mined ledger entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Block {
    index: u64,
    timestamp: String,
    payload: Value,
    previous_hash: String,
    nonce: u64,
    hash: String,
}

impl Block {
    /// Genesis-style construction: hash computed once, no proof-of-work.
    pub(crate) fn unmined(candidate: BlockCandidate) -> Self {
        let hash = candidate.calculate_hash();
        candidate.seal(hash)
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn calculate_hash(&self) -> String {
        calculate_hash(
            self.index,
            &self.previous_hash,
            &self.timestamp,
            &self.payload,
            self.nonce,
        )
    }

    /// Stored hash equals the hash recomputed from the block's own fields.
    pub fn is_self_consistent(&self) -> bool {
        self.hash == self.calculate_hash()
    }
}

/// Unchecked write access to a stored block.
///
/// Nothing here recomputes the hash or re-links neighbours. It exists to stage
/// corruption for tamper-detection tests and tooling; obtain one through
/// [`crate::chain::Chain::block_mut_unchecked`].
#[derive(Debug)]
pub struct BlockMut<'a> {
    block: &'a mut Block,
}

impl<'a> BlockMut<'a> {
    pub(crate) fn new(block: &'a mut Block) -> Self {
        Self { block }
    }

    pub fn set_index(&mut self, index: u64) -> &mut Self {
        self.block.index = index;
        self
    }

    pub fn set_timestamp(&mut self, timestamp: impl Into<String>) -> &mut Self {
        self.block.timestamp = timestamp.into();
        self
    }

    pub fn set_payload(&mut self, payload: Value) -> &mut Self {
        self.block.payload = payload;
        self
    }

    pub fn set_previous_hash(&mut self, previous_hash: impl Into<String>) -> &mut Self {
        self.block.previous_hash = previous_hash.into();
        self
    }

    pub fn set_nonce(&mut self, nonce: u64) -> &mut Self {
        self.block.nonce = nonce;
        self
    }

    pub fn set_hash(&mut self, hash: impl Into<String>) -> &mut Self {
        self.block.hash = hash.into();
        self
    }
}
