use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use super::transaction::Transaction;

/// `previous_hash` carried by the genesis block in place of a real digest
pub const GENESIS_PREVIOUS_HASH: &str = "1";

/// Proof value of the genesis block
pub const GENESIS_PROOF: u64 = 100;

/// Represents a block in the blockchain
///
/// Fields are declared in canonical hashing order. `serde_json` serializes
/// struct fields in declaration order, so producers and verifiers always agree
/// on the byte layout fed into [`digest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Block {
    /// Index of the block in the chain (genesis is 1)
    pub index: u64,

    /// Digest of the previous block
    pub previous_hash: String,

    /// Proof of work solved against the previous block's proof
    pub proof: u64,

    /// Seconds since the Unix epoch when the block was sealed
    pub timestamp: f64,

    /// Transactions sealed into this block
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Creates a new block stamped with the current time
    ///
    /// # Arguments
    ///
    /// * `index` - The index of the block in the chain
    /// * `transactions` - The list of transactions to include in the block
    /// * `proof` - The proof of work
    /// * `previous_hash` - The digest of the previous block
    pub fn new(index: u64, transactions: Vec<Transaction>, proof: u64, previous_hash: String) -> Self {
        Block {
            index,
            previous_hash,
            proof,
            timestamp: now_seconds(),
            transactions,
        }
    }

    /// Creates the genesis block
    pub fn genesis() -> Self {
        Block::new(1, Vec::new(), GENESIS_PROOF, GENESIS_PREVIOUS_HASH.to_string())
    }

    /// Calculates the digest of this block
    pub fn calculate_hash(&self) -> String {
        digest(self)
    }
}

/// Hashes a block
///
/// # Returns
///
/// The SHA-256 hash of the block's canonical JSON form as a lowercase
/// hexadecimal string
pub fn digest(block: &Block) -> String {
    // Plain structs with string keys never fail to serialize
    let block_string = serde_json::to_vec(block).expect("block serialization is infallible");

    let mut hasher = Sha256::new();
    hasher.update(&block_string);

    hex::encode(hasher.finalize())
}

/// Current wall-clock time as fractional seconds since the epoch
fn now_seconds() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
