use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use log::{info, warn};

use super::block::{digest, Block};
use super::transaction::Transaction;

/// Errors that can occur during ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Chain tip moved while mining: expected previous hash {expected}, found {found}")]
    StaleTip { expected: String, found: String },
}

/// Chain and pending pool, always mutated together
#[derive(Debug)]
struct LedgerState {
    chain: Vec<Block>,
    pending: Vec<Transaction>,
}

impl LedgerState {
    fn last_block(&self) -> &Block {
        // Seeded with genesis at construction and never emptied
        self.chain.last().expect("ledger always holds a genesis block")
    }

    fn seal(&mut self, proof: u64, previous_hash: Option<String>) -> Block {
        let previous_hash = previous_hash.unwrap_or_else(|| digest(self.last_block()));
        let transactions = std::mem::take(&mut self.pending);

        let block = Block::new(self.chain.len() as u64 + 1, transactions, proof, previous_hash);
        self.chain.push(block.clone());

        block
    }
}

/// The chain of blocks plus the transactions waiting for the next block
///
/// A single lock guards both so that a transaction submitted while a block is
/// being sealed lands either in that block or in the next pending batch.
#[derive(Debug)]
pub struct Ledger {
    state: Mutex<LedgerState>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Creates a new ledger holding only a freshly stamped genesis block
    pub fn new() -> Self {
        Self::with_genesis(Block::genesis())
    }

    /// Creates a new ledger seeded with the given genesis block
    pub fn with_genesis(genesis: Block) -> Self {
        Ledger {
            state: Mutex::new(LedgerState {
                chain: vec![genesis],
                pending: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        // Every mutation completes before the guard drops, so a poisoned
        // state is still consistent
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a new transaction to the pending pool
    ///
    /// # Returns
    ///
    /// The index of the block that will include this transaction
    pub fn new_transaction(&self, sender: impl Into<String>, recipient: impl Into<String>, amount: f64) -> u64 {
        let mut state = self.lock();
        state.pending.push(Transaction::new(sender, recipient, amount));

        state.last_block().index + 1
    }

    /// Seals the pending transactions into a new block and appends it
    ///
    /// # Arguments
    ///
    /// * `proof` - The solved proof of work
    /// * `previous_hash` - Digest of the previous block; computed from the
    ///   current last block when `None`
    pub fn seal_block(&self, proof: u64, previous_hash: Option<String>) -> Block {
        self.lock().seal(proof, previous_hash)
    }

    /// Appends a reward transaction and seals a block, provided the chain tip
    /// still hashes to `expected_previous_hash`
    ///
    /// The tip check, reward and seal happen under one lock, so a chain
    /// replaced or extended during the proof-of-work search is detected
    /// instead of producing an unlinked block.
    pub fn seal_mined_block(
        &self,
        expected_previous_hash: &str,
        proof: u64,
        reward: Transaction,
    ) -> Result<Block, LedgerError> {
        let mut state = self.lock();

        let found = digest(state.last_block());
        if found != expected_previous_hash {
            warn!("Discarding mined proof {}: chain tip changed during search", proof);
            return Err(LedgerError::StaleTip {
                expected: expected_previous_hash.to_string(),
                found,
            });
        }

        state.pending.push(reward);
        Ok(state.seal(proof, Some(found)))
    }

    /// Gets the last block in the chain
    pub fn last_block(&self) -> Block {
        self.lock().last_block().clone()
    }

    /// Gets a copy of the entire chain
    pub fn chain(&self) -> Vec<Block> {
        self.lock().chain.clone()
    }

    /// Number of blocks in the chain
    pub fn len(&self) -> usize {
        self.lock().chain.len()
    }

    /// Always false: the genesis block is never removed
    pub fn is_empty(&self) -> bool {
        self.lock().chain.is_empty()
    }

    /// Gets all pending transactions
    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.lock().pending.clone()
    }

    /// Replaces the chain wholesale if `candidate` is strictly longer
    ///
    /// Callers validate the candidate beforehand; the length is re-checked
    /// here because the chain may have grown since the candidate was chosen.
    /// Pending transactions are kept.
    pub fn replace_if_longer(&self, candidate: Vec<Block>) -> bool {
        let mut state = self.lock();

        if candidate.len() <= state.chain.len() {
            return false;
        }

        info!(
            "Replacing local chain of {} blocks with chain of {} blocks",
            state.chain.len(),
            candidate.len()
        );
        state.chain = candidate;

        true
    }
}
