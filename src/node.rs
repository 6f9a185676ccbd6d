use std::sync::Arc;

use dashmap::DashMap;
use log::{info, warn};
use thiserror::Error;
use uuid::Uuid;

use crate::blockchain::{
    digest, proof, validation, Block, CancelToken, ChainSource, ConsensusResolver, Ledger,
    LedgerError, NodeRegistry, RegistryError, Transaction,
};

/// Amount paid to the node for each mined block
pub const MINING_REWARD: f64 = 1.0;

/// Errors that can occur during node operations
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Ledger error: {0}")]
    LedgerError(#[from] LedgerError),

    #[error("Registry error: {0}")]
    RegistryError(#[from] RegistryError),

    #[error("Mining was cancelled because the chain was replaced")]
    MiningCancelled,

    #[error("Background task failed: {0}")]
    Blocking(String),
}

/// A single ledger node: its chain, its peers and its identity
///
/// One instance lives for the whole process and is shared with the request
/// handlers.
pub struct Node {
    /// Identifier mining rewards are paid to
    id: String,

    ledger: Ledger,

    registry: NodeRegistry,

    resolver: ConsensusResolver<Arc<dyn ChainSource>>,

    /// Proof-of-work searches currently running, cancelled on chain replacement
    searches: DashMap<Uuid, CancelToken>,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("ledger", &self.ledger)
            .field("registry", &self.registry)
            .finish()
    }
}

impl Node {
    /// Creates a node with a fresh ledger and no known peers
    ///
    /// # Arguments
    ///
    /// * `id` - The identifier mining rewards are paid to
    /// * `source` - Where peers' chains are fetched from
    pub fn new(id: impl Into<String>, source: Arc<dyn ChainSource>) -> Self {
        Node {
            id: id.into(),
            ledger: Ledger::new(),
            registry: NodeRegistry::new(),
            resolver: ConsensusResolver::new(source),
            searches: DashMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Adds a transaction to the pending pool
    ///
    /// # Returns
    ///
    /// The index of the block that will include this transaction
    pub fn submit_transaction(&self, sender: &str, recipient: &str, amount: f64) -> u64 {
        self.ledger.new_transaction(sender, recipient, amount)
    }

    /// Mines a new block with the pending transactions
    ///
    /// Solves proof of work against the current last block without holding
    /// the ledger lock, then pays the mining reward and seals the block. This
    /// blocks the calling thread for the whole search.
    pub fn mine(&self) -> Result<Block, NodeError> {
        self.mine_with(CancelToken::new())
    }

    /// Mines with a caller-supplied token; the search is also cancelled when
    /// the chain is replaced
    pub fn mine_with(&self, token: CancelToken) -> Result<Block, NodeError> {
        let last_block = self.ledger.last_block();
        let previous_hash = digest(&last_block);

        let search_id = Uuid::new_v4();
        self.searches.insert(search_id, token.clone());

        let solved = proof::solve_with_cancel(last_block.proof, &token);
        self.searches.remove(&search_id);

        let Some(proof) = solved else {
            warn!("Proof-of-work search on block {} was cancelled", last_block.index);
            return Err(NodeError::MiningCancelled);
        };

        let reward = Transaction::reward(self.id.as_str(), MINING_REWARD);
        let block = self.ledger.seal_mined_block(&previous_hash, proof, reward)?;

        info!(
            "Mined block {} with proof {} ({} transactions)",
            block.index,
            block.proof,
            block.transactions.len()
        );

        Ok(block)
    }

    /// Gets the entire chain and its length
    pub fn chain(&self) -> (Vec<Block>, usize) {
        let chain = self.ledger.chain();
        let length = chain.len();
        (chain, length)
    }

    /// Gets all pending transactions
    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.ledger.pending_transactions()
    }

    /// Validates the local chain
    pub fn is_valid(&self) -> bool {
        validation::is_valid(&self.ledger.chain())
    }

    /// Registers a peer, returning its canonical address
    pub fn register_peer(&self, address: &str) -> Result<String, NodeError> {
        let peer = self.registry.register(address)?;
        info!("Registered peer {}", peer);

        Ok(peer)
    }

    /// Registers a batch of peers; nothing is stored unless every address
    /// is valid
    pub fn register_peers<S: AsRef<str>>(&self, addresses: &[S]) -> Result<Vec<String>, NodeError> {
        let peers = self.registry.register_all(addresses)?;
        info!("Registered peers {:?}", peers);

        Ok(peers)
    }

    /// Lists known peers
    pub fn peers(&self) -> Vec<String> {
        self.registry.list()
    }

    /// Replaces the local chain with the longest valid peer chain, if any peer
    /// has one strictly longer
    ///
    /// Running proof-of-work searches are cancelled when the chain is
    /// replaced.
    ///
    /// # Returns
    ///
    /// Whether the local chain was replaced
    pub async fn resolve_conflicts(&self) -> bool {
        let local_chain = self.ledger.chain();
        let peers = self.registry.list();

        let resolution = self.resolver.resolve(&local_chain, &peers).await;
        let Some(chain) = resolution.chain else {
            info!("Local chain of {} blocks is authoritative", local_chain.len());
            return false;
        };

        if !self.ledger.replace_if_longer(chain) {
            info!("Local chain grew during resolution; keeping it");
            return false;
        }

        self.cancel_searches();
        true
    }

    fn cancel_searches(&self) {
        for search in self.searches.iter() {
            search.value().cancel();
        }
    }
}
