// Blockchain module
//
// This module contains the ledger and consensus engine:
// - Block structure and block hashing
// - Transaction structure
// - Proof of work puzzle
// - Ledger (chain + pending transactions)
// - Chain validation
// - Longest-chain conflict resolution
// - Peer registry

pub mod block;
pub mod consensus;
pub mod ledger;
pub mod proof;
pub mod registry;
pub mod transaction;
pub mod validation;

// Re-export main components for easier access
pub use block::{digest, Block};
pub use consensus::{ChainSource, ConsensusResolver, RemoteChain, Resolution};
pub use ledger::{Ledger, LedgerError};
pub use proof::CancelToken;
pub use registry::{NodeRegistry, RegistryError};
pub use transaction::Transaction;
