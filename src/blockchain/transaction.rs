use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Sender used for mining reward transactions
pub const REWARD_SENDER: &str = "0";

/// Represents a transaction in the blockchain
///
/// Field order is the canonical hashing order (see [`super::block::digest`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    /// Amount being transferred
    pub amount: f64,

    /// Recipient's address
    pub recipient: String,

    /// Sender's address
    pub sender: String,
}

impl Transaction {
    /// Creates a new transaction
    ///
    /// No validation is performed: sender, recipient and amount are opaque
    /// to the ledger.
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: f64) -> Self {
        Transaction {
            amount,
            recipient: recipient.into(),
            sender: sender.into(),
        }
    }

    /// Creates a mining reward transaction paid to `recipient`
    pub fn reward(recipient: impl Into<String>, amount: f64) -> Self {
        Transaction::new(REWARD_SENDER, recipient, amount)
    }

    /// Checks if the transaction is a mining reward
    pub fn is_reward(&self) -> bool {
        self.sender == REWARD_SENDER
    }
}
