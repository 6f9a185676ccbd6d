use thiserror::Error;

use super::block::{digest, Block};
use super::proof;

/// Reasons a candidate chain is rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Block {index} does not link to the digest of block {previous}")]
    BrokenLink { index: u64, previous: u64 },

    #[error("Block {index} carries a proof that does not solve block {previous}'s puzzle")]
    InvalidProof { index: u64, previous: u64 },
}

/// Walks a chain and checks every adjacent pair
///
/// For each `(prev, curr)` the link is checked before the proof. Chains of
/// zero or one block are trivially valid.
pub fn validate(chain: &[Block]) -> Result<(), ValidationError> {
    for pair in chain.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);

        if current.previous_hash != digest(previous) {
            return Err(ValidationError::BrokenLink {
                index: current.index,
                previous: previous.index,
            });
        }

        if !proof::verify(previous.proof, current.proof) {
            return Err(ValidationError::InvalidProof {
                index: current.index,
                previous: previous.index,
            });
        }
    }

    Ok(())
}

/// Checks whether a chain is valid
pub fn is_valid(chain: &[Block]) -> bool {
    validate(chain).is_ok()
}
