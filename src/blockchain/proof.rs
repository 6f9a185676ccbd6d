use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sha2::{Digest, Sha256};

/// Number of leading zero hex digits a valid proof's digest must carry
pub const DIFFICULTY: usize = 4;

/// Shared flag used to abort a running proof-of-work search
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; every clone observes it
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Checks whether `candidate_proof` solves the puzzle posed by `previous_proof`
///
/// Hashes the decimal concatenation of both proofs (no separator) and checks
/// for [`DIFFICULTY`] leading `'0'` hex digits.
pub fn verify(previous_proof: u64, candidate_proof: u64) -> bool {
    let guess = format!("{}{}", previous_proof, candidate_proof);
    let guess_hash = hex::encode(Sha256::digest(guess.as_bytes()));

    guess_hash.starts_with(&"0".repeat(DIFFICULTY))
}

/// Finds the smallest proof that satisfies [`verify`] against `previous_proof`
///
/// Brute force from 0 upwards. Runs until a solution is found.
pub fn solve(previous_proof: u64) -> u64 {
    let mut proof = 0;

    while !verify(previous_proof, proof) {
        proof += 1;
    }

    proof
}

/// Same search as [`solve`], checking `cancel` before every attempt
///
/// # Returns
///
/// The solved proof, or `None` if the search was cancelled first
pub fn solve_with_cancel(previous_proof: u64, cancel: &CancelToken) -> Option<u64> {
    let mut proof = 0;

    loop {
        if cancel.is_cancelled() {
            return None;
        }

        if verify(previous_proof, proof) {
            return Some(proof);
        }

        proof += 1;
    }
}
