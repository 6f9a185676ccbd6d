use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::block::Block;
use super::validation;

/// A chain as reported by a peer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteChain {
    /// The length the peer claims for its chain
    pub length: usize,

    /// The blocks in the chain
    pub chain: Vec<Block>,
}

/// Source of peers' chains
///
/// Unreachable peers and malformed payloads are reported as `None`; they are
/// never errors for the caller.
#[async_trait]
pub trait ChainSource: Send + Sync {
    async fn fetch_chain(&self, peer: &str) -> Option<RemoteChain>;
}

#[async_trait]
impl<T: ChainSource + ?Sized> ChainSource for std::sync::Arc<T> {
    async fn fetch_chain(&self, peer: &str) -> Option<RemoteChain> {
        (**self).fetch_chain(peer).await
    }
}

/// Outcome of a conflict resolution round
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Whether a longer valid chain was found
    pub replaced: bool,

    /// The winning chain, present only when `replaced` is true
    pub chain: Option<Vec<Block>>,
}

impl Resolution {
    fn unchanged() -> Self {
        Resolution {
            replaced: false,
            chain: None,
        }
    }
}

/// Applies the longest-valid-chain rule to chains fetched from peers
pub struct ConsensusResolver<S> {
    source: S,
}

impl<S: ChainSource> ConsensusResolver<S> {
    pub fn new(source: S) -> Self {
        ConsensusResolver { source }
    }

    /// Fetches every peer's chain concurrently and picks the longest valid
    /// chain strictly longer than `local_chain`
    ///
    /// The decision is made once, after every peer has been considered.
    pub async fn resolve(&self, local_chain: &[Block], peers: &[String]) -> Resolution {
        let fetches = peers.iter().map(|peer| async move {
            (peer.as_str(), self.source.fetch_chain(peer).await)
        });
        let responses = join_all(fetches).await;

        match select_longest(local_chain.len(), responses) {
            Some(chain) => Resolution {
                replaced: true,
                chain: Some(chain),
            },
            None => Resolution::unchanged(),
        }
    }
}

/// Picks the winning chain out of peer responses
///
/// A candidate wins only if its length is strictly greater than both the local
/// length and every earlier winner, and it passes validation. Equal lengths
/// never replace.
pub fn select_longest<'a, I>(local_length: usize, responses: I) -> Option<Vec<Block>>
where
    I: IntoIterator<Item = (&'a str, Option<RemoteChain>)>,
{
    let mut max_length = local_length;
    let mut winner = None;

    for (peer, response) in responses {
        let Some(remote) = response else {
            debug!("Skipping peer {}: no chain received", peer);
            continue;
        };

        if remote.length != remote.chain.len() {
            warn!(
                "Skipping peer {}: reported length {} but sent {} blocks",
                peer,
                remote.length,
                remote.chain.len()
            );
            continue;
        }

        if remote.length <= max_length {
            debug!("Skipping peer {}: chain of {} blocks is not longer than {}", peer, remote.length, max_length);
            continue;
        }

        if let Err(err) = validation::validate(&remote.chain) {
            warn!("Skipping peer {}: invalid chain: {}", peer, err);
            continue;
        }

        info!("Peer {} offers a valid chain of {} blocks", peer, remote.length);
        max_length = remote.length;
        winner = Some(remote.chain);
    }

    winner
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{proof, Ledger};
    use std::collections::HashMap;

    /// Chain source answering from a fixed map; unknown peers are unreachable
    struct StubSource(HashMap<String, RemoteChain>);

    #[async_trait]
    impl ChainSource for StubSource {
        async fn fetch_chain(&self, peer: &str) -> Option<RemoteChain> {
            self.0.get(peer).cloned()
        }
    }

    fn grow(ledger: &Ledger, blocks: usize) {
        for _ in 0..blocks {
            ledger.new_transaction("alice", "bob", 1.0);
            let last = ledger.last_block();
            ledger.seal_block(proof::solve(last.proof), None);
        }
    }

    fn chain_of(length: usize) -> Vec<Block> {
        let ledger = Ledger::new();
        grow(&ledger, length - 1);
        ledger.chain()
    }

    fn remote(chain: Vec<Block>) -> RemoteChain {
        RemoteChain {
            length: chain.len(),
            chain,
        }
    }

    fn peers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_adopts_longest_valid_chain() {
        let local = chain_of(3);
        let mut invalid = chain_of(4);
        invalid[2].previous_hash = "forged".to_string();
        let longest = chain_of(5);

        let source = StubSource(HashMap::from([
            ("p2:1".to_string(), remote(chain_of(2))),
            ("p3:1".to_string(), remote(chain_of(3))),
            ("p4:1".to_string(), remote(invalid)),
            ("p5:1".to_string(), remote(longest.clone())),
        ]));
        let resolver = ConsensusResolver::new(source);

        let resolution = resolver.resolve(&local, &peers(&["p2:1", "p3:1", "p4:1", "p5:1"])).await;

        assert!(resolution.replaced);
        assert_eq!(resolution.chain, Some(longest));
    }

    #[tokio::test]
    async fn test_result_is_independent_of_peer_order() {
        let local = chain_of(3);
        let longest = chain_of(5);
        let source = StubSource(HashMap::from([
            ("a:1".to_string(), remote(chain_of(4))),
            ("b:1".to_string(), remote(longest.clone())),
        ]));
        let resolver = ConsensusResolver::new(source);

        let forward = resolver.resolve(&local, &peers(&["a:1", "b:1"])).await;
        let backward = resolver.resolve(&local, &peers(&["b:1", "a:1"])).await;

        assert_eq!(forward.chain, Some(longest));
        assert_eq!(forward, backward);
    }

    #[tokio::test]
    async fn test_shared_genesis_longer_chain_replaces() {
        let ours = Ledger::new();
        grow(&ours, 3);
        let theirs = Ledger::with_genesis(ours.chain()[0].clone());
        grow(&theirs, 5);
        assert_eq!(ours.chain()[0], theirs.chain()[0]);

        let source = StubSource(HashMap::from([("peer:1".to_string(), remote(theirs.chain()))]));
        let resolution = ConsensusResolver::new(source)
            .resolve(&ours.chain(), &peers(&["peer:1"]))
            .await;

        assert!(resolution.replaced);
        assert_eq!(resolution.chain.map(|c| c.len()), Some(6));
    }

    #[tokio::test]
    async fn test_equal_length_never_replaces() {
        let local = chain_of(3);
        let source = StubSource(HashMap::from([("peer:1".to_string(), remote(chain_of(3)))]));

        let resolution = ConsensusResolver::new(source).resolve(&local, &peers(&["peer:1"])).await;

        assert_eq!(resolution, Resolution::unchanged());
    }

    #[tokio::test]
    async fn test_unreachable_and_malformed_peers_are_skipped() {
        let local = chain_of(2);
        let mut lying = remote(chain_of(2));
        lying.length = 9;

        let source = StubSource(HashMap::from([("liar:1".to_string(), lying)]));
        let resolution = ConsensusResolver::new(source)
            .resolve(&local, &peers(&["liar:1", "offline:1"]))
            .await;

        assert!(!resolution.replaced);
        assert!(resolution.chain.is_none());
    }

    #[tokio::test]
    async fn test_no_peers_leaves_chain_unchanged() {
        let resolution = ConsensusResolver::new(StubSource(HashMap::new()))
            .resolve(&chain_of(1), &[])
            .await;

        assert_eq!(resolution, Resolution::unchanged());
    }
}
