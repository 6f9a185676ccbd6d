use dashmap::DashSet;
use thiserror::Error;

/// Errors that can occur while registering peers
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Invalid peer address: {0:?}")]
    InvalidAddress(String),
}

/// Set of known peers, keyed by canonical `host:port`
#[derive(Debug, Default)]
pub struct NodeRegistry {
    peers: DashSet<String>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a peer
    ///
    /// Accepts either a URL (`http://10.0.0.5:5000/api`) or a bare
    /// `host:port`. Registering the same peer twice has no further effect.
    ///
    /// # Returns
    ///
    /// The canonical form that was stored
    pub fn register(&self, address: &str) -> Result<String, RegistryError> {
        let peer = canonical_address(address)?;
        self.peers.insert(peer.clone());

        Ok(peer)
    }

    /// Registers a batch of peers, all or nothing
    ///
    /// Every address is canonicalized before any is stored, so one bad
    /// address leaves the registry untouched.
    pub fn register_all<S: AsRef<str>>(&self, addresses: &[S]) -> Result<Vec<String>, RegistryError> {
        let peers = addresses
            .iter()
            .map(|address| canonical_address(address.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        for peer in &peers {
            self.peers.insert(peer.clone());
        }

        Ok(peers)
    }

    /// Lists known peers in sorted order
    pub fn list(&self) -> Vec<String> {
        let mut peers: Vec<String> = self.peers.iter().map(|peer| peer.key().clone()).collect();
        peers.sort();
        peers
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

/// Extracts the `host:port` part of an address
///
/// With a scheme, the authority between `://` and the next `/` is taken.
/// Without one, the text up to the first `/` is taken. The port is required.
fn canonical_address(address: &str) -> Result<String, RegistryError> {
    let trimmed = address.trim();
    let rest = match trimmed.split_once("://") {
        Some((_scheme, rest)) => rest,
        None => trimmed,
    };

    let authority = rest.split('/').next().unwrap_or_default();
    // Drop credentials if present
    let authority = authority.rsplit('@').next().unwrap_or_default();

    let invalid = || RegistryError::InvalidAddress(address.to_string());

    if authority.contains(char::is_whitespace) {
        return Err(invalid());
    }

    let (host, port) = authority.rsplit_once(':').ok_or_else(invalid)?;
    if host.is_empty() || port.parse::<u16>().is_err() {
        return Err(invalid());
    }

    Ok(authority.to_string())
}
