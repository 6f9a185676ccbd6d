use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use reqwest::Client;
use thiserror::Error;

use crate::blockchain::{ChainSource, RemoteChain};

/// Path every node serves its chain under
pub const CHAIN_PATH: &str = "/api/v1/chain";

/// Errors that can occur while fetching a peer's chain
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Peer answered with status {0}")]
    Status(reqwest::StatusCode),
}

/// Fetches peers' chains over HTTP from their `GET /api/v1/chain` endpoint
#[derive(Debug, Clone)]
pub struct HttpChainSource {
    client: Client,
}

impl HttpChainSource {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(HttpChainSource { client })
    }

    async fn try_fetch(&self, peer: &str) -> Result<RemoteChain, FetchError> {
        let url = format!("http://{}{}", peer, CHAIN_PATH);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        Ok(response.json::<RemoteChain>().await?)
    }
}

#[async_trait]
impl ChainSource for HttpChainSource {
    async fn fetch_chain(&self, peer: &str) -> Option<RemoteChain> {
        match self.try_fetch(peer).await {
            Ok(remote) => Some(remote),
            Err(err) => {
                warn!("Failed to fetch chain from {}: {}", peer, err);
                None
            }
        }
    }
}
