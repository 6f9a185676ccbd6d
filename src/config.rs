use std::time::Duration;

use clap::Parser;
use uuid::Uuid;

/// Command line and environment configuration for a ledger node
#[derive(Debug, Clone, Parser)]
#[command(name = "pow_ledger", about = "Proof-of-work ledger node")]
pub struct NodeConfig {
    /// Address to bind the HTTP server to.
    #[arg(long, default_value = "127.0.0.1", env = "LEDGER_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = 5000, env = "LEDGER_PORT")]
    pub port: u16,

    /// Identifier mining rewards are paid to. Random when omitted.
    #[arg(long, env = "LEDGER_NODE_ID")]
    pub node_id: Option<String>,

    /// Peer to register at startup (repeatable, or comma separated in the env var).
    #[arg(long = "peer", env = "LEDGER_PEERS", value_delimiter = ',')]
    pub peers: Vec<String>,

    /// Seconds to wait for a peer's chain before skipping it.
    #[arg(long, default_value_t = 5, env = "LEDGER_FETCH_TIMEOUT")]
    pub fetch_timeout_secs: u64,
}

impl NodeConfig {
    /// The configured node identifier, or a fresh dashless UUID
    pub fn resolve_node_id(&self) -> String {
        self.node_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
