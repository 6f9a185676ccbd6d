//! A minimal proof-of-work ledger node.
//!
//! Blocks are hash-linked and admitted only with a solved proof of work.
//! Nodes settle disagreements by adopting the longest valid chain among
//! their peers.

pub mod api;
pub mod blockchain;
pub mod config;
pub mod node;
pub mod peer_client;
