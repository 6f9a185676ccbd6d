use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder, ResponseError};
use log::error;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::{Block, CancelToken, Transaction};
use crate::node::{Node, NodeError};

/// Shared node state
pub type NodeData = web::Data<Node>;

impl ResponseError for NodeError {
    fn status_code(&self) -> StatusCode {
        match self {
            NodeError::MiningCancelled | NodeError::LedgerError(_) => StatusCode::CONFLICT,
            NodeError::RegistryError(_) => StatusCode::BAD_REQUEST,
            NodeError::Blocking(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let NodeError::Blocking(_) = self {
            error!("{}", self);
        }

        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string()
        }))
    }
}

/// Response for the chain endpoint
///
/// Peers decode this body as their remote chain, so `length` and `chain` must
/// keep these names.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ChainResponse {
    /// The blocks in the chain
    pub chain: Vec<Block>,

    /// The length of the chain
    pub length: usize,

    /// Whether the chain is valid
    pub is_valid: bool,
}

/// Request for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionRequest {
    /// The sender's address
    pub sender: String,

    /// The recipient's address
    pub recipient: String,

    /// The amount to transfer
    pub amount: f64,
}

/// Response for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    /// The message
    pub message: String,

    /// The index of the block that will include this transaction
    pub block_index: u64,
}

/// Response for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineResponse {
    /// The message
    pub message: String,

    /// The newly mined block
    pub block: Block,
}

/// Request for the register nodes endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct RegisterNodesRequest {
    /// Peer addresses, as URLs or `host:port`
    pub nodes: Vec<String>,
}

/// Response for the register nodes endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct RegisterNodesResponse {
    /// The message
    pub message: String,

    /// All known peers after registration
    pub total_nodes: Vec<String>,
}

/// Response for the resolve endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ResolveResponse {
    /// The message
    pub message: String,

    /// Whether the local chain was replaced
    pub replaced: bool,

    /// The chain after resolution
    pub chain: Vec<Block>,
}

/// Get the full blockchain
///
/// Returns the entire blockchain, its length and its validity status
#[utoipa::path(
    get,
    path = "/api/v1/chain",
    responses(
        (status = 200, description = "Blockchain retrieved successfully", body = ChainResponse)
    )
)]
pub async fn get_chain(node: NodeData) -> impl Responder {
    let (chain, length) = node.chain();
    let is_valid = crate::blockchain::validation::is_valid(&chain);

    let response = ChainResponse {
        chain,
        length,
        is_valid,
    };

    HttpResponse::Ok().json(response)
}

/// Get all pending transactions
///
/// Returns all transactions waiting to be included in a block
#[utoipa::path(
    get,
    path = "/api/v1/transactions/pending",
    responses(
        (status = 200, description = "Pending transactions retrieved successfully", body = Vec<Transaction>)
    )
)]
pub async fn get_pending_transactions(node: NodeData) -> impl Responder {
    let transactions: Vec<Transaction> = node.pending_transactions();
    HttpResponse::Ok().json(transactions)
}

/// Create a new transaction
///
/// Adds a new transaction to the pending transactions
#[utoipa::path(
    post,
    path = "/api/v1/transactions/new",
    request_body = TransactionRequest,
    responses(
        (status = 201, description = "Transaction created successfully", body = TransactionResponse),
        (status = 400, description = "Invalid transaction data")
    )
)]
pub async fn new_transaction(
    node: NodeData,
    transaction_req: web::Json<TransactionRequest>,
) -> impl Responder {
    let block_index = node.submit_transaction(
        &transaction_req.sender,
        &transaction_req.recipient,
        transaction_req.amount,
    );

    let response = TransactionResponse {
        message: format!("Transaction will be added to Block {}", block_index),
        block_index,
    };

    HttpResponse::Created().json(response)
}

/// Mine a new block
///
/// Solves proof of work and seals all pending transactions plus the mining
/// reward into a new block
#[utoipa::path(
    post,
    path = "/api/v1/mine",
    responses(
        (status = 200, description = "Block mined successfully", body = MineResponse),
        (status = 409, description = "Chain changed while mining"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn mine_block(node: NodeData) -> Result<HttpResponse, NodeError> {
    mine_with_token(node, CancelToken::new()).await
}

/// Runs a mining request whose search can also be stopped through `token`
async fn mine_with_token(node: NodeData, token: CancelToken) -> Result<HttpResponse, NodeError> {
    // Proof of work is CPU bound; keep it off the async workers
    let block = web::block(move || node.mine_with(token))
        .await
        .map_err(|err| NodeError::Blocking(err.to_string()))??;

    let response = MineResponse {
        message: "New Block Forged".to_string(),
        block,
    };

    Ok(HttpResponse::Ok().json(response))
}

/// Check if the blockchain is valid
///
/// Validates the entire blockchain
#[utoipa::path(
    get,
    path = "/api/v1/validate",
    responses(
        (status = 200, description = "Blockchain validation status", body = bool)
    )
)]
pub async fn validate_chain(node: NodeData) -> impl Responder {
    HttpResponse::Ok().json(node.is_valid())
}

/// Register peers
///
/// Adds peer nodes to this node's registry
#[utoipa::path(
    post,
    path = "/api/v1/nodes/register",
    request_body = RegisterNodesRequest,
    responses(
        (status = 201, description = "Peers registered successfully", body = RegisterNodesResponse),
        (status = 400, description = "Missing or invalid peer addresses")
    )
)]
pub async fn register_nodes(
    node: NodeData,
    register_req: web::Json<RegisterNodesRequest>,
) -> impl Responder {
    if register_req.nodes.is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Please supply a valid list of nodes"
        }));
    }

    // All addresses are checked before any is stored
    if let Err(err) = node.register_peers(&register_req.nodes) {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": format!("Failed to register nodes: {}", err)
        }));
    }

    let response = RegisterNodesResponse {
        message: "New nodes have been added".to_string(),
        total_nodes: node.peers(),
    };

    HttpResponse::Created().json(response)
}

/// List peers
///
/// Returns every registered peer
#[utoipa::path(
    get,
    path = "/api/v1/nodes",
    responses(
        (status = 200, description = "Peers retrieved successfully", body = Vec<String>)
    )
)]
pub async fn get_nodes(node: NodeData) -> impl Responder {
    HttpResponse::Ok().json(node.peers())
}

/// Resolve conflicts
///
/// Replaces the local chain with the longest valid chain among peers, if one
/// is strictly longer
#[utoipa::path(
    get,
    path = "/api/v1/nodes/resolve",
    responses(
        (status = 200, description = "Consensus round completed", body = ResolveResponse)
    )
)]
pub async fn resolve_conflicts(node: NodeData) -> impl Responder {
    let replaced = node.resolve_conflicts().await;

    let message = if replaced {
        "Our chain was replaced"
    } else {
        "Our chain is authoritative"
    };

    let response = ResolveResponse {
        message: message.to_string(),
        replaced,
        chain: node.chain().0,
    };

    HttpResponse::Ok().json(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::configure_routes;
    use crate::blockchain::{ChainSource, LedgerError, RemoteChain};
    use actix_web::{body::to_bytes, test, App};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct NoPeers;

    #[async_trait]
    impl ChainSource for NoPeers {
        async fn fetch_chain(&self, _peer: &str) -> Option<RemoteChain> {
            None
        }
    }

    fn node_data() -> NodeData {
        web::Data::new(Node::new("test-node", Arc::new(NoPeers)))
    }

    #[actix_web::test]
    async fn test_get_chain_returns_genesis() {
        let app = test::init_service(App::new().app_data(node_data()).configure(configure_routes)).await;

        let req = test::TestRequest::get().uri("/api/v1/chain").to_request();
        let body: ChainResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.length, 1);
        assert_eq!(body.chain[0].index, 1);
        assert!(body.is_valid);
    }

    #[actix_web::test]
    async fn test_chain_body_decodes_as_remote_chain() {
        let app = test::init_service(App::new().app_data(node_data()).configure(configure_routes)).await;

        let req = test::TestRequest::get().uri("/api/v1/chain").to_request();
        let remote: RemoteChain = test::call_and_read_body_json(&app, req).await;

        assert_eq!(remote.length, remote.chain.len());
    }

    #[actix_web::test]
    async fn test_new_transaction_then_mine() {
        let node = node_data();
        let app = test::init_service(App::new().app_data(node.clone()).configure(configure_routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/transactions/new")
            .set_json(serde_json::json!({"sender": "A", "recipient": "B", "amount": 10}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: TransactionResponse = test::read_body_json(resp).await;
        assert_eq!(body.block_index, 2);

        let req = test::TestRequest::post().uri("/api/v1/mine").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: MineResponse = test::read_body_json(resp).await;

        assert_eq!(body.block.index, 2);
        assert_eq!(body.block.transactions[0], Transaction::new("A", "B", 10.0));
        assert!(node.pending_transactions().is_empty());
    }

    #[actix_web::test]
    async fn test_new_transaction_missing_fields() {
        let app = test::init_service(App::new().app_data(node_data()).configure(configure_routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/transactions/new")
            .set_json(serde_json::json!({"sender": "A"}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_register_nodes() {
        let app = test::init_service(App::new().app_data(node_data()).configure(configure_routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/nodes/register")
            .set_json(serde_json::json!({"nodes": ["http://127.0.0.1:5001", "127.0.0.1:5001", "127.0.0.1:5002"]}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: RegisterNodesResponse = test::read_body_json(resp).await;

        assert_eq!(body.total_nodes, vec!["127.0.0.1:5001", "127.0.0.1:5002"]);
    }

    #[actix_web::test]
    async fn test_register_empty_node_list() {
        let app = test::init_service(App::new().app_data(node_data()).configure(configure_routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/nodes/register")
            .set_json(serde_json::json!({"nodes": []}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_register_nodes_is_all_or_nothing() {
        let node = node_data();
        let app = test::init_service(App::new().app_data(node.clone()).configure(configure_routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/nodes/register")
            .set_json(serde_json::json!({"nodes": ["127.0.0.1:5001", ""]}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(node.peers().is_empty());
    }

    #[actix_web::test]
    async fn test_register_node_without_port() {
        let node = node_data();
        let app = test::init_service(App::new().app_data(node.clone()).configure(configure_routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/nodes/register")
            .set_json(serde_json::json!({"nodes": ["localhost"]}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(node.peers().is_empty());
    }

    #[actix_web::test]
    async fn test_interrupted_mining_maps_to_conflict() {
        let stale = NodeError::LedgerError(LedgerError::StaleTip {
            expected: "a".to_string(),
            found: "b".to_string(),
        });

        for err in [NodeError::MiningCancelled, stale] {
            let resp = err.error_response();
            assert_eq!(resp.status(), StatusCode::CONFLICT);

            let body = to_bytes(resp.into_body()).await.unwrap();
            let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(json["error"], err.to_string());
        }

        assert_eq!(
            NodeError::Blocking("pool closed".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[actix_web::test]
    async fn test_cancelled_mine_returns_conflict() {
        let node = node_data();
        node.submit_transaction("A", "B", 1.0);
        let token = CancelToken::new();
        token.cancel();

        let handler_node = node.clone();
        let app = test::init_service(App::new().route(
            "/mine",
            web::post().to(move || mine_with_token(handler_node.clone(), token.clone())),
        ))
        .await;

        let req = test::TestRequest::post().uri("/mine").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(node.chain().1, 1);
        assert_eq!(node.pending_transactions().len(), 1);
    }

    #[actix_web::test]
    async fn test_resolve_with_unreachable_peer() {
        let node = node_data();
        node.register_peer("127.0.0.1:5001").unwrap();
        let app = test::init_service(App::new().app_data(node).configure(configure_routes)).await;

        let req = test::TestRequest::get().uri("/api/v1/nodes/resolve").to_request();
        let body: ResolveResponse = test::call_and_read_body_json(&app, req).await;

        assert!(!body.replaced);
        assert_eq!(body.chain.len(), 1);
    }
}
