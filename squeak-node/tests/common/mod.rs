//! Shared test helpers for squeak-node integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tokio::time::{sleep, timeout};

use squeak_core::MemoryBlockchain;
use squeak_node::config::NodeConfig;
use squeak_node::rpc::{start_rpc_server, RpcServerHandle, RpcState};
use squeak_node::SqueakNode;

/// Chain height shared by every test node so squeaks validate everywhere.
pub const TEST_CHAIN_HEIGHT: u32 = 100;

/// Timeout for waiting on network state.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Node configuration on loopback with OS-assigned ports.
pub fn test_config() -> NodeConfig {
    NodeConfig {
        p2p_addr: "127.0.0.1:0".parse().unwrap(),
        rpc_addr: "127.0.0.1:0".parse().unwrap(),
        min_peers: 1,
        max_peers: 8,
        sync_interval: Duration::from_millis(100),
        regtest_height: TEST_CHAIN_HEIGHT,
        ..NodeConfig::default()
    }
}

/// A started node and its bound P2P address.
pub struct TestNode {
    pub node: Arc<SqueakNode>,
    pub addr: SocketAddr,
}

/// Create and start a node.
pub async fn start_node(config: NodeConfig) -> TestNode {
    let blockchain = Arc::new(MemoryBlockchain::regtest(config.regtest_height));
    let node = Arc::new(SqueakNode::new(config, blockchain).unwrap());
    let addr = node.start().await.unwrap();
    TestNode { node, addr }
}

/// Start an RPC server for `node`, returning the handle and its URL.
pub async fn start_rpc(node: &Arc<SqueakNode>) -> (RpcServerHandle, String) {
    let state = Arc::new(RpcState::new(node.clone()));
    let handle = start_rpc_server("127.0.0.1:0".parse().unwrap(), state)
        .await
        .unwrap();
    let url = format!("http://{}", handle.local_addr());
    (handle, url)
}

/// Make a JSON-RPC request.
pub async fn rpc_call(client: &Client, url: &str, method: &str, params: Value) -> Value {
    let body = json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1
    });

    let response = client
        .post(url)
        .json(&body)
        .send()
        .await
        .expect("RPC request failed");

    response.json().await.expect("Failed to parse JSON response")
}

/// Error code of a JSON-RPC response, if it failed.
pub fn error_code(response: &Value) -> Option<i64> {
    response["error"]["code"].as_i64()
}

/// Poll `cond` until it holds or [`WAIT_TIMEOUT`] elapses.
pub async fn wait_for(what: &str, cond: impl Fn() -> bool) {
    let result = timeout(WAIT_TIMEOUT, async {
        while !cond() {
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for {}", what);
}
