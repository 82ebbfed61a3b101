//! Acceptance tests for the P2P layer.
//!
//! Real nodes on 127.0.0.1 with OS-assigned ports:
//! 1. Handshake - a dialer and a listener both reach handshake-complete
//! 2. Inventory sync - an announced squeak is requested and stored
//! 3. Locator sync - a getsqueaks query pulls matching squeaks
//! 4. Self-connect - dialing our own listener never completes
//! 5. Address exchange - a third node discovers the first through the second
//! 6. Capacity - outgoing dials beyond max_peers are refused
//! 7. Shutdown - closing one side empties the other's registry

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};

use squeak_core::{KeyPair, Locator, MemoryBlockchain, Squeak, SqueakMaker, NULL_HASH};
use squeak_p2p::protocol::{GetSqueaksMessage, InvMessage};
use squeak_p2p::{Message, P2pConfig, P2pError, P2pNode};
use squeak_storage::{MemorySqueakStore, SqueakStore};

/// Timeout for waiting on network state.
const WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Create a test node configuration with port 0 (OS assigns port).
fn test_config() -> P2pConfig {
    P2pConfig::new("127.0.0.1:0".parse().unwrap())
        .with_max_peers(8)
        .with_connect_timeout(Duration::from_secs(5))
        .with_handshake_timeout(Duration::from_secs(3))
        .with_health_check_interval(Duration::from_millis(200))
}

struct TestNode {
    node: P2pNode,
    store: Arc<MemorySqueakStore>,
    addr: SocketAddr,
}

async fn start_node(config: P2pConfig) -> TestNode {
    let store = Arc::new(MemorySqueakStore::new());
    let node = P2pNode::new(config, store.clone());
    let addr = node.start().await.unwrap();
    TestNode { node, store, addr }
}

async fn start_connected(to: SocketAddr) -> TestNode {
    start_node(test_config().with_bootstrap_peers(vec![to])).await
}

fn make_squeak(keypair: &KeyPair, content: &str) -> Squeak {
    let chain = MemoryBlockchain::regtest(100);
    SqueakMaker::new(keypair, &chain)
        .make_squeak(content, NULL_HASH)
        .unwrap()
}

async fn wait_for(what: &str, cond: impl Fn() -> bool) {
    let result = timeout(WAIT_TIMEOUT, async {
        while !cond() {
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for {}", what);
}

#[tokio::test]
async fn test_two_nodes_handshake() {
    let a = start_node(test_config()).await;
    let mut changes = a.node.subscribe_peers_changed();
    let b = start_connected(a.addr).await;

    wait_for("a handshaked", || a.node.handshaked_count() == 1).await;
    wait_for("b handshaked", || b.node.handshaked_count() == 1).await;

    let b_view = b.node.handshaked_peers();
    assert_eq!(b_view[0].addr, a.addr);
    assert!(b_view[0].protocol_version.is_some());

    // Admission and handshake completion are both announced.
    let first = changes.recv().await.unwrap();
    assert_eq!(first.len(), 1);
}

#[tokio::test]
async fn test_inv_getdata_roundtrip() {
    let a = start_node(test_config()).await;
    let b = start_connected(a.addr).await;
    wait_for("handshake", || {
        a.node.handshaked_count() == 1 && b.node.handshaked_count() == 1
    })
    .await;

    let squeak = make_squeak(&KeyPair::generate(), "hello from b");
    let hash = squeak.hash();
    b.store.add_squeak(squeak).unwrap();
    assert!(!a.store.contains(&hash).unwrap());

    let mut stored = a.node.subscribe_squeaks();
    let sent = b.node.broadcast(Message::Inv(InvMessage::squeaks([hash]))).await;
    assert_eq!(sent, 1);

    wait_for("a stores the squeak", || a.store.contains(&hash).unwrap()).await;
    assert_eq!(stored.recv().await.unwrap(), hash);
}

#[tokio::test]
async fn test_getsqueaks_pulls_followed_author() {
    let a = start_node(test_config()).await;
    let b = start_connected(a.addr).await;
    wait_for("handshake", || {
        a.node.handshaked_count() == 1 && b.node.handshaked_count() == 1
    })
    .await;

    let followed = KeyPair::generate();
    let wanted = make_squeak(&followed, "followed");
    let unwanted = make_squeak(&KeyPair::generate(), "stranger");
    let wanted_hash = wanted.hash();
    let unwanted_hash = unwanted.hash();
    a.store.add_squeak(wanted).unwrap();
    a.store.add_squeak(unwanted).unwrap();

    let request = GetSqueaksMessage {
        locator: Locator::from_follows(&[followed.address()]),
    };
    b.node.broadcast(Message::GetSqueaks(request)).await;

    wait_for("b pulls the followed squeak", || {
        b.store.contains(&wanted_hash).unwrap()
    })
    .await;
    sleep(Duration::from_millis(200)).await;
    assert!(!b.store.contains(&unwanted_hash).unwrap());
}

#[tokio::test]
async fn test_self_connect_rejected() {
    let a = start_node(test_config()).await;
    a.node.connect_peer(a.addr).await.unwrap();

    sleep(Duration::from_millis(300)).await;
    assert_eq!(a.node.handshaked_count(), 0);
    wait_for("self connection torn down", || a.node.peers().is_empty()).await;
}

#[tokio::test]
async fn test_address_exchange_discovers_peer() {
    let a = start_node(test_config()).await;
    let b = start_connected(a.addr).await;
    wait_for("b handshaked with a", || b.node.handshaked_count() == 1).await;

    // c dials b, asks for addresses on handshake, learns a and dials it.
    let c = start_connected(b.addr).await;
    wait_for("c discovers a", || c.node.handshaked_count() == 2).await;

    let mut addrs: Vec<_> = c.node.handshaked_peers().iter().map(|p| p.addr).collect();
    addrs.sort();
    let mut expected = vec![a.addr, b.addr];
    expected.sort();
    assert_eq!(addrs, expected);
}

#[tokio::test]
async fn test_outgoing_capacity_enforced() {
    let a = start_node(test_config()).await;
    let b = start_node(test_config()).await;
    let c = start_node(test_config().with_max_peers(1)).await;

    c.node.connect_peer(a.addr).await.unwrap();
    let result = c.node.connect_peer(b.addr).await;
    assert!(matches!(result, Err(P2pError::MaxConnectionsReached { max: 1 })));

    let duplicate = c.node.connect_peer(a.addr).await;
    assert!(matches!(duplicate, Err(P2pError::DuplicatePeer { .. })));
}

#[tokio::test]
async fn test_shutdown_disconnects_peers() {
    let a = start_node(test_config()).await;
    let b = start_connected(a.addr).await;
    wait_for("handshake", || b.node.handshaked_count() == 1).await;

    a.node.shutdown();
    wait_for("a empty", || a.node.peers().is_empty()).await;
    wait_for("b notices", || b.node.peers().is_empty()).await;

    let refused = a.node.connect_peer(b.addr).await;
    assert!(matches!(refused, Err(P2pError::Shutdown)));
}

#[tokio::test]
async fn test_handshake_timeout_drops_silent_peer() {
    let a = start_node(test_config().with_handshake_timeout(Duration::from_millis(300))).await;
    let _silent = tokio::net::TcpStream::connect(a.addr).await.unwrap();

    wait_for("silent peer admitted", || a.node.peers().len() == 1).await;
    wait_for("silent peer dropped", || a.node.peers().is_empty()).await;
}

#[tokio::test]
async fn test_zero_health_interval_refused_at_start() {
    let config = test_config().with_health_check_interval(Duration::ZERO);
    let node = P2pNode::new(config, Arc::new(MemorySqueakStore::new()));

    let result = node.start().await;
    assert!(matches!(result, Err(P2pError::InvalidConfig(_))));
}
