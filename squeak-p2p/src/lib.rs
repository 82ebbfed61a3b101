//! P2P networking for the squeak protocol.
//!
//! Nodes exchange squeaks over long-lived TCP sessions:
//!
//! - A version/verack handshake establishes each session and rejects
//!   connections back to ourselves
//! - Peers trade addresses (`getaddr`/`addr`) to find more peers
//! - Content moves pull-style: a locator query (`getsqueaks`) is answered
//!   with an inventory (`inv`), missing items are requested (`getdata`)
//!   and delivered (`squeak`)
//!
//! # Architecture
//!
//! Every peer is owned by one worker task running a receive loop and a
//! periodic health check side by side. Workers share state through
//! [`P2pContext`]: the [`ConnectionRegistry`](manager::ConnectionRegistry)
//! and the squeak store, each behind its own lock.
//!
//! ```text
//! P2pNode::start()
//! ├── Listener task (accept inbound)
//! ├── Peer worker 1 (receive loop + health loop)
//! ├── Peer worker 2 (receive loop + health loop)
//! └── ...
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use squeak_p2p::{P2pConfig, P2pNode};
//! use squeak_storage::MemorySqueakStore;
//!
//! let config = P2pConfig::new("0.0.0.0:8555".parse().unwrap());
//! let node = P2pNode::new(config, Arc::new(MemorySqueakStore::new()));
//! let addr = node.start().await?;
//! ```

pub mod config;
pub mod error;

pub mod context;
pub mod dispatch;
pub mod handshake;
pub mod manager;
pub mod node;
pub mod peer;
pub mod protocol;

#[cfg(test)]
mod testing;

pub use config::{P2pConfig, MAX_MESSAGE_SIZE, NETWORK_MAGIC, PROTOCOL_VERSION};
pub use context::P2pContext;
pub use error::{P2pError, P2pResult};
pub use node::P2pNode;
pub use peer::{ConnectionDirection, Peer, PeerInfo, PeerSnapshot};
pub use protocol::Message;
