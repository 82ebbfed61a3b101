//! Peer connections.
//!
//! This module provides:
//! - Buffered frame decoding over a byte stream
//! - Per-peer session state and health predicates
//! - The shared [`Peer`] handle with its serialized send path

pub mod connection;
pub mod info;
pub mod stream;

pub use connection::Peer;
pub use info::{ConnectionDirection, PeerInfo, PeerSnapshot, PendingPing};
pub use stream::MessageStream;
