//! P2P protocol layer.
//!
//! This module contains:
//! - Message definitions and their payload encoding
//! - Checksummed framing codec
//! - Version handshake primitives

pub mod framing;
pub mod messages;
pub mod version;

pub use framing::{MessageCodec, HEADER_SIZE};
pub use messages::{
    AddrMessage, GetSqueaksMessage, InvMessage, InvVector, Message, PeerAddress, VersionMessage,
    INV_SQUEAK,
};
pub use version::{create_version_message, validate_version, HandshakeState};
