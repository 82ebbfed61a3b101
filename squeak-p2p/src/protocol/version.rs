//! Version handshake primitives.
//!
//! The handshake protocol:
//! 1. The dialing side sends Version as soon as it is admitted
//! 2. Upon receiving Version, a side sends its own Version (if not yet sent)
//!    followed by VersionAck
//! 3. The session is established once a side holds both versions and has
//!    received a VersionAck

use std::net::SocketAddr;
use std::time::SystemTime;

use crate::config::{MIN_PROTOCOL_VERSION, PROTOCOL_VERSION};
use crate::error::{P2pError, P2pResult};
use crate::protocol::VersionMessage;

/// Create a version message for handshake.
pub fn create_version_message(
    local_addr: SocketAddr,
    remote_addr: SocketAddr,
    nonce: u64,
    user_agent: &str,
) -> VersionMessage {
    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    VersionMessage {
        protocol_version: PROTOCOL_VERSION,
        timestamp,
        addr_recv: remote_addr,
        addr_from: local_addr,
        nonce,
        user_agent: user_agent.to_string(),
    }
}

/// Validate a received version message.
pub fn validate_version(received: &VersionMessage) -> P2pResult<()> {
    if received.protocol_version < MIN_PROTOCOL_VERSION {
        return Err(P2pError::IncompatibleVersion {
            peer_version: received.protocol_version,
            min_version: MIN_PROTOCOL_VERSION,
        });
    }
    Ok(())
}

/// Handshake progress of one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Nothing sent or received.
    Start,
    /// Our version is out, the remote's has not arrived.
    LocalVersionSent,
    /// The remote's version has arrived.
    RemoteVersionReceived,
    /// A verack arrived; waiting for the missing version record.
    VerackExchanged,
    /// Both versions recorded and a verack received.
    Complete,
    /// The connection was rejected during the handshake.
    Aborted,
}

impl HandshakeState {
    /// Whether the session is established.
    pub fn is_complete(self) -> bool {
        self == Self::Complete
    }
}
