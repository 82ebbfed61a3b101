//! P2P protocol messages.
//!
//! Each message travels as a command name in the frame header plus a
//! bincode payload. The payload shape depends on the command; commands this
//! node does not know decode to [`Message::Unknown`].

use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use squeak_core::serialization::{deserialize, serialize};
use squeak_core::{Locator, Squeak, SqueakHash};

use crate::error::P2pResult;

/// Inventory type tag for a squeak.
pub const INV_SQUEAK: u32 = 1;

/// Width of the command field in the frame header.
pub const COMMAND_SIZE: usize = 12;

/// Version information exchanged during handshake.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionMessage {
    /// Protocol version number.
    pub protocol_version: u32,
    /// Unix time the message was created.
    pub timestamp: u64,
    /// The receiver's address as seen by the sender.
    pub addr_recv: SocketAddr,
    /// The sender's listening address.
    pub addr_from: SocketAddr,
    /// Random nonce identifying this connection attempt.
    pub nonce: u64,
    /// User agent string.
    pub user_agent: String,
}

/// An advertised peer address.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerAddress {
    /// The peer's listening address.
    pub addr: SocketAddr,
    /// Unix time the peer was last connected.
    pub last_seen: u64,
}

/// Addresses of known peers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddrMessage {
    pub addresses: Vec<PeerAddress>,
}

/// One inventory entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct InvVector {
    /// Type tag, [`INV_SQUEAK`] for squeaks.
    pub kind: u32,
    /// Content hash.
    pub hash: SqueakHash,
}

impl InvVector {
    /// Inventory entry for a squeak hash.
    pub fn squeak(hash: SqueakHash) -> Self {
        Self {
            kind: INV_SQUEAK,
            hash,
        }
    }
}

/// Payload of `inv`, `getdata` and `notfound`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvMessage {
    pub items: Vec<InvVector>,
}

impl InvMessage {
    /// Most entries sent in one message. Keeps the encoded payload well
    /// under the frame limit.
    pub const MAX_ITEMS: usize = 25_000;

    /// Split `items` into messages of at most [`MAX_ITEMS`](Self::MAX_ITEMS).
    pub fn chunked(items: &[InvVector]) -> impl Iterator<Item = InvMessage> + '_ {
        items.chunks(Self::MAX_ITEMS).map(|chunk| InvMessage {
            items: chunk.to_vec(),
        })
    }

    /// Inventory listing the given squeak hashes.
    pub fn squeaks<I: IntoIterator<Item = SqueakHash>>(hashes: I) -> Self {
        Self {
            items: hashes.into_iter().map(InvVector::squeak).collect(),
        }
    }
}

/// Request for the hashes of squeaks matching a locator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetSqueaksMessage {
    pub locator: Locator,
}

/// All P2P protocol messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Version handshake initiation.
    Version(VersionMessage),
    /// Version acknowledgment.
    VersionAck,
    /// Ping with nonce for keepalive.
    Ping(u64),
    /// Pong response with matching nonce.
    Pong(u64),
    /// Known peer addresses.
    Addr(AddrMessage),
    /// Request for known peer addresses.
    GetAddr,
    /// Announcement of held content.
    Inv(InvMessage),
    /// Request for content by hash.
    GetData(InvMessage),
    /// Requested content that is not held.
    NotFound(InvMessage),
    /// Locator-based content query.
    GetSqueaks(GetSqueaksMessage),
    /// One squeak.
    Squeak(Box<Squeak>),
    /// A command this node does not understand.
    Unknown { command: String },
}

impl Message {
    /// Command name carried in the frame header.
    pub fn command(&self) -> &str {
        match self {
            Message::Version(_) => "version",
            Message::VersionAck => "verack",
            Message::Ping(_) => "ping",
            Message::Pong(_) => "pong",
            Message::Addr(_) => "addr",
            Message::GetAddr => "getaddr",
            Message::Inv(_) => "inv",
            Message::GetData(_) => "getdata",
            Message::NotFound(_) => "notfound",
            Message::GetSqueaks(_) => "getsqueaks",
            Message::Squeak(_) => "squeak",
            Message::Unknown { command } => command,
        }
    }

    /// Serialize the payload (everything after the frame header).
    pub fn encode_payload(&self) -> P2pResult<Vec<u8>> {
        let bytes = match self {
            Message::Version(v) => serialize(v)?,
            Message::VersionAck | Message::GetAddr | Message::Unknown { .. } => Vec::new(),
            Message::Ping(nonce) | Message::Pong(nonce) => serialize(nonce)?,
            Message::Addr(a) => serialize(a)?,
            Message::Inv(inv) | Message::GetData(inv) | Message::NotFound(inv) => serialize(inv)?,
            Message::GetSqueaks(g) => serialize(g)?,
            Message::Squeak(s) => serialize(s.as_ref())?,
        };
        Ok(bytes)
    }

    /// Decode a payload given its command name.
    pub fn decode(command: &str, payload: &[u8]) -> P2pResult<Self> {
        let message = match command {
            "version" => Message::Version(deserialize(payload)?),
            "verack" => Message::VersionAck,
            "ping" => Message::Ping(deserialize(payload)?),
            "pong" => Message::Pong(deserialize(payload)?),
            "addr" => Message::Addr(deserialize(payload)?),
            "getaddr" => Message::GetAddr,
            "inv" => Message::Inv(deserialize(payload)?),
            "getdata" => Message::GetData(deserialize(payload)?),
            "notfound" => Message::NotFound(deserialize(payload)?),
            "getsqueaks" => Message::GetSqueaks(deserialize(payload)?),
            "squeak" => Message::Squeak(Box::new(deserialize(payload)?)),
            other => Message::Unknown {
                command: other.to_string(),
            },
        };
        Ok(message)
    }

    /// Whether this message belongs to the version/verack exchange.
    pub fn is_handshake(&self) -> bool {
        matches!(self, Message::Version(_) | Message::VersionAck)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Inv(inv) | Message::GetData(inv) | Message::NotFound(inv) => {
                write!(f, "{}({} items)", self.command(), inv.items.len())
            }
            Message::Addr(a) => write!(f, "addr({} addresses)", a.addresses.len()),
            Message::Ping(n) | Message::Pong(n) => write!(f, "{}({})", self.command(), n),
            _ => f.write_str(self.command()),
        }
    }
}
