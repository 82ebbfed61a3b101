//! In-process fixtures for unit tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use squeak_core::{KeyPair, MemoryBlockchain, Squeak, SqueakMaker, NULL_HASH};
use squeak_storage::{MemorySqueakStore, SqueakStore};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio_util::codec::Encoder;

use crate::config::P2pConfig;
use crate::context::P2pContext;
use crate::peer::{ConnectionDirection, MessageStream, Peer};
use crate::protocol::{create_version_message, Message, MessageCodec};

const DUPLEX_CAPACITY: usize = 256 * 1024;

static NEXT_PORT: AtomicU16 = AtomicU16::new(20_000);

/// A loopback address not handed out before.
pub fn next_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], NEXT_PORT.fetch_add(1, Ordering::Relaxed)))
}

pub fn context() -> Arc<P2pContext> {
    context_with_store(Arc::new(MemorySqueakStore::new()))
}

pub fn context_with_store(store: Arc<dyn SqueakStore>) -> Arc<P2pContext> {
    let config = P2pConfig::new(next_addr()).with_max_peers(4);
    Arc::new(P2pContext::new(config, store))
}

/// Two peers wired to each other: an outgoing `a` and an incoming `b`.
pub fn linked_pair() -> (Arc<Peer>, Arc<Peer>) {
    let (x, y) = tokio::io::duplex(DUPLEX_CAPACITY);
    (
        Arc::new(Peer::new(x, next_addr(), ConnectionDirection::Outbound)),
        Arc::new(Peer::new(y, next_addr(), ConnectionDirection::Inbound)),
    )
}

/// A peer plus a raw handle on the other end of its stream.
pub fn remote(direction: ConnectionDirection) -> (Arc<Peer>, Remote) {
    let (x, y) = tokio::io::duplex(DUPLEX_CAPACITY);
    let addr = next_addr();
    let peer = Arc::new(Peer::new(x, addr, direction));
    (
        peer,
        Remote {
            addr,
            io: y,
            stream: MessageStream::new(),
        },
    )
}

/// Mark `peer` as fully handshaked without exchanging messages.
pub fn handshake(peer: &Peer) {
    let mut info = peer.info();
    let v = create_version_message(peer.addr(), peer.addr(), rand::random(), "test");
    info.record_local_version(v.clone()).unwrap();
    info.record_remote_version(v).unwrap();
    info.record_verack();
    info.mark_handshake_complete().unwrap();
}

/// A valid squeak from a fresh author.
pub fn squeak(content: &str) -> Squeak {
    let keypair = KeyPair::generate();
    let chain = MemoryBlockchain::regtest(10);
    SqueakMaker::new(&keypair, &chain)
        .make_squeak(content, NULL_HASH)
        .unwrap()
}

/// The far end of a peer's stream, speaking raw frames.
pub struct Remote {
    pub addr: SocketAddr,
    io: DuplexStream,
    stream: MessageStream,
}

impl Remote {
    pub async fn send(&mut self, message: Message) {
        let mut buf = bytes::BytesMut::new();
        MessageCodec::new().encode(message, &mut buf).unwrap();
        self.io.write_all(&buf).await.unwrap();
    }

    pub async fn recv(&mut self) -> Message {
        tokio::time::timeout(Duration::from_secs(5), self.next())
            .await
            .expect("timed out waiting for message")
    }

    /// Next message if one arrives within `wait`.
    pub async fn try_recv(&mut self, wait: Duration) -> Option<Message> {
        tokio::time::timeout(wait, self.next()).await.ok()
    }

    async fn next(&mut self) -> Message {
        let mut buf = [0u8; 4096];
        loop {
            let next = self.stream.drain().next();
            if let Some(result) = next {
                return result.unwrap();
            }
            let want = buf.len().min(self.stream.remaining());
            let n = self.io.read(&mut buf[..want]).await.unwrap();
            assert!(n > 0, "peer closed the stream");
            self.stream.push(&buf[..n]).unwrap();
        }
    }
}
