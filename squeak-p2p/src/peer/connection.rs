//! A live connection: session state plus the socket halves.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::codec::Encoder;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::config::READ_CHUNK_SIZE;
use crate::error::{P2pError, P2pResult};
use crate::peer::info::{ConnectionDirection, PeerInfo, PeerSnapshot};
use crate::peer::stream::MessageStream;
use crate::protocol::{Message, MessageCodec};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

struct Reader {
    io: BoxedReader,
    stream: MessageStream,
}

/// One network session.
///
/// Only the peer's worker reads; any task may send. Sends are serialized by
/// the writer lock so frames never interleave.
pub struct Peer {
    addr: SocketAddr,
    direction: ConnectionDirection,
    info: Mutex<PeerInfo>,
    reader: AsyncMutex<Option<Reader>>,
    writer: AsyncMutex<Option<BoxedWriter>>,
    stopped: CancellationToken,
    closed: AtomicBool,
    torn_down: AtomicBool,
}

impl Peer {
    /// Wrap any bidirectional byte stream.
    pub fn new<S>(io: S, addr: SocketAddr, direction: ConnectionDirection) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(io);
        Self::from_halves(Box::new(reader), Box::new(writer), addr, direction)
    }

    /// Wrap a connected TCP stream.
    pub fn from_tcp(stream: TcpStream, direction: ConnectionDirection) -> P2pResult<Self> {
        let addr = stream.peer_addr()?;
        let (reader, writer) = stream.into_split();
        Ok(Self::from_halves(
            Box::new(reader),
            Box::new(writer),
            addr,
            direction,
        ))
    }

    fn from_halves(
        reader: BoxedReader,
        writer: BoxedWriter,
        addr: SocketAddr,
        direction: ConnectionDirection,
    ) -> Self {
        Self {
            addr,
            direction,
            info: Mutex::new(PeerInfo::new(addr, direction)),
            reader: AsyncMutex::new(Some(Reader {
                io: reader,
                stream: MessageStream::new(),
            })),
            writer: AsyncMutex::new(Some(writer)),
            stopped: CancellationToken::new(),
            closed: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn direction(&self) -> ConnectionDirection {
        self.direction
    }

    pub fn is_outgoing(&self) -> bool {
        self.direction == ConnectionDirection::Outbound
    }

    /// Lock the session state. Never hold the guard across an await.
    pub fn info(&self) -> MutexGuard<'_, PeerInfo> {
        self.info.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_handshake_complete(&self) -> bool {
        self.info().is_handshake_complete()
    }

    /// Nonce of the version we sent, if any.
    pub fn local_nonce(&self) -> Option<u64> {
        self.info().local_version().map(|v| v.nonce)
    }

    pub fn snapshot(&self) -> PeerSnapshot {
        self.info().snapshot()
    }

    /// Encode and write one frame.
    pub async fn send(&self, message: Message) -> P2pResult<()> {
        if self.stopped.is_cancelled() {
            return Err(P2pError::closed_locally());
        }

        let mut buf = BytesMut::new();
        MessageCodec::new().encode(message, &mut buf)?;

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or_else(P2pError::closed_locally)?;
        tokio::select! {
            _ = self.stopped.cancelled() => return Err(P2pError::closed_locally()),
            result = async {
                writer.write_all(&buf).await?;
                writer.flush().await
            } => result?,
        }
        drop(guard);

        self.info().record_send(buf.len() as u64);
        Ok(())
    }

    /// Read until one complete message is decoded.
    ///
    /// A zero-length read is [`P2pError::PeerDisconnected`].
    pub async fn receive(&self) -> P2pResult<Message> {
        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut().ok_or_else(P2pError::closed_locally)?;
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        loop {
            let before = reader.stream.buffered();
            let next = reader.stream.drain().next();
            if let Some(result) = next {
                let message = result?;
                let size = before - reader.stream.buffered();
                self.info().record_recv(size as u64);
                return Ok(message);
            }

            // Never read past the cap: a complete frame at the limit must
            // decode before anything behind it is buffered.
            let want = READ_CHUNK_SIZE.min(reader.stream.remaining());
            if want == 0 {
                return Err(P2pError::FrameTooLarge {
                    size: reader.stream.buffered(),
                    max: reader.stream.max_size(),
                });
            }
            let n = tokio::select! {
                _ = self.stopped.cancelled() => return Err(P2pError::closed_locally()),
                n = reader.io.read(&mut chunk[..want]) => n?,
            };
            if n == 0 {
                return Err(P2pError::PeerDisconnected {
                    reason: "connection closed by peer".to_string(),
                });
            }
            trace!(peer = %self.addr, bytes = n, "read");
            reader.stream.push(&chunk[..n])?;
        }
    }

    /// Signal the peer to stop. Returns true on the first call only.
    ///
    /// Pending and future sends and receives fail once this returns.
    pub fn close(&self) -> bool {
        let first = !self.closed.swap(true, Ordering::SeqCst);
        self.stopped.cancel();
        first
    }

    pub fn is_closed(&self) -> bool {
        self.stopped.is_cancelled()
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn stopped(&self) {
        self.stopped.cancelled().await
    }

    /// Drop both socket halves, shutting the write side down first.
    pub async fn release(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        self.reader.lock().await.take();
    }

    /// Claim the teardown. Returns true for exactly one caller.
    pub(crate) fn mark_torn_down(&self) -> bool {
        !self.torn_down.swap(true, Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("addr", &self.addr)
            .field("direction", &self.direction)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn pair() -> (Peer, Peer) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        (
            Peer::new(a, addr(1), ConnectionDirection::Outbound),
            Peer::new(b, addr(2), ConnectionDirection::Inbound),
        )
    }

    #[tokio::test]
    async fn test_send_receive() {
        let (a, b) = pair();
        a.send(Message::Ping(11)).await.unwrap();
        a.send(Message::GetAddr).await.unwrap();

        assert_eq!(b.receive().await.unwrap(), Message::Ping(11));
        assert_eq!(b.receive().await.unwrap(), Message::GetAddr);
        assert_eq!(a.info().messages_sent, 2);
        assert_eq!(b.info().messages_recv, 2);
        assert_eq!(a.info().bytes_sent, b.info().bytes_recv);
    }

    #[tokio::test]
    async fn test_remote_close_is_disconnect() {
        let (a, b) = pair();
        a.release().await;
        drop(a);

        let result = b.receive().await;
        assert!(matches!(result, Err(P2pError::PeerDisconnected { .. })));
    }

    #[tokio::test]
    async fn test_close_idempotent() {
        let (a, _b) = pair();
        assert!(a.close());
        assert!(!a.close());
        assert!(a.is_closed());

        a.stopped().await;
        assert!(a.send(Message::Ping(1)).await.is_err());
        assert!(a.receive().await.is_err());
    }

    #[tokio::test]
    async fn test_close_interrupts_receive() {
        let (a, _b) = pair();
        let a = std::sync::Arc::new(a);

        let reader = {
            let a = a.clone();
            tokio::spawn(async move { a.receive().await })
        };
        tokio::task::yield_now().await;
        a.close();

        let result = reader.await.unwrap();
        assert!(matches!(result, Err(P2pError::PeerDisconnected { .. })));
    }

    #[tokio::test]
    async fn test_garbage_is_corrupt_frame() {
        let (raw, b) = tokio::io::duplex(1024);
        let peer = Peer::new(b, addr(2), ConnectionDirection::Inbound);
        let (_, mut w) = tokio::io::split(raw);
        w.write_all(&[0x00; 64]).await.unwrap();

        let result = peer.receive().await;
        assert!(matches!(result, Err(P2pError::CorruptFrame(_))));
    }

    #[tokio::test]
    async fn test_frame_at_size_limit_followed_by_more() {
        use crate::config::MAX_MESSAGE_SIZE;
        use crate::protocol::{InvMessage, HEADER_SIZE};

        // 8-byte length prefix plus 36 bytes per entry.
        let items = (MAX_MESSAGE_SIZE - HEADER_SIZE - 8) / 36;
        let big = Message::Inv(InvMessage::squeaks((0..items).map(|i| {
            let mut hash = [0u8; 32];
            hash[..8].copy_from_slice(&(i as u64).to_le_bytes());
            hash
        })));

        let mut codec = MessageCodec::new();
        let mut bytes = BytesMut::new();
        codec.encode(big.clone(), &mut bytes).unwrap();
        assert!(bytes.len() > MAX_MESSAGE_SIZE - 36);
        codec.encode(Message::Ping(7), &mut bytes).unwrap();

        let (raw, b) = tokio::io::duplex(64 * 1024);
        let peer = Peer::new(b, addr(2), ConnectionDirection::Inbound);
        let writer = tokio::spawn(async move {
            let (_r, mut w) = tokio::io::split(raw);
            w.write_all(&bytes[..1000]).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            w.write_all(&bytes[1000..]).await.unwrap();
            w
        });

        assert_eq!(peer.receive().await.unwrap(), big);
        assert_eq!(peer.receive().await.unwrap(), Message::Ping(7));
        let _w = writer.await.unwrap();
    }

    #[test]
    fn test_mark_torn_down_once() {
        let (a, _b) = pair();
        assert!(a.mark_torn_down());
        assert!(!a.mark_torn_down());
    }
}
