//! Buffered decoding of a raw byte stream into messages.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::config::MAX_MESSAGE_SIZE;
use crate::error::{P2pError, P2pResult};
use crate::protocol::{Message, MessageCodec};

/// Accumulates socket reads and yields complete messages.
///
/// A trailing partial frame stays buffered across [`push`](Self::push)
/// calls until the rest of it arrives.
#[derive(Debug)]
pub struct MessageStream {
    buffer: BytesMut,
    codec: MessageCodec,
    max_size: usize,
}

impl MessageStream {
    /// Stream bounded by [`MAX_MESSAGE_SIZE`].
    pub fn new() -> Self {
        Self::with_max_size(MAX_MESSAGE_SIZE)
    }

    /// Stream bounded by `max_size` buffered bytes.
    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            codec: MessageCodec::new(),
            max_size,
        }
    }

    /// Append raw bytes.
    ///
    /// Fails with [`P2pError::FrameTooLarge`] if the buffer would grow past
    /// the maximum size. Nothing is appended in that case.
    pub fn push(&mut self, data: &[u8]) -> P2pResult<()> {
        let size = self.buffer.len() + data.len();
        if size > self.max_size {
            return Err(P2pError::FrameTooLarge {
                size,
                max: self.max_size,
            });
        }
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    /// Decode every complete message currently buffered.
    ///
    /// The iterator is lazy and ends at the first partial frame or after
    /// yielding an error.
    pub fn drain(&mut self) -> Drain<'_> {
        Drain {
            stream: self,
            failed: false,
        }
    }

    /// Number of bytes waiting to be decoded.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes that can still be pushed before hitting the maximum size.
    pub fn remaining(&self) -> usize {
        self.max_size.saturating_sub(self.buffer.len())
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

impl Default for MessageStream {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator returned by [`MessageStream::drain`].
pub struct Drain<'a> {
    stream: &'a mut MessageStream,
    failed: bool,
}

impl Iterator for Drain<'_> {
    type Item = P2pResult<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let stream = &mut *self.stream;
        match stream.codec.decode(&mut stream.buffer) {
            Ok(Some(message)) => Some(Ok(message)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
