use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};

use crate::codec::decode_frame;
use crate::error::{Result, TransportError};

const INITIAL_BUFFER_CAPACITY: usize = 1024;
const READ_CHUNK_SIZE: usize = 512;

/// Reads complete serial-forwarder frames from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
pub struct SfReader<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Read> SfReader<T> {
    /// Create a new reader wrapping `inner`.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(TransportError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Bytes> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf) {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            };

            if read == 0 {
                return Err(TransportError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
