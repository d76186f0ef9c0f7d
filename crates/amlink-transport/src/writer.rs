use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_frame, MAX_FRAME_LEN};
use crate::error::{Result, TransportError};

/// Writes complete serial-forwarder frames to any `Write` stream.
pub struct SfWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> SfWriter<T> {
    /// Create a new writer wrapping `inner`.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(1 + MAX_FRAME_LEN),
        }
    }

    /// Length-prefix and write one frame (blocking).
    pub fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.buf.clear();
        encode_frame(frame, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(TransportError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::codec::decode_frame;

    #[test]
    fn write_multiple_frames() {
        let mut writer = SfWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send(&[0x00, 0x01]).unwrap();
        writer.send(&[0x71]).unwrap();

        let mut wire = BytesMut::from(writer.into_inner().into_inner().as_slice());
        assert_eq!(decode_frame(&mut wire).unwrap().as_ref(), &[0x00, 0x01]);
        assert_eq!(decode_frame(&mut wire).unwrap().as_ref(), &[0x71]);
        assert!(wire.is_empty());
    }

    #[test]
    fn oversized_frame_writes_nothing() {
        let mut writer = SfWriter::new(Cursor::new(Vec::<u8>::new()));
        assert!(matches!(
            writer.send(&[0u8; 300]),
            Err(TransportError::FrameTooLong { .. })
        ));
        assert!(writer.into_inner().into_inner().is_empty());
    }

    #[test]
    fn zero_write_means_closed() {
        let mut writer = SfWriter::new(ClosedSink);
        assert!(matches!(
            writer.send(b"x"),
            Err(TransportError::ConnectionClosed)
        ));
    }

    struct ClosedSink;

    impl Write for ClosedSink {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
