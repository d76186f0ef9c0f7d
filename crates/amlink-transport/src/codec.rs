use std::io::{Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, TransportError};

/// Largest frame one length byte can carry.
pub const MAX_FRAME_LEN: usize = u8::MAX as usize;

/// Banner both sides send on connect: protocol version `U` and a spare byte.
pub const PROTOCOL_BANNER: [u8; 2] = *b"U ";

/// Encode a frame into the serial-forwarder stream format.
///
/// Wire format:
/// ```text
/// ┌────────────┬──────────────────────────┐
/// │ Length (1B)│ Frame (Length bytes)     │
/// │ 1..=255    │ dispatch byte + packet   │
/// └────────────┴──────────────────────────┘
/// ```
pub fn encode_frame(frame: &[u8], dst: &mut BytesMut) -> Result<()> {
    if frame.len() > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLong {
            len: frame.len(),
            max: MAX_FRAME_LEN,
        });
    }
    dst.reserve(1 + frame.len());
    dst.put_u8(frame.len() as u8);
    dst.put_slice(frame);
    Ok(())
}

/// Decode the next frame from a buffer.
///
/// Returns `None` if the buffer doesn't contain a complete frame yet. Zero
/// length prefixes carry nothing and are skipped.
pub fn decode_frame(src: &mut BytesMut) -> Option<Bytes> {
    loop {
        let len = usize::from(*src.first()?);
        if len == 0 {
            src.advance(1);
            continue;
        }
        if src.len() < 1 + len {
            return None; // Need more data
        }
        src.advance(1);
        return Some(src.split_to(len).freeze());
    }
}

/// Exchange protocol banners over a freshly opened stream.
///
/// Callers set read timeouts beforehand; a peer that never answers surfaces
/// as an I/O error.
pub fn handshake<S: Read + Write>(stream: &mut S) -> Result<()> {
    stream.write_all(&PROTOCOL_BANNER)?;
    stream.flush()?;

    let mut reply = [0u8; 2];
    stream.read_exact(&mut reply)?;
    if reply[0] != PROTOCOL_BANNER[0] {
        return Err(TransportError::Handshake(format!(
            "unsupported protocol version {:?}",
            reply[0] as char
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        encode_frame(&[0x00, 0xFF, 0xFF], &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0x03, 0x00, 0xFF, 0xFF]);

        let frame = decode_frame(&mut buf).unwrap();
        assert_eq!(frame.as_ref(), &[0x00, 0xFF, 0xFF]);
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_incomplete_frame() {
        let mut buf = BytesMut::from(&[0x04, 0x00, 0x01][..]);
        assert!(decode_frame(&mut buf).is_none());
        assert_eq!(buf.len(), 3);
        assert!(decode_frame(&mut BytesMut::new()).is_none());
    }

    #[test]
    fn zero_length_prefixes_are_skipped() {
        let mut buf = BytesMut::from(&[0x00, 0x00, 0x01, 0x7A][..]);
        assert_eq!(decode_frame(&mut buf).unwrap().as_ref(), &[0x7A]);
        assert!(buf.is_empty());
    }

    #[test]
    fn frame_too_long_rejected() {
        let mut buf = BytesMut::new();
        let err = encode_frame(&[0u8; 256], &mut buf).unwrap_err();
        assert!(matches!(err, TransportError::FrameTooLong { len: 256, max: 255 }));
        assert!(buf.is_empty());
        encode_frame(&[0u8; 255], &mut buf).unwrap();
        assert_eq!(buf[0], 0xFF);
    }

    #[test]
    fn multiple_frames() {
        let mut buf = BytesMut::new();
        encode_frame(b"first", &mut buf).unwrap();
        encode_frame(b"second", &mut buf).unwrap();

        assert_eq!(decode_frame(&mut buf).unwrap().as_ref(), b"first");
        assert_eq!(decode_frame(&mut buf).unwrap().as_ref(), b"second");
        assert!(buf.is_empty());
    }

    struct Duplex {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for Duplex {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Duplex {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn handshake_accepts_version_u() {
        let mut stream = Duplex {
            input: Cursor::new(b"U ".to_vec()),
            output: Vec::new(),
        };
        handshake(&mut stream).unwrap();
        assert_eq!(stream.output, b"U ");
    }

    #[test]
    fn handshake_rejects_other_versions() {
        let mut stream = Duplex {
            input: Cursor::new(b"T ".to_vec()),
            output: Vec::new(),
        };
        assert!(matches!(
            handshake(&mut stream),
            Err(TransportError::Handshake(_))
        ));
    }

    #[test]
    fn handshake_fails_on_short_reply() {
        let mut stream = Duplex {
            input: Cursor::new(b"U".to_vec()),
            output: Vec::new(),
        };
        assert!(matches!(handshake(&mut stream), Err(TransportError::Io(_))));
    }
}
