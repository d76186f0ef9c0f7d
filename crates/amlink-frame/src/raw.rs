use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::packet::{Packet, PacketFactory};

/// An opaque frame: a dispatch tag followed by bytes nobody interprets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPacket {
    dispatch: u8,
    payload: Bytes,
}

impl RawPacket {
    /// Wrap `payload` as a frame body tagged with `dispatch`.
    pub fn new(dispatch: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            dispatch,
            payload: payload.into(),
        }
    }

    /// Everything after the dispatch tag.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

impl Packet for RawPacket {
    fn serialize(&self) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(1 + self.payload.len());
        dst.put_u8(self.dispatch);
        dst.put_slice(&self.payload);
        Ok(dst.freeze())
    }

    fn deserialize(&mut self, data: &[u8]) -> Result<()> {
        let (&dispatch, payload) = data.split_first().ok_or(FrameError::EmptyFrame)?;
        self.dispatch = dispatch;
        self.payload = Bytes::copy_from_slice(payload);
        Ok(())
    }

    fn dispatch(&self) -> u8 {
        self.dispatch
    }
}

impl fmt::Display for RawPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawPacket[{:02X}]{:3}: ", self.dispatch, self.payload.len())?;
        for byte in self.payload.iter() {
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

/// Factory for [`RawPacket`]s under one dispatch tag.
///
/// The decoded packet always takes its tag from the frame, so a single factory
/// can stand in for every tag when used as a catch-all.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawPacketFactory {
    dispatch: u8,
}

impl RawPacketFactory {
    pub fn new(dispatch: u8) -> Self {
        Self { dispatch }
    }
}

impl PacketFactory for RawPacketFactory {
    fn new_packet(&self) -> Box<dyn Packet> {
        Box::new(RawPacket::new(self.dispatch, Bytes::new()))
    }

    fn dispatch(&self) -> u8 {
        self.dispatch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_prefixes_dispatch() {
        let packet = RawPacket::new(0x3F, vec![0xDE, 0xAD]);
        assert_eq!(packet.serialize().unwrap().as_ref(), &[0x3F, 0xDE, 0xAD]);
    }

    #[test]
    fn deserialize_splits_dispatch() {
        let mut packet = RawPacketFactory::new(0x00).new_packet();
        packet.deserialize(&[0x71, 0x01, 0x02]).unwrap();
        assert_eq!(packet.dispatch(), 0x71);
        assert_eq!(packet.to_string(), "RawPacket[71]  2: 0102");
    }

    #[test]
    fn deserialize_dispatch_only_frame() {
        let mut packet = RawPacket::default();
        packet.deserialize(&[0x05]).unwrap();
        assert_eq!(packet.dispatch(), 0x05);
        assert!(packet.payload().is_empty());
    }

    #[test]
    fn empty_frame_is_rejected() {
        let mut packet = RawPacket::new(0x09, vec![0x01]);
        assert_eq!(packet.deserialize(&[]), Err(FrameError::EmptyFrame));
        assert_eq!(packet, RawPacket::new(0x09, vec![0x01]));
    }
}
