use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::address::{AmAddr, AmGroup, AmId};
use crate::error::{FrameError, Result};
use crate::overridable::Overridable;
use crate::packet::{Packet, PacketFactory};

/// AM header: dispatch (1) + destination (2) + source (2) + length (1) + group (1) + type (1).
pub const HEADER_SIZE: usize = 8;

/// Largest frame a single length byte can describe.
pub const MAX_FRAME: usize = 255;

/// Largest payload that fits alongside the header: 247 bytes.
pub const MAX_PAYLOAD: usize = MAX_FRAME - HEADER_SIZE;

/// Dispatch tag of plain AM frames.
pub const AM_DISPATCH: u8 = 0x00;

const LINK_QUALITY_FOOTER_LEN: usize = 2;

/// A typed Active Message.
///
/// A `Message` is also a [`PacketFactory`]: one template per connection holds
/// the dispatch tag and the default group/source, and every message created
/// from it inherits those. Source and group resolve to the defaults until they
/// are set explicitly; decoding always sets them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    dispatch: u8,
    destination: AmAddr,
    source: Overridable<AmAddr>,
    group: Overridable<AmGroup>,
    am_type: AmId,
    payload: Bytes,
    footer: Bytes,
    lqi: u8,
    rssi: i8,
}

impl Message {
    /// Create a template message with the given defaults and the AM dispatch tag.
    pub fn new(default_group: AmGroup, default_source: AmAddr) -> Self {
        Self {
            dispatch: AM_DISPATCH,
            destination: AmAddr::default(),
            source: Overridable::new(default_source),
            group: Overridable::new(default_group),
            am_type: AmId::default(),
            payload: Bytes::new(),
            footer: Bytes::new(),
            lqi: 0,
            rssi: 0,
        }
    }

    /// Builder form of [`set_dispatch`](Self::set_dispatch).
    pub fn with_dispatch(mut self, dispatch: u8) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// A fresh zero-valued message sharing this one's dispatch tag and defaults.
    pub fn new_message(&self) -> Message {
        Message::new(self.group.default_value(), self.source.default_value())
            .with_dispatch(self.dispatch)
    }

    pub fn dispatch(&self) -> u8 {
        self.dispatch
    }

    pub fn set_dispatch(&mut self, dispatch: u8) {
        self.dispatch = dispatch;
    }

    pub fn destination(&self) -> AmAddr {
        self.destination
    }

    pub fn set_destination(&mut self, destination: AmAddr) {
        self.destination = destination;
    }

    /// Effective source: the explicit one if set, else the default.
    pub fn source(&self) -> AmAddr {
        self.source.get()
    }

    pub fn set_source(&mut self, source: AmAddr) {
        self.source.set(source);
    }

    /// Whether [`source`](Self::source) is explicit rather than defaulted.
    pub fn has_source(&self) -> bool {
        self.source.is_set()
    }

    /// Effective group: the explicit one if set, else the default.
    pub fn group(&self) -> AmGroup {
        self.group.get()
    }

    pub fn set_group(&mut self, group: AmGroup) {
        self.group.set(group);
    }

    pub fn has_group(&self) -> bool {
        self.group.is_set()
    }

    pub fn default_source(&self) -> AmAddr {
        self.source.default_value()
    }

    pub fn default_group(&self) -> AmGroup {
        self.group.default_value()
    }

    /// AM message type, the routing key inside a message dispatcher.
    pub fn am_type(&self) -> AmId {
        self.am_type
    }

    pub fn set_type(&mut self, am_type: AmId) {
        self.am_type = am_type;
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Replace the payload. Length is checked when serializing.
    pub fn set_payload(&mut self, payload: impl Into<Bytes>) {
        self.payload = payload.into();
    }

    pub fn footer(&self) -> &Bytes {
        &self.footer
    }

    /// Replace the footer. LQI/RSSI are only derived when decoding.
    pub fn set_footer(&mut self, footer: impl Into<Bytes>) {
        self.footer = footer.into();
    }

    /// Link quality indicator; zero unless the decoded footer was 2 bytes.
    pub fn lqi(&self) -> u8 {
        self.lqi
    }

    /// Received signal strength; zero unless the decoded footer was 2 bytes.
    pub fn rssi(&self) -> i8 {
        self.rssi
    }

    /// Encode this message into `dst`.
    ///
    /// Wire format (big-endian):
    /// ```text
    /// ┌──────────┬─────────┬────────┬────────┬───────┬──────┬─────────┬────────┐
    /// │ Dispatch │ Dest    │ Source │ Length │ Group │ Type │ Payload │ Footer │
    /// │ (1B)     │ (2B)    │ (2B)   │ (1B)   │ (1B)  │ (1B) │ (≤247B) │ (0..N) │
    /// └──────────┴─────────┴────────┴────────┴───────┴──────┴─────────┴────────┘
    /// ```
    ///
    /// Nothing is written if the payload is too long.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        if self.payload.len() > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLong {
                len: self.payload.len(),
                max: MAX_PAYLOAD,
            });
        }

        let start = dst.len();
        dst.reserve(HEADER_SIZE + self.payload.len() + self.footer.len());
        dst.put_u8(self.dispatch);
        dst.put_u16(self.destination().get());
        dst.put_u16(self.source().get());
        dst.put_u8(self.payload.len() as u8);
        dst.put_u8(self.group().get());
        dst.put_u8(self.am_type.get());
        assert_eq!(
            dst.len() - start,
            HEADER_SIZE,
            "AM header must encode to exactly {HEADER_SIZE} bytes"
        );

        dst.put_slice(&self.payload);
        if !self.footer.is_empty() {
            dst.put_slice(&self.footer);
        }
        Ok(())
    }
}

impl Packet for Message {
    fn serialize(&self) -> Result<Bytes> {
        let mut dst = BytesMut::new();
        self.encode(&mut dst)?;
        Ok(dst.freeze())
    }

    fn deserialize(&mut self, data: &[u8]) -> Result<()> {
        if data.len() < HEADER_SIZE {
            return Err(FrameError::Truncated {
                needed: HEADER_SIZE,
                available: data.len(),
            });
        }

        let mut buf = data;
        let dispatch = buf.get_u8();
        let destination = AmAddr(buf.get_u16());
        let source = AmAddr(buf.get_u16());
        let declared = usize::from(buf.get_u8());
        let group = AmGroup(buf.get_u8());
        let am_type = AmId(buf.get_u8());

        if buf.remaining() < declared {
            return Err(FrameError::PayloadTooShort {
                declared,
                actual: buf.remaining(),
            });
        }

        let payload = Bytes::copy_from_slice(&buf[..declared]);
        buf.advance(declared);
        let footer = Bytes::copy_from_slice(buf);

        let (lqi, rssi) = if footer.len() == LINK_QUALITY_FOOTER_LEN {
            (footer[0], footer[1] as i8)
        } else {
            (0, 0)
        };

        self.dispatch = dispatch;
        self.set_destination(destination);
        self.set_source(source);
        self.set_group(group);
        self.set_type(am_type);
        self.payload = payload;
        self.footer = footer;
        self.lqi = lqi;
        self.rssi = rssi;
        Ok(())
    }

    fn dispatch(&self) -> u8 {
        self.dispatch
    }
}

impl PacketFactory for Message {
    fn new_packet(&self) -> Box<dyn Packet> {
        Box::new(self.new_message())
    }

    fn dispatch(&self) -> u8 {
        self.dispatch
    }
}

impl fmt::Display for Message {
    /// `{GG}SSSS->DDDD[TT]len: PAYLOAD`, plus ` LQ:rssi` when both are non-zero.
    ///
    /// A footer carrying LQI=0 or RSSI=0 renders the same as no footer.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{}}}{}->{}[{}]{:3}: ",
            self.group(),
            self.source(),
            self.destination,
            self.am_type,
            self.payload.len()
        )?;
        for byte in self.payload.iter() {
            write!(f, "{byte:02X}")?;
        }
        if self.lqi != 0 && self.rssi != 0 {
            write!(f, " {:02X}:{:3}", self.lqi, self.rssi)?;
        }
        Ok(())
    }
}
