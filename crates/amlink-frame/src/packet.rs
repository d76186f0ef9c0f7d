use std::fmt;

use bytes::Bytes;

use crate::error::Result;

/// A decodable, encodable frame owned by one dispatch tag.
///
/// `Display` is the human-readable form used in logs.
pub trait Packet: fmt::Display + fmt::Debug + Send + Sync {
    /// Encode into wire bytes, starting with the dispatch tag.
    fn serialize(&self) -> Result<Bytes>;

    /// Decode from wire bytes, replacing this packet's contents.
    ///
    /// On error the packet is left as it was before the call.
    fn deserialize(&mut self, data: &[u8]) -> Result<()>;

    /// The dispatch tag this packet is carried under.
    fn dispatch(&self) -> u8;
}

/// Produces fresh packets of one kind.
pub trait PacketFactory: Send + Sync {
    /// A new zero-valued packet.
    fn new_packet(&self) -> Box<dyn Packet>;

    /// The dispatch tag that routes frames to packets of this kind.
    fn dispatch(&self) -> u8;
}
