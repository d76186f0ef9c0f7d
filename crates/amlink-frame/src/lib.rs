//! Active Message packet model and codec.
//!
//! Every frame starts with a one-byte dispatch tag naming the packet kind
//! that owns it. The AM [`Message`] adds a fixed 8-byte header:
//! - dispatch (1B), destination (2B BE), source (2B BE)
//! - payload length (1B), group (1B), type (1B)
//!
//! followed by up to 247 payload bytes and an optional footer.

pub mod address;
pub mod error;
pub mod message;
pub mod overridable;
pub mod packet;
pub mod raw;

pub use address::{AmAddr, AmGroup, AmId};
pub use error::{FrameError, Result};
pub use message::{Message, AM_DISPATCH, HEADER_SIZE, MAX_FRAME, MAX_PAYLOAD};
pub use overridable::Overridable;
pub use packet::{Packet, PacketFactory};
pub use raw::{RawPacket, RawPacketFactory};
