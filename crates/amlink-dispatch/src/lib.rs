//! Routing of decoded frames to consumer channels.
//!
//! A connection's read path hands each complete frame to a [`DispatchTable`],
//! which picks the [`Dispatcher`] owning the frame's dispatch byte. The
//! dispatcher decodes the frame and delivers the packet to its consumers,
//! blocking the read path while a consumer is busy. Nothing is dropped
//! unless the consumer goes away.

pub mod delivery;
pub mod error;
pub mod message;
pub mod packet;
pub mod table;
pub mod traits;

pub use delivery::{Delivery, RETRY_INTERVAL};
pub use error::{DispatchError, Result};
pub use message::{MessageDispatcher, MessageSender};
pub use packet::{PacketDispatcher, PacketSender};
pub use table::DispatchTable;
pub use traits::Dispatcher;
