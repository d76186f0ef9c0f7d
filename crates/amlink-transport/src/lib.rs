//! Connection contract and the serial-forwarder transport.
//!
//! A [`Connection`] owns the byte stream to one endpoint, cuts it into
//! frames, and routes each frame through its dispatch table. The relay only
//! ever talks to this trait.
//!
//! [`SfConnection`] speaks the serial-forwarder protocol over TCP:
//! - a 2-byte `"U "` banner exchanged in both directions on connect
//! - then one length byte followed by that many frame bytes, per frame

pub mod codec;
pub mod error;
pub mod reader;
pub mod sf;
pub mod spec;
pub mod traits;
pub mod writer;

pub use codec::{decode_frame, encode_frame, handshake, MAX_FRAME_LEN, PROTOCOL_BANNER};
pub use error::{Result, TransportError};
pub use reader::SfReader;
pub use sf::{SfConfig, SfConnection};
pub use spec::{open, ConnectionSpec, DEFAULT_BAUD, DEFAULT_SF_PORT};
pub use traits::{Connection, LinkMode};
pub use writer::SfWriter;
