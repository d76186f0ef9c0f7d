use std::sync::{Arc, RwLock};

use amlink_frame::{Packet, PacketFactory};
use crossbeam_channel::Sender;
use tracing::{debug, trace};

use crate::delivery::{deliver, read, write, Delivery};
use crate::error::{DispatchError, Result};
use crate::traits::Dispatcher;

/// Consumer end for opaque packets.
pub type PacketSender = Sender<Arc<dyn Packet>>;

/// Delivers every decoded packet of one kind to a single consumer.
///
/// With no consumer registered, decoded packets are silently dropped.
pub struct PacketDispatcher {
    factory: Box<dyn PacketFactory>,
    receiver: RwLock<Option<PacketSender>>,
}

impl PacketDispatcher {
    /// Create a dispatcher that decodes frames with `factory`.
    pub fn new(factory: impl PacketFactory + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            receiver: RwLock::new(None),
        }
    }

    /// Replace the consumer.
    pub fn register_receiver(&self, receiver: PacketSender) {
        *write(&self.receiver) = Some(receiver);
    }

    /// Remove the consumer. A delivery that is currently retrying gives up.
    pub fn deregister_receiver(&self) {
        *write(&self.receiver) = None;
    }

    fn receiver(&self) -> Option<PacketSender> {
        read(&self.receiver).clone()
    }
}

impl Dispatcher for PacketDispatcher {
    fn receive(&self, frame: &[u8]) -> Result<()> {
        let mut packet = self.factory.new_packet();
        packet
            .deserialize(frame)
            .map_err(|source| DispatchError::Decode {
                dispatch: self.factory.dispatch(),
                source,
            })?;
        let packet: Arc<dyn Packet> = Arc::from(packet);

        match deliver(|| self.receiver(), Arc::clone(&packet)) {
            Delivery::Delivered => trace!(%packet, "packet delivered"),
            outcome => debug!(?outcome, %packet, "packet dropped"),
        }
        Ok(())
    }

    fn dispatch(&self) -> u8 {
        self.factory.dispatch()
    }

    fn new_packet(&self) -> Box<dyn Packet> {
        self.factory.new_packet()
    }
}
