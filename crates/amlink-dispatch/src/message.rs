use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use amlink_frame::{AmId, Message, Packet, PacketFactory};
use crossbeam_channel::Sender;
use tracing::{debug, trace};

use crate::delivery::{deliver, read, write, Delivery};
use crate::error::{DispatchError, Result};
use crate::traits::Dispatcher;

/// Consumer end for decoded AM messages.
pub type MessageSender = Sender<Arc<Message>>;

/// Routes decoded AM messages by type, optionally mirroring all of them to a
/// snoop consumer.
///
/// Each consumer sees the same shared `Arc<Message>`. Registrations may change
/// from any thread while a delivery is retrying; the retry loop looks the
/// consumer up again before each attempt.
pub struct MessageDispatcher {
    template: Message,
    receivers: RwLock<HashMap<AmId, MessageSender>>,
    snooper: RwLock<Option<MessageSender>>,
}

impl MessageDispatcher {
    /// `template` supplies the dispatch byte and the default group/source.
    pub fn new(template: Message) -> Self {
        Self {
            template,
            receivers: RwLock::new(HashMap::new()),
            snooper: RwLock::new(None),
        }
    }

    /// A new message carrying this dispatcher's dispatch byte and defaults.
    pub fn new_message(&self) -> Message {
        self.template.new_message()
    }

    /// Route messages of `am_type` to `receiver`, replacing any earlier one.
    pub fn register_message_receiver(&self, am_type: AmId, receiver: MessageSender) {
        write(&self.receivers).insert(am_type, receiver);
    }

    /// Stop routing `am_type`. A delivery retrying for it gives up.
    pub fn deregister_message_receiver(&self, am_type: AmId) {
        write(&self.receivers).remove(&am_type);
    }

    /// Mirror every decoded message to `receiver`, replacing any earlier snooper.
    pub fn register_message_snooper(&self, receiver: MessageSender) {
        *write(&self.snooper) = Some(receiver);
    }

    pub fn deregister_message_snooper(&self) {
        *write(&self.snooper) = None;
    }

    fn receiver_for(&self, am_type: AmId) -> Option<MessageSender> {
        read(&self.receivers).get(&am_type).cloned()
    }

    fn snooper(&self) -> Option<MessageSender> {
        read(&self.snooper).clone()
    }
}

impl Dispatcher for MessageDispatcher {
    fn receive(&self, frame: &[u8]) -> Result<()> {
        let mut message = self.template.new_message();
        message
            .deserialize(frame)
            .map_err(|source| DispatchError::Decode {
                dispatch: self.template.dispatch(),
                source,
            })?;
        let message = Arc::new(message);
        let am_type = message.am_type();

        match deliver(|| self.receiver_for(am_type), Arc::clone(&message)) {
            Delivery::Delivered => trace!(%message, "message delivered"),
            Delivery::NoConsumer => debug!(%message, "no receiver for type {am_type}"),
            Delivery::Closed => {
                debug!(%message, "receiver for type {am_type} closed, message dropped")
            }
        }

        if deliver(|| self.snooper(), Arc::clone(&message)) == Delivery::Delivered {
            trace!(%message, "message snooped");
        }
        Ok(())
    }

    fn dispatch(&self) -> u8 {
        self.template.dispatch()
    }

    fn new_packet(&self) -> Box<dyn Packet> {
        self.template.new_packet()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use amlink_frame::{AmAddr, AmGroup, FrameError};
    use crossbeam_channel::{bounded, unbounded};

    use super::*;
    use crate::delivery::RETRY_INTERVAL;

    const TYPE_A: AmId = AmId(0x3F);
    const TYPE_B: AmId = AmId(0x40);

    fn dispatcher() -> MessageDispatcher {
        MessageDispatcher::new(Message::new(AmGroup(0x22), AmAddr(0x0001)))
    }

    fn frame(dispatcher: &MessageDispatcher, am_type: AmId, payload: &[u8]) -> Vec<u8> {
        let mut msg = dispatcher.new_message();
        msg.set_destination(AmAddr::BROADCAST);
        msg.set_type(am_type);
        msg.set_payload(payload.to_vec());
        msg.serialize().unwrap().to_vec()
    }

    #[test]
    fn routes_by_type_and_snoops_everything() {
        let dispatcher = dispatcher();
        let (type_tx, type_rx) = unbounded();
        let (snoop_tx, snoop_rx) = unbounded();
        dispatcher.register_message_receiver(TYPE_A, type_tx);
        dispatcher.register_message_snooper(snoop_tx);

        dispatcher.receive(&frame(&dispatcher, TYPE_A, b"a")).unwrap();
        assert_eq!(type_rx.len(), 1);
        assert_eq!(snoop_rx.len(), 1);
        let routed = type_rx.try_recv().unwrap();
        let snooped = snoop_rx.try_recv().unwrap();
        assert!(Arc::ptr_eq(&routed, &snooped));
        assert_eq!(routed.payload().as_ref(), b"a");

        dispatcher.receive(&frame(&dispatcher, TYPE_B, b"b")).unwrap();
        assert_eq!(type_rx.len(), 0);
        assert_eq!(snoop_rx.len(), 1);
        assert_eq!(snoop_rx.try_recv().unwrap().am_type(), TYPE_B);
    }

    #[test]
    fn unregistered_type_without_snooper_is_dropped() {
        let dispatcher = dispatcher();
        assert!(dispatcher.receive(&frame(&dispatcher, TYPE_B, b"")).is_ok());
    }

    #[test]
    fn decode_failure_delivers_nothing() {
        let dispatcher = dispatcher();
        let (snoop_tx, snoop_rx) = unbounded();
        dispatcher.register_message_snooper(snoop_tx);

        let err = dispatcher.receive(&[0x00, 0x01]).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Decode {
                dispatch: 0x00,
                source: FrameError::Truncated { .. }
            }
        ));
        assert!(snoop_rx.is_empty());
    }

    #[test]
    fn later_registration_wins() {
        let dispatcher = dispatcher();
        let (old_tx, old_rx) = unbounded();
        let (new_tx, new_rx) = unbounded();
        dispatcher.register_message_receiver(TYPE_A, old_tx);
        dispatcher.register_message_receiver(TYPE_A, new_tx);

        dispatcher.receive(&frame(&dispatcher, TYPE_A, b"x")).unwrap();
        assert!(old_rx.is_empty());
        assert_eq!(new_rx.len(), 1);
    }

    #[test]
    fn deregistered_type_no_longer_routes() {
        let dispatcher = dispatcher();
        let (tx, rx) = unbounded();
        dispatcher.register_message_receiver(TYPE_A, tx);
        dispatcher.deregister_message_receiver(TYPE_A);

        dispatcher.receive(&frame(&dispatcher, TYPE_A, b"x")).unwrap();
        assert!(rx.is_empty());
    }

    #[test]
    fn decoded_message_keeps_template_defaults() {
        let dispatcher = MessageDispatcher::new(
            Message::new(AmGroup(0x10), AmAddr(0x0042)).with_dispatch(0x05),
        );
        let (tx, rx) = unbounded();
        dispatcher.register_message_snooper(tx);

        let mut other = Message::new(AmGroup(0x99), AmAddr(0x0999));
        other.set_type(TYPE_A);
        dispatcher.receive(&other.serialize().unwrap()).unwrap();

        let msg = rx.try_recv().unwrap();
        assert_eq!(msg.source(), AmAddr(0x0999));
        assert_eq!(msg.default_source(), AmAddr(0x0042));
        assert_eq!(msg.group(), AmGroup(0x99));
        assert_eq!(dispatcher.dispatch(), 0x05);
        assert_eq!(dispatcher.new_message().dispatch(), 0x05);
    }

    #[test]
    fn stalled_type_consumer_blocks_until_drained() {
        let dispatcher = Arc::new(dispatcher());
        let (tx, rx) = bounded(0);
        dispatcher.register_message_receiver(TYPE_A, tx);
        let wire = frame(&dispatcher, TYPE_A, b"slow");

        let (done_tx, done_rx) = bounded(1);
        let worker = {
            let dispatcher = Arc::clone(&dispatcher);
            thread::spawn(move || {
                let result = dispatcher.receive(&wire);
                done_tx.send(()).unwrap();
                result
            })
        };

        assert!(done_rx.recv_timeout(RETRY_INTERVAL * 5).is_err());

        let msg = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(msg.payload().as_ref(), b"slow");
        done_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        worker.join().unwrap().unwrap();
    }

    #[test]
    fn deregistering_mid_retry_abandons_delivery() {
        let dispatcher = Arc::new(dispatcher());
        let (tx, rx) = bounded(0);
        let (snoop_tx, snoop_rx) = unbounded();
        dispatcher.register_message_receiver(TYPE_A, tx);
        dispatcher.register_message_snooper(snoop_tx);
        let wire = frame(&dispatcher, TYPE_A, b"late");

        let (done_tx, done_rx) = bounded(1);
        let worker = {
            let dispatcher = Arc::clone(&dispatcher);
            thread::spawn(move || {
                let result = dispatcher.receive(&wire);
                done_tx.send(()).unwrap();
                result
            })
        };

        assert!(done_rx.recv_timeout(RETRY_INTERVAL * 3).is_err());
        dispatcher.deregister_message_receiver(TYPE_A);

        done_rx.recv_timeout(RETRY_INTERVAL * 10).unwrap();
        worker.join().unwrap().unwrap();
        assert!(rx.try_recv().is_err());
        // The snooper is still served after the typed branch gives up.
        assert_eq!(snoop_rx.try_recv().unwrap().payload().as_ref(), b"late");
    }

    #[test]
    fn dropped_consumer_does_not_block() {
        let dispatcher = dispatcher();
        let (tx, rx) = bounded(0);
        dispatcher.register_message_receiver(TYPE_A, tx);
        drop(rx);

        assert!(dispatcher.receive(&frame(&dispatcher, TYPE_A, b"")).is_ok());
    }

    #[test]
    fn closed_receiver_still_feeds_snooper() {
        let dispatcher = dispatcher();
        let (tx, rx) = bounded(0);
        dispatcher.register_message_receiver(TYPE_A, tx);
        drop(rx);
        let (snoop_tx, snoop_rx) = unbounded();
        dispatcher.register_message_snooper(snoop_tx);

        dispatcher
            .receive(&frame(&dispatcher, TYPE_A, b"gone"))
            .unwrap();
        assert_eq!(snoop_rx.try_recv().unwrap().payload().as_ref(), b"gone");
    }
}
