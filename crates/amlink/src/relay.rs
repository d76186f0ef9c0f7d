//! Bidirectional relay between a server connection and its sources.
//!
//! Every connection gets a catch-all dispatcher feeding its side's intake
//! channel, so every frame a side decodes, whatever its dispatch byte or
//! connection, lands in the same queue. One loop selects over both intakes and
//! sends each packet out of every connection on the opposite side.

use std::sync::Arc;

use amlink_dispatch::PacketDispatcher;
use amlink_frame::{Packet, RawPacketFactory};
use amlink_transport::{open, Connection, LinkMode};
use crossbeam_channel::{bounded, never, select, Receiver};
use tracing::{info, warn};

use crate::config::RelayConfig;
use crate::error::Result;

/// Per-direction forwarding counters, returned when the relay stops.
///
/// Counts are per send: a packet fanned out to two sources counts twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub server_to_client: u64,
    pub client_to_server: u64,
    /// Sends the receiving side refused.
    pub failed: u64,
}

/// A connection and how the relay brings it up.
#[derive(Clone)]
pub struct Link {
    pub connection: Arc<dyn Connection>,
    pub mode: LinkMode,
}

impl Link {
    pub fn new(connection: Arc<dyn Connection>, mode: LinkMode) -> Self {
        Self { connection, mode }
    }
}

struct Side {
    label: &'static str,
    links: Vec<Link>,
    intake: Receiver<Arc<dyn Packet>>,
}

impl Side {
    /// Every link of the side feeds the same intake.
    fn install(label: &'static str, links: Vec<Link>, capacity: usize) -> Self {
        let (tx, intake) = bounded(capacity);
        for link in &links {
            let dispatcher = Arc::new(PacketDispatcher::new(RawPacketFactory::default()));
            dispatcher.register_receiver(tx.clone());
            link.connection.set_default_dispatcher(dispatcher);
        }
        Self {
            label,
            links,
            intake,
        }
    }

    /// Send `packet` out of every link. Returns (sent, failed).
    fn forward(&self, packet: &dyn Packet) -> (u64, u64) {
        let mut sent = 0;
        let mut failed = 0;
        for link in &self.links {
            match link.connection.send(packet) {
                Ok(()) => sent += 1,
                Err(err) => {
                    failed += 1;
                    warn!(to = link.connection.name(), %err, "forward failed");
                }
            }
        }
        (sent, failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    ServerToClient,
    ClientToServer,
}

enum Event {
    Packet(Direction, Option<Arc<dyn Packet>>),
    Shutdown,
}

/// Forwards everything decoded on the server side to every source, and
/// everything decoded on any source to the server side.
pub struct Relay {
    server: Side,
    client: Side,
}

impl Relay {
    /// Wire up the server and its sources with unbuffered intakes.
    pub fn new(server: Link, sources: Vec<Link>) -> Self {
        Self::with_capacity(server, sources, 0)
    }

    /// Wire up the server and its sources with `capacity` buffered packets
    /// per intake.
    pub fn with_capacity(server: Link, sources: Vec<Link>, capacity: usize) -> Self {
        Self {
            server: Side::install("S", vec![server], capacity),
            client: Side::install("C", sources, capacity),
        }
    }

    /// Open every connection described by `config`. Nothing is started yet.
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let server = Link::new(
            open(&config.server.spec, config.sf.clone())?,
            config.server.mode,
        );
        let sources = config
            .sources
            .iter()
            .map(|source| Ok(Link::new(open(&source.spec, config.sf.clone())?, source.mode)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::with_capacity(server, sources, config.intake_capacity))
    }

    /// Start all links and forward packets until `shutdown` fires.
    ///
    /// A message on `shutdown`, or all its senders dropping, ends the loop
    /// between two forwards. Every connection is then disconnected exactly
    /// once. Packets still queued in either intake are not forwarded.
    pub fn run(self, shutdown: &Receiver<()>) -> Result<RelayStats> {
        if let Err(err) = self.start() {
            self.disconnect();
            return Err(err);
        }

        let mut stats = RelayStats::default();
        let mut server_rx = self.server.intake.clone();
        let mut client_rx = self.client.intake.clone();

        loop {
            let event = select! {
                recv(server_rx) -> packet => Event::Packet(Direction::ServerToClient, packet.ok()),
                recv(client_rx) -> packet => Event::Packet(Direction::ClientToServer, packet.ok()),
                recv(shutdown) -> _ => Event::Shutdown,
            };

            match event {
                Event::Packet(direction, Some(packet)) => {
                    let (from, to) = self.route(direction);
                    info!("{} d:{:02X} p:{}", from.label, packet.dispatch(), packet);
                    let (sent, failed) = to.forward(packet.as_ref());
                    match direction {
                        Direction::ServerToClient => stats.server_to_client += sent,
                        Direction::ClientToServer => stats.client_to_server += sent,
                    }
                    stats.failed += failed;
                }
                Event::Packet(direction, None) => {
                    let (from, _) = self.route(direction);
                    warn!(side = from.label, "intake closed");
                    match direction {
                        Direction::ServerToClient => server_rx = never(),
                        Direction::ClientToServer => client_rx = never(),
                    }
                }
                Event::Shutdown => break,
            }
        }

        info!(?stats, "relay stopping");
        self.disconnect();
        Ok(stats)
    }

    fn links(&self) -> impl Iterator<Item = (&'static str, &Link)> {
        [&self.server, &self.client]
            .into_iter()
            .flat_map(|side| side.links.iter().map(move |link| (side.label, link)))
    }

    fn start(&self) -> Result<()> {
        for (side, link) in self.links() {
            info!(side, conn = link.connection.name(), mode = %link.mode, "starting");
            link.mode.start(link.connection.as_ref())?;
        }
        Ok(())
    }

    fn disconnect(&self) {
        for (_, link) in self.links() {
            link.connection.disconnect();
        }
    }

    fn route(&self, direction: Direction) -> (&Side, &Side) {
        match direction {
            Direction::ServerToClient => (&self.server, &self.client),
            Direction::ClientToServer => (&self.client, &self.server),
        }
    }
}
