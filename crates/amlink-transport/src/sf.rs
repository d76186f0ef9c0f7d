use std::io::ErrorKind;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use amlink_dispatch::{DispatchError, DispatchTable, Dispatcher};
use amlink_frame::Packet;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use tracing::{debug, info, warn};

use crate::codec::{handshake, MAX_FRAME_LEN};
use crate::error::{Result, TransportError};
use crate::reader::SfReader;
use crate::traits::Connection;
use crate::writer::SfWriter;

/// Serial-forwarder connection tuning.
#[derive(Debug, Clone)]
pub struct SfConfig {
    /// Upper bound on a single dial attempt.
    pub connect_timeout: Duration,
    /// Upper bound on the banner exchange.
    pub handshake_timeout: Duration,
    /// Upper bound on writing one frame to a peer. A peer that stops reading
    /// is dropped once this expires.
    pub write_timeout: Duration,
    /// How often the accept loop checks for shutdown.
    pub accept_poll: Duration,
}

impl Default for SfConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
            accept_poll: Duration::from_millis(100),
        }
    }
}

/// Serial forwarder over TCP, as a listening server or a redialling client.
///
/// In listen mode any number of peers may connect; `send` writes to all of
/// them. Each peer gets its own reader thread which routes inbound frames
/// through the dispatch table.
pub struct SfConnection {
    shared: Arc<Shared>,
}

struct Shared {
    name: String,
    addr: String,
    config: SfConfig,
    table: DispatchTable,
    peers: Mutex<Vec<Arc<Peer>>>,
    next_peer_id: AtomicU64,
    local_addr: Mutex<Option<SocketAddr>>,
    stop_tx: Mutex<Option<Sender<()>>>,
    stop_rx: Receiver<()>,
}

struct Peer {
    id: u64,
    remote: SocketAddr,
    /// Handle for shutting the socket down while a write may be in progress.
    stream: TcpStream,
    writer: Mutex<SfWriter<TcpStream>>,
}

impl Peer {
    fn close(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

impl SfConnection {
    /// Connection to `host:port` with default configuration.
    pub fn new(host: &str, port: u16) -> Self {
        Self::with_config(host, port, SfConfig::default())
    }

    pub fn with_config(host: &str, port: u16, config: SfConfig) -> Self {
        let (stop_tx, stop_rx) = bounded(0);
        let addr = format!("{host}:{port}");
        Self {
            shared: Arc::new(Shared {
                name: format!("sf@{addr}"),
                addr,
                config,
                table: DispatchTable::new(),
                peers: Mutex::new(Vec::new()),
                next_peer_id: AtomicU64::new(1),
                local_addr: Mutex::new(None),
                stop_tx: Mutex::new(Some(stop_tx)),
                stop_rx,
            }),
        }
    }

    /// Bound address once [`listen`](Connection::listen) succeeded.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *lock(&self.shared.local_addr)
    }

    /// Number of peers with an established stream.
    pub fn peer_count(&self) -> usize {
        lock(&self.shared.peers).len()
    }

    /// The dispatch table inbound frames are routed through.
    pub fn dispatch_table(&self) -> &DispatchTable {
        &self.shared.table
    }
}

impl Connection for SfConnection {
    fn send(&self, packet: &dyn Packet) -> Result<()> {
        let frame = packet.serialize()?;
        if frame.len() > MAX_FRAME_LEN {
            return Err(TransportError::FrameTooLong {
                len: frame.len(),
                max: MAX_FRAME_LEN,
            });
        }
        let peers = lock(&self.shared.peers).clone();
        if peers.is_empty() {
            return Err(TransportError::NotConnected(self.shared.name.clone()));
        }

        // Only the peer's own writer is locked while writing.
        let mut last_err = None;
        let mut delivered = 0usize;
        for peer in &peers {
            match lock(&peer.writer).send(&frame) {
                Ok(()) => delivered += 1,
                Err(err) => {
                    warn!(
                        conn = %self.shared.name,
                        peer = %peer.remote,
                        %err,
                        "send failed, dropping peer"
                    );
                    self.shared.remove_peer(peer.id);
                    last_err = Some(err);
                }
            }
        }

        match last_err {
            Some(err) if delivered == 0 => Err(err),
            _ => Ok(()),
        }
    }

    fn add_dispatcher(&self, dispatcher: Arc<dyn Dispatcher>) {
        self.shared.table.add(dispatcher);
    }

    fn set_default_dispatcher(&self, dispatcher: Arc<dyn Dispatcher>) {
        self.shared.table.set_default(dispatcher);
    }

    fn listen(&self) -> Result<()> {
        let shared = &self.shared;
        if shared.is_stopped() {
            return Err(TransportError::Shutdown);
        }
        let listener = TcpListener::bind(&shared.addr).map_err(|source| TransportError::Bind {
            addr: shared.addr.clone(),
            source,
        })?;
        listener.set_nonblocking(true)?;
        let local = listener.local_addr()?;
        *lock(&shared.local_addr) = Some(local);
        info!(conn = %shared.name, %local, "listening");

        let shared = Arc::clone(shared);
        thread::Builder::new()
            .name("sf-accept".into())
            .spawn(move || shared.accept_loop(listener))?;
        Ok(())
    }

    fn autoconnect(&self, period: Duration) {
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("sf-connect".into())
            .spawn(move || shared.connect_loop(period));
        if let Err(err) = spawned {
            warn!(conn = %self.shared.name, %err, "failed to start connect thread");
        }
    }

    fn disconnect(&self) {
        let shared = &self.shared;
        lock(&shared.stop_tx).take();
        let peers: Vec<Arc<Peer>> = lock(&shared.peers).drain(..).collect();
        for peer in peers {
            debug!(conn = %shared.name, peer = %peer.remote, "closing peer");
            peer.close();
        }
        info!(conn = %shared.name, "disconnected");
    }

    fn name(&self) -> &str {
        &self.shared.name
    }
}

impl Drop for SfConnection {
    fn drop(&mut self) {
        if !self.shared.is_stopped() {
            self.disconnect();
        }
    }
}

impl Shared {
    fn is_stopped(&self) -> bool {
        matches!(self.stop_rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Sleep up to `period`; false once the connection is shut down.
    fn wait(&self, period: Duration) -> bool {
        !matches!(
            self.stop_rx.recv_timeout(period),
            Err(RecvTimeoutError::Disconnected)
        )
    }

    fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            match listener.accept() {
                Ok((stream, remote)) => {
                    let shared = Arc::clone(&self);
                    let spawned = thread::Builder::new()
                        .name("sf-peer".into())
                        .spawn(move || shared.serve(stream, remote));
                    if let Err(err) = spawned {
                        warn!(conn = %self.name, %err, "failed to start peer thread");
                    }
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {}
                Err(err) => warn!(conn = %self.name, %err, "accept failed"),
            }
            if !self.wait(self.config.accept_poll) {
                break;
            }
        }
        debug!(conn = %self.name, "accept loop stopped");
    }

    fn connect_loop(self: Arc<Self>, period: Duration) {
        while !self.is_stopped() {
            match self.dial() {
                Ok((stream, remote)) => self.serve(stream, remote),
                Err(err) => warn!(conn = %self.name, %err, "connect failed"),
            }
            if !self.wait(period) {
                break;
            }
            debug!(conn = %self.name, "reconnecting");
        }
        debug!(conn = %self.name, "connect loop stopped");
    }

    fn dial(&self) -> Result<(TcpStream, SocketAddr)> {
        let connect_err = |source| TransportError::Connect {
            addr: self.addr.clone(),
            source,
        };
        let mut last_err = None;
        for remote in self.addr.to_socket_addrs().map_err(connect_err)? {
            match TcpStream::connect_timeout(&remote, self.config.connect_timeout) {
                Ok(stream) => return Ok((stream, remote)),
                Err(err) => last_err = Some(err),
            }
        }
        Err(connect_err(last_err.unwrap_or_else(|| {
            std::io::Error::new(ErrorKind::NotFound, "address resolved to nothing")
        })))
    }

    /// Handshake, register the peer, and read frames until the stream ends.
    fn serve(&self, mut stream: TcpStream, remote: SocketAddr) {
        let id = self.next_peer_id.fetch_add(1, Ordering::Relaxed);
        let reader = match self.open_peer(&mut stream) {
            Ok(reader) => reader,
            Err(err) => {
                warn!(conn = %self.name, peer = %remote, %err, "handshake failed");
                let _ = stream.shutdown(Shutdown::Both);
                return;
            }
        };

        if !self.register(id, remote, stream) {
            debug!(conn = %self.name, peer = %remote, "connection shut down, peer refused");
            return;
        }
        info!(conn = %self.name, peer = %remote, "peer connected");

        self.read_loop(reader, remote);

        self.remove_peer(id);
        info!(conn = %self.name, peer = %remote, "peer disconnected");
    }

    /// Add a peer unless the connection is shut down. The stop check runs
    /// under the peer lock so `disconnect` cannot miss the new peer.
    fn register(&self, id: u64, remote: SocketAddr, stream: TcpStream) -> bool {
        let mut peers = lock(&self.peers);
        let handle = match stream.try_clone() {
            Ok(handle) if !self.is_stopped() => handle,
            _ => {
                let _ = stream.shutdown(Shutdown::Both);
                return false;
            }
        };
        peers.push(Arc::new(Peer {
            id,
            remote,
            stream: handle,
            writer: Mutex::new(SfWriter::new(stream)),
        }));
        true
    }

    fn remove_peer(&self, id: u64) {
        let removed = {
            let mut peers = lock(&self.peers);
            peers
                .iter()
                .position(|peer| peer.id == id)
                .map(|pos| peers.remove(pos))
        };
        if let Some(peer) = removed {
            peer.close();
        }
    }

    fn open_peer(&self, stream: &mut TcpStream) -> Result<SfReader<TcpStream>> {
        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(self.config.handshake_timeout))?;
        stream.set_write_timeout(Some(self.config.handshake_timeout))?;
        handshake(stream)?;
        stream.set_read_timeout(None)?;
        stream.set_write_timeout(Some(self.config.write_timeout))?;
        Ok(SfReader::new(stream.try_clone()?))
    }

    fn read_loop(&self, mut reader: SfReader<TcpStream>, remote: SocketAddr) {
        loop {
            let frame = match reader.read_frame() {
                Ok(frame) => frame,
                Err(TransportError::ConnectionClosed) => return,
                Err(err) => {
                    if !self.is_stopped() {
                        warn!(conn = %self.name, peer = %remote, %err, "read failed");
                    }
                    return;
                }
            };

            match self.table.route(&frame) {
                Ok(()) => {}
                Err(DispatchError::NoDispatcher(dispatch)) => {
                    debug!(conn = %self.name, "no dispatcher for {dispatch:02X}, frame dropped");
                }
                Err(err) => warn!(conn = %self.name, %err, "frame dropped"),
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
