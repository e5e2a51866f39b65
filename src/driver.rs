//! Runs a [`PeerRegistry`] on its own thread
//!
//! The driver thread owns the UDP socket and every str0m instance. Host
//! code talks to it through a cloneable [`SignalHandle`]; each call is a
//! request/response over a bounded channel, so registry errors come back to
//! the caller as ordinary `Result`s.

use std::{
    io::ErrorKind,
    net::{SocketAddr, UdpSocket},
    sync::{
        mpsc::{self, Receiver, SyncSender, TryRecvError},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use str0m::{
    net::{Protocol, Receive},
    Input,
};
use tracing::{debug, info, warn};

use crate::config::SignalConfig;
use crate::delegate::SignalDelegate;
use crate::error::SignalError;
use crate::model::{
    peer::PeerId,
    session::{IceCandidate, SessionDescription},
};
use crate::registry::PeerRegistry;
use crate::util::get_candidates;

type Reply<T> = SyncSender<Result<T, SignalError>>;

enum Command {
    AddConnection(PeerId, Reply<()>),
    RemoveConnection(PeerId, Reply<bool>),
    CreateOffer(PeerId, Reply<()>),
    SetRemoteDescription(SessionDescription, PeerId, bool, Reply<()>),
    AddIceCandidate(IceCandidate, PeerId, Reply<()>),
    Shutdown,
}

/// Cloneable access to a running driver.
#[derive(Clone)]
pub struct SignalHandle {
    tx: SyncSender<Command>,
    local_addr: SocketAddr,
}

impl SignalHandle {
    /// Binds `config.bind_addr`, gathers host candidates and starts the
    /// driver thread. Only a weak reference to `delegate` is kept.
    pub fn spawn<D: SignalDelegate + 'static>(
        config: SignalConfig,
        delegate: &Arc<D>,
    ) -> Result<SignalHandle, SignalError> {
        let socket = UdpSocket::bind(config.bind_addr)?;
        let local_addr = socket.local_addr()?;
        info!("Bound UDP port: {}", local_addr);

        let candidates = get_candidates(local_addr)?;
        for c in &candidates {
            info!("Local candidate: {}", c.addr());
        }

        let registry = PeerRegistry::new(config, candidates, delegate);
        let (tx, rx) = mpsc::sync_channel(16);

        thread::Builder::new()
            .name("rtc-signal".into())
            .spawn(move || run(socket, registry, rx))?;

        Ok(SignalHandle { tx, local_addr })
    }

    /// The address of the driver's UDP socket.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn add_connection(&self, peer_id: impl Into<PeerId>) -> Result<(), SignalError> {
        let peer_id = peer_id.into();
        self.request(|reply| Command::AddConnection(peer_id, reply))
    }

    pub fn remove_connection(&self, peer_id: impl Into<PeerId>) -> Result<bool, SignalError> {
        let peer_id = peer_id.into();
        self.request(|reply| Command::RemoveConnection(peer_id, reply))
    }

    pub fn create_offer(&self, peer_id: impl Into<PeerId>) -> Result<(), SignalError> {
        let peer_id = peer_id.into();
        self.request(|reply| Command::CreateOffer(peer_id, reply))
    }

    pub fn set_remote_description(
        &self,
        description: SessionDescription,
        peer_id: impl Into<PeerId>,
        receiver: bool,
    ) -> Result<(), SignalError> {
        let peer_id = peer_id.into();
        self.request(|reply| Command::SetRemoteDescription(description, peer_id, receiver, reply))
    }

    pub fn add_ice_candidate(
        &self,
        candidate: IceCandidate,
        peer_id: impl Into<PeerId>,
    ) -> Result<(), SignalError> {
        let peer_id = peer_id.into();
        self.request(|reply| Command::AddIceCandidate(candidate, peer_id, reply))
    }

    /// Stops the driver and closes every connection. Other clones of this
    /// handle get [`SignalError::DriverStopped`] from then on.
    pub fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown);
    }

    fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T, SignalError> {
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        self.tx
            .send(command(reply_tx))
            .map_err(|_| SignalError::DriverStopped)?;
        reply_rx.recv().map_err(|_| SignalError::DriverStopped)?
    }
}

fn run(socket: UdpSocket, mut registry: PeerRegistry, rx: Receiver<Command>) {
    let mut buf = vec![0; 2000];

    let local_addr = match socket.local_addr() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Driver has no local address: {}", e);
            return;
        }
    };

    loop {
        // Commands from the handles
        if !drain_commands(&rx, &mut registry) {
            break;
        }

        // Poll peers until they return timeout
        let timeout = registry.poll(&socket);

        // The read timeout is not allowed to be 0. In case it is 0, we set 1 millisecond.
        let duration = timeout
            .saturating_duration_since(Instant::now())
            .max(Duration::from_millis(1));

        if let Err(e) = socket.set_read_timeout(Some(duration)) {
            warn!("Setting socket read timeout failed: {}", e);
            break;
        }

        if let Some(input) = read_socket_input(&socket, local_addr, &mut buf) {
            registry.handle_receive(input);
        }

        // Drive time forward in all peers.
        registry.handle_timeout(Instant::now());
    }

    registry.close_all();
    info!("Driver on {} stopped", local_addr);
}

/// Applies every queued command.
///
/// # Returns
///
/// * `false` - If the driver should stop
fn drain_commands(rx: &Receiver<Command>, registry: &mut PeerRegistry) -> bool {
    loop {
        let command = match rx.try_recv() {
            Ok(command) => command,
            Err(TryRecvError::Empty) => return true,
            Err(TryRecvError::Disconnected) => {
                debug!("All handles dropped");
                return false;
            }
        };

        // A caller that gave up waiting is not an error here.
        match command {
            Command::AddConnection(id, reply) => {
                let _ = reply.send(registry.add_connection(id));
            }
            Command::RemoveConnection(id, reply) => {
                let _ = reply.send(Ok(registry.remove_connection(&id)));
            }
            Command::CreateOffer(id, reply) => {
                let _ = reply.send(registry.create_offer(&id));
            }
            Command::SetRemoteDescription(desc, id, receiver, reply) => {
                let _ = reply.send(registry.set_remote_description(&desc, &id, receiver));
            }
            Command::AddIceCandidate(candidate, id, reply) => {
                let _ = reply.send(registry.add_ice_candidate(&candidate, &id));
            }
            Command::Shutdown => return false,
        }
    }
}

fn read_socket_input<'a>(
    socket: &UdpSocket,
    local_addr: SocketAddr,
    buf: &'a mut Vec<u8>,
) -> Option<Input<'a>> {
    buf.resize(2000, 0);

    match socket.recv_from(buf) {
        Ok((n, source)) => {
            buf.truncate(n);

            // Parse data to a DatagramRecv, which help preparse network data to
            // figure out the multiplexing of all protocols on one UDP port.
            let Ok(contents) = buf.as_slice().try_into() else {
                return None;
            };

            Some(Input::Receive(
                Instant::now(),
                Receive {
                    proto: Protocol::Udp,
                    source,
                    destination: local_addr,
                    contents,
                },
            ))
        }

        Err(e) => match e.kind() {
            // Expected error for set_read_timeout(). One for windows, one for the rest.
            ErrorKind::WouldBlock | ErrorKind::TimedOut => None,
            _ => {
                warn!("UdpSocket read failed: {:?}", e);
                None
            }
        },
    }
}
