//! The peer connection registry
//!
//! [`PeerRegistry`] owns one [`str0m::Rtc`] per peer id and reports
//! everything the remote side needs to hear to a [`SignalDelegate`]. It does
//! no I/O of its own apart from transmitting on the socket handed to
//! [`PeerRegistry::poll`]; [`crate::driver`] runs it on a thread.

use std::collections::HashMap;
use std::net::UdpSocket;
use std::sync::Arc;
use std::time::Instant;

use str0m::{Candidate, Input};
use tracing::{debug, info};

use crate::config::SignalConfig;
use crate::delegate::{DelegateRef, SignalDelegate};
use crate::error::SignalError;
use crate::model::{
    event::PeerEvent,
    peer::{Peer, PeerId},
    session::{IceCandidate, SdpType, SessionDescription},
    stream::MediaStream,
};

pub struct PeerRegistry {
    config: SignalConfig,
    local_candidates: Vec<Candidate>,
    peers: HashMap<PeerId, Peer>,
    delegate: DelegateRef,
}

impl PeerRegistry {
    /// Creates an empty registry.
    ///
    /// Only a weak reference to `delegate` is kept. Every new connection
    /// advertises `local_candidates`.
    pub fn new<D: SignalDelegate + 'static>(
        config: SignalConfig,
        local_candidates: Vec<Candidate>,
        delegate: &Arc<D>,
    ) -> Self {
        Self {
            config,
            local_candidates,
            peers: HashMap::new(),
            delegate: DelegateRef::new(delegate),
        }
    }

    pub fn contains(&self, peer_id: &str) -> bool {
        self.peers.contains_key(peer_id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn peer_ids(&self) -> impl Iterator<Item = &PeerId> {
        self.peers.keys()
    }

    /// Creates a connection for `peer_id` and sends it our local candidates.
    pub fn add_connection(&mut self, peer_id: impl Into<PeerId>) -> Result<(), SignalError> {
        let peer_id = peer_id.into();
        if self.peers.contains_key(&peer_id) {
            return Err(SignalError::DuplicatePeer(peer_id));
        }

        let mut peer = Peer::new(peer_id.clone(), self.config.rtc_config().build());

        for candidate in &self.local_candidates {
            match peer.add_local_candidate(candidate.clone()) {
                Some(c) => self
                    .delegate
                    .notify("candidate", |d| d.send_candidate(&peer_id, &c)),
                None => debug!("Peer ({}): local candidate {} not used", peer_id, candidate.addr()),
            }
        }

        info!("Peer ({}): connection added", peer_id);
        self.peers.insert(peer_id, peer);

        Ok(())
    }

    /// Tears down the connection for `peer_id`.
    ///
    /// # Returns
    ///
    /// * `true` - If a connection was registered and is now gone
    /// * `false` - If `peer_id` was unknown
    pub fn remove_connection(&mut self, peer_id: &str) -> bool {
        let Some(mut peer) = self.peers.remove(peer_id) else {
            debug!("Peer ({}): nothing to remove", peer_id);
            return false;
        };

        for stream in peer.close() {
            self.stream_removed(&stream);
        }

        info!("Peer ({}): connection removed", peer_id);
        true
    }

    /// Creates an offer for `peer_id` and hands it to the delegate.
    pub fn create_offer(&mut self, peer_id: &str) -> Result<(), SignalError> {
        let peer = Self::peer_mut(&mut self.peers, peer_id)?;
        let offer = peer.create_offer(&self.config)?;
        let offer = SessionDescription::from(&offer);

        debug!("Peer ({}): offer SDP:\n{}", peer_id, offer.sdp);
        self.delegate
            .notify("offer", |d| d.send_offer(&peer.id, &offer));

        Ok(())
    }

    /// Applies a remote description.
    ///
    /// With `receiver` set the description must be an offer, and the answer
    /// goes to the delegate. Otherwise it must be the answer to our pending
    /// offer.
    pub fn set_remote_description(
        &mut self,
        description: &SessionDescription,
        peer_id: &str,
        receiver: bool,
    ) -> Result<(), SignalError> {
        let peer = Self::peer_mut(&mut self.peers, peer_id)?;

        let expected = if receiver {
            SdpType::Offer
        } else {
            SdpType::Answer
        };
        if description.kind != expected {
            return Err(SignalError::UnexpectedDescription {
                peer: peer.id.clone(),
                expected,
                actual: description.kind,
            });
        }

        if receiver {
            let answer = peer.accept_offer(description.to_offer()?)?;
            let answer = SessionDescription::from(&answer);

            debug!("Peer ({}): answer SDP:\n{}", peer_id, answer.sdp);
            self.delegate
                .notify("answer", |d| d.send_answer(&peer.id, &answer));
        } else {
            if !peer.has_pending_offer() {
                return Err(SignalError::NoPendingOffer(peer.id.clone()));
            }
            peer.accept_answer(description.to_answer()?)?;
            info!("Peer ({}): answer accepted", peer_id);
        }

        Ok(())
    }

    /// Feeds a remote candidate to the connection for `peer_id`.
    pub fn add_ice_candidate(
        &mut self,
        candidate: &IceCandidate,
        peer_id: &str,
    ) -> Result<(), SignalError> {
        Self::peer_mut(&mut self.peers, peer_id)?.add_remote_candidate(candidate)
    }

    /// Polls every peer until it returns a timeout, transmitting on `socket`
    /// and dispatching stream events on the way.
    ///
    /// # Returns
    ///
    /// The earliest instant any peer wants to be woken, capped by
    /// `max_poll_interval`.
    pub fn poll(&mut self, socket: &UdpSocket) -> Instant {
        let mut timeout = Instant::now() + self.config.max_poll_interval;
        let mut events = vec![];

        for peer in self.peers.values_mut() {
            let t = poll_until_timeout(peer, &mut events, socket);
            timeout = timeout.min(t);
        }

        for event in events {
            match event {
                PeerEvent::StreamAdded(stream) => self.stream_added(&stream),
                PeerEvent::StreamRemoved(stream) => self.stream_removed(&stream),
                PeerEvent::Noop | PeerEvent::Timeout(_) => {}
            }
        }

        timeout
    }

    /// Hands a received datagram to the peer it belongs to.
    pub fn handle_receive(&mut self, input: Input) -> bool {
        // rtc.accepts() is how the incoming packet is demultiplexed to the
        // Rtc instance the traffic belongs to.
        match self.peers.values_mut().find(|p| p.accepts(&input)) {
            Some(peer) => {
                peer.handle_input(input);
                true
            }
            None => {
                // Common when the remote sends STUN before its peer is added.
                debug!("No peer accepts UDP input: {:?}", input);
                false
            }
        }
    }

    /// Drives time forward in all peers.
    pub fn handle_timeout(&mut self, now: Instant) {
        for peer in self.peers.values_mut() {
            peer.handle_input(Input::Timeout(now));
        }
    }

    /// Removes every connection.
    pub fn close_all(&mut self) {
        let ids: Vec<PeerId> = self.peers.keys().cloned().collect();
        for id in ids {
            self.remove_connection(&id);
        }
    }

    fn peer_mut<'a>(
        peers: &'a mut HashMap<PeerId, Peer>,
        peer_id: &str,
    ) -> Result<&'a mut Peer, SignalError> {
        peers
            .get_mut(peer_id)
            .ok_or_else(|| SignalError::UnknownPeer(PeerId::from(peer_id)))
    }

    fn stream_added(&self, stream: &MediaStream) {
        self.delegate
            .notify("stream added", |d| d.stream_added(stream));
    }

    fn stream_removed(&self, stream: &MediaStream) {
        self.delegate
            .notify("stream removed", |d| d.stream_removed(stream));
    }
}

/// Poll all the output from the peer until it returns a timeout.
/// Collect stream events in the queue, return the timeout.
fn poll_until_timeout(peer: &mut Peer, queue: &mut Vec<PeerEvent>, socket: &UdpSocket) -> Instant {
    loop {
        match peer.poll_output(socket) {
            PeerEvent::Timeout(t) => return t,
            PeerEvent::Noop => {}
            event => queue.push(event),
        }
    }
}
