use std::borrow::Borrow;
use std::collections::VecDeque;
use std::fmt;
use std::net::UdpSocket;
use std::ops::Deref;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use str0m::change::{SdpAnswer, SdpOffer, SdpPendingOffer};
use str0m::channel::ChannelId;
use str0m::{Candidate, Event, IceConnectionState, Input, Output, Rtc};
use tracing::{debug, info, warn};

use crate::config::SignalConfig;
use crate::error::SignalError;
use crate::model::event::PeerEvent;
use crate::model::session::IceCandidate;
use crate::model::stream::{MediaStream, StreamSet};

/// How long a dead peer may sleep before it is polled again.
const DEAD_PEER_POLL: Duration = Duration::from_secs(1);

/// Application-level key of a peer connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl Deref for PeerId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Borrow<str> for PeerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        PeerId(id.to_string())
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        PeerId(id)
    }
}

/// One negotiated session with a remote party.
#[derive(Debug)]
pub struct Peer {
    pub id: PeerId,
    pub rtc: Rtc,
    pending: Option<PendingOffer>,
    media_negotiated: bool,
    channel: Option<ChannelId>,
    streams: StreamSet,
    queued: VecDeque<PeerEvent>,
}

/// An offer sent and not yet answered, with what it added. Nothing in here
/// counts as negotiated until the answer is accepted.
#[derive(Debug)]
struct PendingOffer {
    pending: SdpPendingOffer,
    adds_media: bool,
    channel: Option<ChannelId>,
}

impl Peer {
    pub fn new(id: PeerId, rtc: Rtc) -> Peer {
        Peer {
            streams: StreamSet::new(id.clone()),
            id,
            rtc,
            pending: None,
            media_negotiated: false,
            channel: None,
            queued: VecDeque::new(),
        }
    }

    /// Adds a local candidate, returning it in signaling form if the ICE
    /// agent kept it.
    pub fn add_local_candidate(&mut self, candidate: Candidate) -> Option<IceCandidate> {
        self.rtc.add_local_candidate(candidate).map(IceCandidate::from)
    }

    pub fn add_remote_candidate(&mut self, candidate: &IceCandidate) -> Result<(), SignalError> {
        if candidate.is_end_of_candidates() {
            debug!("Peer ({}): end of remote candidates", self.id);
            return Ok(());
        }

        let candidate = candidate.to_candidate()?;
        debug!("Peer ({}): remote candidate {}", self.id, candidate.addr());
        self.rtc.add_remote_candidate(candidate);

        Ok(())
    }

    pub fn has_pending_offer(&self) -> bool {
        self.pending.is_some()
    }

    /// Builds an offer from the configured media and data channel.
    ///
    /// Media lines and the channel are added until an answer including them
    /// has been accepted; after that offers carry whatever changes are
    /// outstanding.
    pub fn create_offer(&mut self, config: &SignalConfig) -> Result<SdpOffer, SignalError> {
        if self.pending.is_some() {
            return Err(SignalError::OfferPending(self.id.clone()));
        }

        let mut change = self.rtc.sdp_api();

        let adds_media = !self.media_negotiated && !config.media.is_empty();
        if adds_media {
            for kind in &config.media {
                change.add_media(*kind, config.direction, None, None, None);
            }
        }

        let mut channel = None;
        if let (Some(label), None) = (&config.data_channel, self.channel) {
            let cid = change.add_channel(label.clone());
            debug!("Peer ({}): requested channel '{}' ({:?})", self.id, label, cid);
            channel = Some(cid);
        }

        if !change.has_changes() {
            return Err(SignalError::NothingToNegotiate(self.id.clone()));
        }

        let Some((offer, pending)) = change.apply() else {
            return Err(SignalError::NothingToNegotiate(self.id.clone()));
        };

        self.pending = Some(PendingOffer {
            pending,
            adds_media,
            channel,
        });

        Ok(offer)
    }

    /// Accepts a remote offer. Any local offer still waiting for its answer
    /// is abandoned.
    pub fn accept_offer(&mut self, offer: SdpOffer) -> Result<SdpAnswer, SignalError> {
        if self.pending.take().is_some() {
            info!("Peer ({}): remote offer replaces our pending offer", self.id);
        }

        let answer = self.rtc.sdp_api().accept_offer(offer)?;

        // Whatever we would have offered is now settled by the remote side.
        self.media_negotiated = true;

        Ok(answer)
    }

    pub fn accept_answer(&mut self, answer: SdpAnswer) -> Result<(), SignalError> {
        let Some(offer) = self.pending.take() else {
            return Err(SignalError::NoPendingOffer(self.id.clone()));
        };

        // A rejected answer drops the offer's changes, so they are offered again
        // next time.
        self.rtc.sdp_api().accept_answer(offer.pending, answer)?;

        self.media_negotiated |= offer.adds_media;
        if self.channel.is_none() {
            self.channel = offer.channel;
        }

        Ok(())
    }

    pub fn accepts(&self, input: &Input) -> bool {
        self.rtc.accepts(input)
    }

    pub fn handle_input(&mut self, input: Input) {
        if !self.rtc.is_alive() {
            return;
        }

        if let Err(e) = self.rtc.handle_input(input) {
            warn!("Peer ({}) disconnected: {:?}", self.id, e);
            self.rtc.disconnect();
        }
    }

    pub fn poll_output(&mut self, socket: &UdpSocket) -> PeerEvent {
        if let Some(event) = self.queued.pop_front() {
            return event;
        }

        if !self.rtc.is_alive() {
            // Report the streams of a dead connection once, then idle until
            // the peer is removed.
            let gone = self.streams.take_live();
            if gone.is_empty() {
                return PeerEvent::Timeout(Instant::now() + DEAD_PEER_POLL);
            }
            self.queued
                .extend(gone.into_iter().map(PeerEvent::StreamRemoved));
            return PeerEvent::Noop;
        }

        match self.rtc.poll_output() {
            Ok(output) => self.handle_output(output, socket),
            Err(e) => {
                warn!("Peer ({}) poll_output failed: {:?}", self.id, e);
                self.rtc.disconnect();
                PeerEvent::Noop
            }
        }
    }

    fn handle_output(&mut self, output: Output, socket: &UdpSocket) -> PeerEvent {
        match output {
            Output::Transmit(transmit) => {
                if let Err(e) = socket.send_to(&transmit.contents, transmit.destination) {
                    debug!(
                        "Peer ({}): send to {} failed: {}",
                        self.id, transmit.destination, e
                    );
                }
                PeerEvent::Noop
            }
            Output::Timeout(t) => PeerEvent::Timeout(t),
            Output::Event(e) => match e {
                Event::IceConnectionStateChange(state) => {
                    info!("Peer ({}): ICE state = {:?}", self.id, state);
                    if state == IceConnectionState::Disconnected {
                        // No ICE restart here, the connection is done.
                        self.rtc.disconnect();
                    }
                    PeerEvent::Noop
                }
                Event::Connected => {
                    info!("Peer ({}): connected", self.id);
                    PeerEvent::Noop
                }
                Event::MediaAdded(m) => {
                    debug!("Peer ({}): media added {:?}", self.id, m);
                    self.streams
                        .added(m.mid, m.kind, m.direction)
                        .map_or(PeerEvent::Noop, PeerEvent::StreamAdded)
                }
                Event::MediaChanged(m) => {
                    debug!("Peer ({}): media changed {:?}", self.id, m);
                    self.streams
                        .changed(m.mid, m.direction)
                        .map_or(PeerEvent::Noop, PeerEvent::from)
                }
                Event::ChannelOpen(cid, label) => {
                    info!("Peer ({}): channel '{}' open ({:?})", self.id, label, cid);
                    self.channel = Some(cid);
                    PeerEvent::Noop
                }
                other => {
                    debug!("Peer ({}): event {:?}", self.id, other);
                    PeerEvent::Noop
                }
            },
        }
    }

    /// Disconnects and returns the streams that were still live.
    pub fn close(&mut self) -> Vec<MediaStream> {
        self.rtc.disconnect();
        self.queued.clear();
        self.streams.take_live()
    }
}
