//! A delegate that queues outgoing signals until someone collects them.
//!
//! The HTTP signaling endpoint drains a peer's queue into the response of
//! the request that caused it; the `peer` CLI drains it before each post.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::info;

use crate::delegate::SignalDelegate;
use crate::model::{
    peer::PeerId,
    session::{IceCandidate, SessionDescription, SignalMessage},
    stream::{MediaStream, StreamChange},
};

#[derive(Debug)]
pub struct Mailbox {
    outbox: Mutex<HashMap<PeerId, Vec<SignalMessage>>>,
    streams: Mutex<Vec<StreamChange>>,
    record_streams: bool,
}

impl Default for Mailbox {
    fn default() -> Self {
        Self {
            outbox: Mutex::default(),
            streams: Mutex::default(),
            record_streams: true,
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Mailbox {
    /// A mailbox that only logs stream notices, for callers that never
    /// call [`Mailbox::drain_streams`].
    pub fn signals_only() -> Self {
        Self {
            record_streams: false,
            ..Self::default()
        }
    }

    /// Takes every signal queued for `peer_id`, oldest first.
    pub fn drain(&self, peer_id: &str) -> Vec<SignalMessage> {
        lock(&self.outbox).remove(peer_id).unwrap_or_default()
    }

    /// Takes every stream notice recorded so far, oldest first.
    pub fn drain_streams(&self) -> Vec<StreamChange> {
        std::mem::take(&mut *lock(&self.streams))
    }

    fn record(&self, change: StreamChange) {
        if self.record_streams {
            lock(&self.streams).push(change);
        }
    }

    fn push(&self, peer_id: &PeerId, message: SignalMessage) {
        lock(&self.outbox)
            .entry(peer_id.clone())
            .or_default()
            .push(message);
    }
}

impl SignalDelegate for Mailbox {
    fn send_offer(&self, peer_id: &PeerId, offer: &SessionDescription) {
        self.push(peer_id, SignalMessage::Offer(offer.clone()));
    }

    fn send_answer(&self, peer_id: &PeerId, answer: &SessionDescription) {
        self.push(peer_id, SignalMessage::Answer(answer.clone()));
    }

    fn send_candidate(&self, peer_id: &PeerId, candidate: &IceCandidate) {
        self.push(peer_id, SignalMessage::Candidate(candidate.clone()));
    }

    fn stream_added(&self, stream: &MediaStream) {
        info!("Stream added: {} {:?} ({})", stream.peer_id, stream.kind, stream.mid);
        self.record(StreamChange::Added(stream.clone()));
    }

    fn stream_removed(&self, stream: &MediaStream) {
        info!("Stream removed: {} {:?} ({})", stream.peer_id, stream.kind, stream.mid);
        self.record(StreamChange::Removed(stream.clone()));
    }
}
