//! The capability the registry reports to.

use std::sync::{Arc, Weak};

use tracing::debug;

use crate::model::{
    peer::PeerId,
    session::{IceCandidate, SessionDescription},
    stream::MediaStream,
};

/// Carries signals to remote peers over some external channel and hears
/// about streams coming and going.
///
/// Calls arrive on the thread that drives the registry. Implementations must
/// not block on that same registry.
pub trait SignalDelegate: Send + Sync {
    fn send_offer(&self, peer_id: &PeerId, offer: &SessionDescription);

    fn send_answer(&self, peer_id: &PeerId, answer: &SessionDescription);

    fn send_candidate(&self, peer_id: &PeerId, candidate: &IceCandidate);

    fn stream_added(&self, stream: &MediaStream);

    fn stream_removed(&self, stream: &MediaStream);
}

/// Non-owning handle to a delegate. Calls on a dropped delegate are no-ops.
#[derive(Clone)]
pub(crate) struct DelegateRef(Weak<dyn SignalDelegate>);

impl DelegateRef {
    pub(crate) fn new<D: SignalDelegate + 'static>(delegate: &Arc<D>) -> Self {
        let weak: Weak<D> = Arc::downgrade(delegate);
        DelegateRef(weak)
    }

    pub(crate) fn notify(&self, what: &str, f: impl FnOnce(&dyn SignalDelegate)) {
        match self.0.upgrade() {
            Some(delegate) => f(delegate.as_ref()),
            None => debug!("Delegate gone, dropping {}", what),
        }
    }
}
