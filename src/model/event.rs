//! Output of polling a single peer
//!
//! The registry polls each peer until it yields a timeout and dispatches the
//! stream events to the delegate in between.

use std::time::Instant;

use crate::model::stream::{MediaStream, StreamChange};

/// What one poll of a peer produced.
#[derive(Debug)]
pub enum PeerEvent {
    /// Nothing for the delegate.
    Noop,

    /// The peer has no more output until this instant.
    Timeout(Instant),

    /// A stream started receiving.
    StreamAdded(MediaStream),

    /// A stream stopped receiving.
    StreamRemoved(MediaStream),
}

impl From<StreamChange> for PeerEvent {
    fn from(change: StreamChange) -> Self {
        match change {
            StreamChange::Added(s) => PeerEvent::StreamAdded(s),
            StreamChange::Removed(s) => PeerEvent::StreamRemoved(s),
        }
    }
}
