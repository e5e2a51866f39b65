//! Media stream tracking
//!
//! A [`MediaStream`] is reported for every negotiated m-line on which the
//! local side receives media. [`StreamSet`] keeps the per-peer bookkeeping
//! so each stream is announced and retracted exactly once.

use str0m::media::{Direction, MediaKind, Mid};

use crate::model::peer::PeerId;

/// An incoming audio or video stream on a peer connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaStream {
    /// The peer the stream arrives from
    pub peer_id: PeerId,
    /// The media ID (Mid) of the m-line carrying the stream
    pub mid: Mid,
    /// The kind of media (audio or video)
    pub kind: MediaKind,
}

#[derive(Debug)]
struct StreamEntry {
    mid: Mid,
    kind: MediaKind,
    receiving: bool,
}

/// Streams known for one peer, live or not.
#[derive(Debug)]
pub struct StreamSet {
    peer_id: PeerId,
    entries: Vec<StreamEntry>,
}

/// The local side receives on these directions.
fn is_receiving(direction: Direction) -> bool {
    matches!(direction, Direction::RecvOnly | Direction::SendRecv)
}

impl StreamSet {
    pub fn new(peer_id: PeerId) -> Self {
        Self {
            peer_id,
            entries: vec![],
        }
    }

    /// Records a newly negotiated m-line.
    ///
    /// # Returns
    ///
    /// * `Some(MediaStream)` - If the m-line receives media
    /// * `None` - If it is send-only or inactive, or already known
    pub fn added(&mut self, mid: Mid, kind: MediaKind, direction: Direction) -> Option<MediaStream> {
        if self.entries.iter().any(|e| e.mid == mid) {
            return None;
        }

        let receiving = is_receiving(direction);
        self.entries.push(StreamEntry {
            mid,
            kind,
            receiving,
        });

        receiving.then(|| self.stream(mid, kind))
    }

    /// Applies a direction change of an existing m-line.
    pub fn changed(&mut self, mid: Mid, direction: Direction) -> Option<StreamChange> {
        let entry = self.entries.iter_mut().find(|e| e.mid == mid)?;
        let receiving = is_receiving(direction);

        if entry.receiving == receiving {
            return None;
        }
        entry.receiving = receiving;

        let (mid, kind) = (entry.mid, entry.kind);
        let stream = self.stream(mid, kind);

        Some(if receiving {
            StreamChange::Added(stream)
        } else {
            StreamChange::Removed(stream)
        })
    }

    /// Marks every live stream as gone and returns them.
    pub fn take_live(&mut self) -> Vec<MediaStream> {
        let mut gone = vec![];
        for entry in self.entries.iter_mut().filter(|e| e.receiving) {
            entry.receiving = false;
            gone.push(MediaStream {
                peer_id: self.peer_id.clone(),
                mid: entry.mid,
                kind: entry.kind,
            });
        }
        gone
    }

    fn stream(&self, mid: Mid, kind: MediaKind) -> MediaStream {
        MediaStream {
            peer_id: self.peer_id.clone(),
            mid,
            kind,
        }
    }
}

/// A stream starting or stopping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChange {
    Added(MediaStream),
    Removed(MediaStream),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> StreamSet {
        StreamSet::new(PeerId::from("alice"))
    }

    #[test]
    fn only_receiving_lines_become_streams() {
        let mut streams = set();

        let audio = streams.added(Mid::from("0"), MediaKind::Audio, Direction::SendRecv);
        let video = streams.added(Mid::from("1"), MediaKind::Video, Direction::SendOnly);

        assert_eq!(audio.map(|s| s.kind), Some(MediaKind::Audio));
        assert!(video.is_none());
        assert_eq!(streams.take_live().len(), 1);
    }

    #[test]
    fn repeated_media_added_is_ignored() {
        let mut streams = set();
        assert!(streams
            .added(Mid::from("0"), MediaKind::Audio, Direction::RecvOnly)
            .is_some());
        assert!(streams
            .added(Mid::from("0"), MediaKind::Audio, Direction::RecvOnly)
            .is_none());
    }

    #[test]
    fn direction_changes_toggle_the_stream() {
        let mut streams = set();
        let mid = Mid::from("0");
        streams.added(mid, MediaKind::Video, Direction::RecvOnly);

        let removed = streams.changed(mid, Direction::Inactive);
        assert!(matches!(removed, Some(StreamChange::Removed(s)) if s.mid == mid));

        // Already stopped.
        assert!(streams.changed(mid, Direction::SendOnly).is_none());

        let added = streams.changed(mid, Direction::SendRecv);
        assert!(matches!(added, Some(StreamChange::Added(s)) if s.kind == MediaKind::Video));
    }

    #[test]
    fn unknown_mid_change_is_ignored() {
        let mut streams = set();
        assert!(streams.changed(Mid::from("9"), Direction::RecvOnly).is_none());
    }

    #[test]
    fn take_live_retracts_once() {
        let mut streams = set();
        streams.added(Mid::from("0"), MediaKind::Audio, Direction::SendRecv);
        streams.added(Mid::from("1"), MediaKind::Video, Direction::SendRecv);

        let gone = streams.take_live();
        assert_eq!(gone.len(), 2);
        assert!(gone.iter().all(|s| s.peer_id == PeerId::from("alice")));
        assert!(streams.take_live().is_empty());
    }
}
