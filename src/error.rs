//! Errors returned by registry operations and the driver.

use str0m::RtcError;
use thiserror::Error;

use crate::model::{peer::PeerId, session::SdpType};

/// Errors that can occur during signaling operations.
#[derive(Debug, Error)]
pub enum SignalError {
    /// A connection is already registered under this peer id.
    #[error("peer {0} already has a connection")]
    DuplicatePeer(PeerId),

    /// No connection is registered under this peer id.
    #[error("no connection for peer {0}")]
    UnknownPeer(PeerId),

    /// An earlier offer is still waiting for its answer.
    #[error("peer {0} has an offer awaiting an answer")]
    OfferPending(PeerId),

    /// An answer arrived but no offer was sent.
    #[error("peer {0} has no pending offer to complete")]
    NoPendingOffer(PeerId),

    /// The remote description does not match the receiver role.
    #[error("expected remote {expected} for peer {peer}, got {actual}")]
    UnexpectedDescription {
        peer: PeerId,
        expected: SdpType,
        actual: SdpType,
    },

    /// The offer would contain no media and no data channel.
    #[error("nothing to negotiate for peer {0}")]
    NothingToNegotiate(PeerId),

    /// The SDP body could not be parsed.
    #[error("invalid session description: {0}")]
    InvalidDescription(String),

    /// The candidate line could not be parsed.
    #[error("invalid ice candidate: {0}")]
    InvalidCandidate(String),

    /// The engine rejected the negotiation step.
    #[error("negotiation failed: {0}")]
    Negotiation(#[from] RtcError),

    /// No ICE candidates were found
    #[error("no usable local candidates")]
    NoCandidates,

    /// Malformed configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The driver thread is gone.
    #[error("signaling driver is not running")]
    DriverStopped,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
