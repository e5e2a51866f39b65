//! Signaling payloads
//!
//! Session descriptions and ICE candidates in the JSON shape browsers use
//! (`RTCSessionDescriptionInit` / `RTCIceCandidateInit`), plus conversions
//! to and from the str0m types.

use std::fmt;

use serde::{Deserialize, Serialize};
use str0m::{
    change::{SdpAnswer, SdpOffer},
    Candidate,
};

use crate::error::SignalError;

/// Whether a session description is an offer or an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

impl fmt::Display for SdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdpType::Offer => f.write_str("offer"),
            SdpType::Answer => f.write_str("answer"),
        }
    }
}

/// An offer/answer negotiation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Answer,
            sdp: sdp.into(),
        }
    }

    /// Parses the body as an offer.
    ///
    /// Fails with [`SignalError::InvalidDescription`] when the description is
    /// not an offer or the SDP does not parse.
    pub fn to_offer(&self) -> Result<SdpOffer, SignalError> {
        if self.kind != SdpType::Offer {
            return Err(SignalError::InvalidDescription(format!(
                "expected offer, got {}",
                self.kind
            )));
        }
        SdpOffer::from_sdp_string(&self.sdp)
            .map_err(|e| SignalError::InvalidDescription(e.to_string()))
    }

    /// Parses the body as an answer.
    pub fn to_answer(&self) -> Result<SdpAnswer, SignalError> {
        if self.kind != SdpType::Answer {
            return Err(SignalError::InvalidDescription(format!(
                "expected answer, got {}",
                self.kind
            )));
        }
        SdpAnswer::from_sdp_string(&self.sdp)
            .map_err(|e| SignalError::InvalidDescription(e.to_string()))
    }
}

impl From<&SdpOffer> for SessionDescription {
    fn from(offer: &SdpOffer) -> Self {
        SessionDescription::offer(offer.to_sdp_string())
    }
}

impl From<&SdpAnswer> for SessionDescription {
    fn from(answer: &SdpAnswer) -> Self {
        SessionDescription::answer(answer.to_sdp_string())
    }
}

/// A single network path proposed during ICE negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(
        rename = "sdpMLineIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_m_line_index: Option<u16>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
        }
    }

    /// An empty candidate line marks the end of candidates.
    pub fn is_end_of_candidates(&self) -> bool {
        self.candidate_line().is_empty()
    }

    /// Parses the candidate line into a str0m [`Candidate`].
    ///
    /// Accepts the line with or without the `a=` and `candidate:` prefixes.
    pub fn to_candidate(&self) -> Result<Candidate, SignalError> {
        let line = self.candidate_line();
        let line = if line.starts_with("candidate:") {
            line.to_string()
        } else {
            format!("candidate:{line}")
        };
        Candidate::from_sdp_string(&line)
            .map_err(|e| SignalError::InvalidCandidate(format!("{line}: {e}")))
    }

    fn candidate_line(&self) -> &str {
        let line = self.candidate.trim();
        line.strip_prefix("a=").unwrap_or(line)
    }
}

impl From<&Candidate> for IceCandidate {
    fn from(candidate: &Candidate) -> Self {
        IceCandidate::new(candidate.to_sdp_string())
    }
}

/// One outgoing signal, as queued by [`crate::mailbox::Mailbox`] and
/// exchanged by the HTTP signaling endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum SignalMessage {
    Offer(SessionDescription),
    Answer(SessionDescription),
    Candidate(IceCandidate),
}
