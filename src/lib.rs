//! Peer-connection signaling on top of str0m
//!
//! A [`PeerRegistry`] keeps one negotiation per peer id, creates offers,
//! applies remote offers and answers and exchanges ICE candidates. Whatever
//! must reach the remote side goes to a [`SignalDelegate`], which also hears
//! about media streams coming and going. [`SignalHandle`] runs a registry on
//! its own thread together with the UDP socket it needs.

pub mod config;
pub mod delegate;
pub mod driver;
pub mod error;
pub mod mailbox;
pub mod model;
pub mod registry;
pub mod util;

pub use config::SignalConfig;
pub use delegate::SignalDelegate;
pub use driver::SignalHandle;
pub use error::SignalError;
pub use mailbox::Mailbox;
pub use model::{
    peer::PeerId,
    session::{IceCandidate, SdpType, SessionDescription, SignalMessage},
    stream::{MediaStream, StreamChange},
};
pub use registry::PeerRegistry;
