//! Data models for peer signaling
//!
//! This module contains the core data structures used throughout the crate
//! for tracking peers, signaling payloads and media streams.

pub mod event;
pub mod peer;
pub mod session;
pub mod stream;
