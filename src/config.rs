//! Settings shared by every peer connection of a registry.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use str0m::media::{Direction, MediaKind};
use str0m::{Rtc, RtcConfig};

use crate::error::SignalError;

#[derive(Debug, Clone)]
pub struct SignalConfig {
    /// Address of the UDP socket the driver binds. An unspecified IP makes
    /// the driver advertise every usable interface.
    pub bind_addr: SocketAddr,
    /// Media lines added to the first offer of each peer.
    pub media: Vec<MediaKind>,
    /// Direction of those media lines.
    pub direction: Direction,
    /// Label of a data channel to add to the first offer.
    pub data_channel: Option<String>,
    pub ice_lite: bool,
    /// Upper bound on how long the driver sleeps between command checks.
    pub max_poll_interval: Duration,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 0)),
            media: vec![MediaKind::Audio, MediaKind::Video],
            direction: Direction::SendRecv,
            data_channel: None,
            ice_lite: false,
            max_poll_interval: Duration::from_millis(50),
        }
    }
}

impl SignalConfig {
    /// Reads overrides from the `RTC_SIGNAL_*` environment variables.
    pub fn from_env() -> Result<Self, SignalError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, SignalError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = SignalConfig::default();

        if let Some(bind) = lookup("RTC_SIGNAL_BIND") {
            config.bind_addr = bind
                .parse()
                .map_err(|_| SignalError::Config(format!("RTC_SIGNAL_BIND: bad address '{bind}'")))?;
        }

        if let Some(media) = lookup("RTC_SIGNAL_MEDIA") {
            config.media = parse_media(&media)?;
        }

        if let Some(direction) = lookup("RTC_SIGNAL_DIRECTION") {
            config.direction = parse_direction(&direction)?;
        }

        if let Some(label) = lookup("RTC_SIGNAL_CHANNEL") {
            config.data_channel = Some(label).filter(|l| !l.is_empty());
        }

        if let Some(flag) = lookup("RTC_SIGNAL_ICE_LITE") {
            config.ice_lite = match flag.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(SignalError::Config(format!(
                        "RTC_SIGNAL_ICE_LITE: expected a boolean, got '{flag}'"
                    )))
                }
            };
        }

        Ok(config)
    }

    /// Engine settings for a new peer connection.
    pub fn rtc_config(&self) -> RtcConfig {
        Rtc::builder().set_ice_lite(self.ice_lite)
    }
}

fn parse_media(value: &str) -> Result<Vec<MediaKind>, SignalError> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("none") || value.is_empty() {
        return Ok(vec![]);
    }

    value
        .split(',')
        .map(|kind| match kind.trim().to_ascii_lowercase().as_str() {
            "audio" => Ok(MediaKind::Audio),
            "video" => Ok(MediaKind::Video),
            other => Err(SignalError::Config(format!(
                "RTC_SIGNAL_MEDIA: unknown media kind '{other}'"
            ))),
        })
        .collect()
}

fn parse_direction(value: &str) -> Result<Direction, SignalError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "sendrecv" => Ok(Direction::SendRecv),
        "sendonly" => Ok(Direction::SendOnly),
        "recvonly" => Ok(Direction::RecvOnly),
        "inactive" => Ok(Direction::Inactive),
        other => Err(SignalError::Config(format!(
            "RTC_SIGNAL_DIRECTION: unknown direction '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_offer_audio_and_video() {
        let config = SignalConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.media, vec![MediaKind::Audio, MediaKind::Video]);
        assert_eq!(config.direction, Direction::SendRecv);
        assert!(config.bind_addr.ip().is_unspecified());
        assert!(config.data_channel.is_none());
    }

    #[test]
    fn overrides_are_applied() {
        let config = SignalConfig::from_lookup(lookup(&[
            ("RTC_SIGNAL_BIND", "127.0.0.1:4000"),
            ("RTC_SIGNAL_MEDIA", "Video"),
            ("RTC_SIGNAL_DIRECTION", "recvonly"),
            ("RTC_SIGNAL_CHANNEL", "chat"),
            ("RTC_SIGNAL_ICE_LITE", "true"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:4000".parse().unwrap());
        assert_eq!(config.media, vec![MediaKind::Video]);
        assert_eq!(config.direction, Direction::RecvOnly);
        assert_eq!(config.data_channel.as_deref(), Some("chat"));
        assert!(config.ice_lite);
    }

    #[test]
    fn none_disables_media() {
        let config = SignalConfig::from_lookup(lookup(&[("RTC_SIGNAL_MEDIA", "none")])).unwrap();
        assert!(config.media.is_empty());
    }

    #[test]
    fn malformed_values_are_config_errors() {
        for vars in [
            [("RTC_SIGNAL_BIND", "nowhere")],
            [("RTC_SIGNAL_MEDIA", "audio,smell")],
            [("RTC_SIGNAL_DIRECTION", "sideways")],
            [("RTC_SIGNAL_ICE_LITE", "maybe")],
        ] {
            let err = SignalConfig::from_lookup(lookup(&vars)).unwrap_err();
            assert!(matches!(err, SignalError::Config(_)), "{vars:?}");
        }
    }
}
