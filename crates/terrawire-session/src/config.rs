//! Session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use terrawire_protocol::{ProtocolVersion, DEFAULT_MAX_FRAME_LEN};

/// Configuration for a [`ClientSession`](crate::ClientSession).
///
/// Everything is resolved once, when the session is built. Start from
/// `SessionConfig::default()` and override what you need:
///
/// ```rust
/// use terrawire_session::SessionConfig;
/// use terrawire_protocol::ProtocolVersion;
///
/// let config = SessionConfig {
///     protocol: ProtocolVersion::terraria37(),
///     ..SessionConfig::default()
/// };
/// assert_eq!(config.protocol.client_version, "Terraria37");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Wire layout and the version string sent in `Auth`.
    pub protocol: ProtocolVersion,

    /// Largest frame length accepted or sent.
    pub max_frame_len: usize,

    /// How long `connect` waits for `ConnectionApproved`/`FatalError`.
    /// `None` waits forever.
    pub handshake_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            protocol: ProtocolVersion::default(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            handshake_timeout: Some(Duration::from_secs(10)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let c = SessionConfig::default();
        assert_eq!(c.protocol, ProtocolVersion::terraria49());
        assert_eq!(c.max_frame_len, 1_048_576);
        assert_eq!(c.handshake_timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let c: SessionConfig = serde_json::from_str(r#"{ "max_frame_len": 4096 }"#).unwrap();
        assert_eq!(c.max_frame_len, 4096);
        assert_eq!(c.protocol, ProtocolVersion::default());
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let c = SessionConfig {
            protocol: ProtocolVersion::trailing("Custom"),
            max_frame_len: 2048,
            handshake_timeout: None,
        };
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(serde_json::from_str::<SessionConfig>(&json).unwrap(), c);
    }
}
