//! Protocol revision settings.
//!
//! Observed server revisions disagree on two things: what the frame length
//! field counts, and how strings are laid out inside payloads. Rather than
//! hardcode one layout per message, a [`ProtocolVersion`] names the
//! strategy for every variable field. It is resolved once when a session is
//! built and then threaded through every encode/decode call.
//!
//! No cross-version compatibility is assumed: both peers must agree on the
//! same `ProtocolVersion`.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// LengthConvention
// ---------------------------------------------------------------------------

/// What the 4-byte little-endian length field of a frame counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthConvention {
    /// `length = 1 + payload.len()` (type byte + payload). The canonical rule.
    #[default]
    TypeAndPayload,

    /// `length = 5 + payload.len()` (the whole frame, header included).
    WholeFrame,
}

impl LengthConvention {
    /// How many header bytes the length field counts on top of the payload.
    ///
    /// This is also the smallest valid length value: a frame with an
    /// empty payload.
    pub fn overhead(self) -> u32 {
        match self {
            Self::TypeAndPayload => 1,
            Self::WholeFrame => 5,
        }
    }
}

// ---------------------------------------------------------------------------
// StringEncoding
// ---------------------------------------------------------------------------

/// How a string field is laid out inside a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StringEncoding {
    /// Exactly `width` bytes, NUL-padded. Decoding stops at the first NUL.
    Fixed { width: usize },

    /// A `u8` byte count followed by that many bytes (max 255).
    LengthPrefixed,

    /// Every remaining byte of the payload. Only valid for the last field.
    ToEnd,
}

impl StringEncoding {
    /// The name field width used by the oldest observed revision.
    pub const FIXED_NAME: Self = Self::Fixed { width: 25 };
}

// ---------------------------------------------------------------------------
// ColorLayout
// ---------------------------------------------------------------------------

/// How a run of color triples is laid out.
///
/// Both layouts use exactly three unsigned bytes per color; there is never
/// an alpha channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorLayout {
    /// `r g b r g b ...`: each color is one consecutive triple.
    #[default]
    Interleaved,

    /// `r r r ... g g g ... b b b ...`: one plane per channel.
    Planar,
}

// ---------------------------------------------------------------------------
// ProtocolVersion
// ---------------------------------------------------------------------------

/// The full set of layout choices for one protocol revision.
///
/// ```rust
/// use terrawire_protocol::{ProtocolVersion, StringEncoding};
///
/// let v = ProtocolVersion::terraria37();
/// assert_eq!(v.client_version, "Terraria37");
/// assert_eq!(v.player_name, StringEncoding::Fixed { width: 25 });
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolVersion {
    /// The version string the client sends in its `Auth` message.
    pub client_version: String,

    /// What the frame length field counts.
    #[serde(default)]
    pub length: LengthConvention,

    /// Layout of the version string inside `Auth`.
    pub auth_version: StringEncoding,

    /// Layout of the text inside `FatalError` (after the offset byte).
    pub error_text: StringEncoding,

    /// Layout of the player name inside `PlayerAppearance`.
    pub player_name: StringEncoding,

    /// Layout of the seven appearance colors.
    #[serde(default)]
    pub colors: ColorLayout,
}

impl ProtocolVersion {
    /// The revision the original client spoke: 25-byte NUL-padded names.
    pub fn terraria37() -> Self {
        Self {
            client_version: "Terraria37".to_string(),
            length: LengthConvention::TypeAndPayload,
            auth_version: StringEncoding::ToEnd,
            error_text: StringEncoding::ToEnd,
            player_name: StringEncoding::FIXED_NAME,
            colors: ColorLayout::Interleaved,
        }
    }

    /// Length-prefixed names. This is the default revision.
    pub fn terraria49() -> Self {
        Self {
            client_version: "Terraria49".to_string(),
            length: LengthConvention::TypeAndPayload,
            auth_version: StringEncoding::ToEnd,
            error_text: StringEncoding::ToEnd,
            player_name: StringEncoding::LengthPrefixed,
            colors: ColorLayout::Interleaved,
        }
    }

    /// Names run to the end of the payload and the length field counts the
    /// whole frame.
    pub fn trailing(client_version: impl Into<String>) -> Self {
        Self {
            client_version: client_version.into(),
            length: LengthConvention::WholeFrame,
            auth_version: StringEncoding::ToEnd,
            error_text: StringEncoding::ToEnd,
            player_name: StringEncoding::ToEnd,
            colors: ColorLayout::Interleaved,
        }
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::terraria49()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_overhead_per_convention() {
        assert_eq!(LengthConvention::TypeAndPayload.overhead(), 1);
        assert_eq!(LengthConvention::WholeFrame.overhead(), 5);
    }

    #[test]
    fn test_default_version_is_terraria49() {
        let v = ProtocolVersion::default();
        assert_eq!(v.client_version, "Terraria49");
        assert_eq!(v.player_name, StringEncoding::LengthPrefixed);
        assert_eq!(v.length, LengthConvention::TypeAndPayload);
    }

    #[test]
    fn test_trailing_uses_whole_frame_length() {
        let v = ProtocolVersion::trailing("Custom1");
        assert_eq!(v.client_version, "Custom1");
        assert_eq!(v.length, LengthConvention::WholeFrame);
        assert_eq!(v.player_name, StringEncoding::ToEnd);
    }

    #[test]
    fn test_string_encoding_json_shape() {
        // Internally tagged so config files read naturally:
        //   { "kind": "fixed", "width": 25 }
        let json = serde_json::to_value(StringEncoding::FIXED_NAME).unwrap();
        assert_eq!(json["kind"], "fixed");
        assert_eq!(json["width"], 25);

        let json = serde_json::to_value(StringEncoding::LengthPrefixed).unwrap();
        assert_eq!(json["kind"], "length_prefixed");
    }

    #[test]
    fn test_version_deserializes_with_defaults() {
        // `length` and `colors` may be omitted and fall back to their defaults.
        let json = r#"{
            "client_version": "Terraria37",
            "auth_version": { "kind": "to_end" },
            "error_text": { "kind": "to_end" },
            "player_name": { "kind": "fixed", "width": 25 }
        }"#;
        let v: ProtocolVersion = serde_json::from_str(json).unwrap();
        assert_eq!(v, ProtocolVersion::terraria37());
    }

    #[test]
    fn test_version_round_trips_through_json() {
        let v = ProtocolVersion {
            colors: ColorLayout::Planar,
            ..ProtocolVersion::trailing("X")
        };
        let json = serde_json::to_string(&v).unwrap();
        let back: ProtocolVersion = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }
}
