//! Typed messages that travel inside frames.
//!
//! Each message kind is its own struct so it can carry its own codec
//! (see [`Packet`](crate::Packet)). [`Message`] is the closed set of all of
//! them, which is what handlers receive.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// Known message tags.
///
/// Tag 1 is shared: the client sends `Auth` with it, the server sends
/// `FatalError` with it. Which one a tag-1 frame is depends on who sent
/// it (see [`Role`]), never on its contents.
pub mod tag {
    pub const AUTH: u8 = 1;
    pub const FATAL_ERROR: u8 = 1;
    pub const CONNECTION_APPROVED: u8 = 3;
    pub const PLAYER_APPEARANCE: u8 = 4;
    pub const PLAYER_LIFE: u8 = 0x10;
    pub const PLAYER_MANA: u8 = 0x2A;
}

/// Which side of the connection we are.
///
/// Decides how inbound tag-1 frames are read: a client receives
/// `FatalError`, a server receives `Auth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    Server,
}

// ---------------------------------------------------------------------------
// Field types
// ---------------------------------------------------------------------------

/// An RGB color, three unsigned bytes, no alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl From<(u8, u8, u8)> for Color {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self { r, g, b }
    }
}

impl From<[u8; 3]> for Color {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

impl From<Color> for [u8; 3] {
    fn from(c: Color) -> Self {
        [c.r, c.g, c.b]
    }
}

/// The gender byte of a player appearance.
///
/// Only `1` and `0` have a meaning. Anything else is kept verbatim in
/// [`Gender::Other`] instead of being folded into one of the two, so the
/// original byte survives a decode → encode cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    /// Wire value `1`.
    Male,
    /// Wire value `0`.
    Female,
    /// Any other wire value.
    Other(u8),
}

impl From<u8> for Gender {
    fn from(byte: u8) -> Self {
        match byte {
            1 => Self::Male,
            0 => Self::Female,
            other => Self::Other(other),
        }
    }
}

impl From<Gender> for u8 {
    fn from(g: Gender) -> Self {
        match g {
            Gender::Male => 1,
            Gender::Female => 0,
            Gender::Other(b) => b,
        }
    }
}

/// The seven appearance colors, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlayerColors {
    pub hair: Color,
    pub skin: Color,
    pub eye: Color,
    pub shirt: Color,
    pub undershirt: Color,
    pub pants: Color,
    pub shoe: Color,
}

impl PlayerColors {
    /// Number of colors on the wire.
    pub const COUNT: usize = 7;

    pub fn to_array(&self) -> [Color; Self::COUNT] {
        [
            self.hair,
            self.skin,
            self.eye,
            self.shirt,
            self.undershirt,
            self.pants,
            self.shoe,
        ]
    }

    pub fn from_array(c: [Color; Self::COUNT]) -> Self {
        Self {
            hair: c[0],
            skin: c[1],
            eye: c[2],
            shirt: c[3],
            undershirt: c[4],
            pants: c[5],
            shoe: c[6],
        }
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Client → Server: "here is my version, let me in." (tag 1)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auth {
    pub version: String,
}

/// Server → Client: "you're rejected / something broke." (tag 1)
///
/// Always ends the session after delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FatalError {
    pub offset: u8,
    pub text: String,
}

/// Server → Client: handshake accepted, here is your slot. (tag 3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionApproved {
    pub player_slot: u8,
}

/// Either direction: a player's look. (tag 4)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerAppearance {
    pub slot: u8,
    pub hair_style: u8,
    pub gender: Gender,
    pub colors: PlayerColors,
    pub difficulty: u8,
    pub name: String,
}

/// Either direction: a player's health. (tag 0x10)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerLife {
    pub slot: u8,
    pub current: i16,
    pub max: i16,
}

/// Either direction: a player's mana. (tag 0x2A)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerMana {
    pub slot: u8,
    pub level: i16,
    pub max: i16,
}

/// Every message kind this client understands.
///
/// A `Message` is built fresh for each decode and handed to the handler
/// by value; nothing is shared between messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    Auth(Auth),
    FatalError(FatalError),
    ConnectionApproved(ConnectionApproved),
    PlayerAppearance(PlayerAppearance),
    PlayerLife(PlayerLife),
    PlayerMana(PlayerMana),
}

impl Message {
    /// The wire tag for this message.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Auth(_) => tag::AUTH,
            Self::FatalError(_) => tag::FATAL_ERROR,
            Self::ConnectionApproved(_) => tag::CONNECTION_APPROVED,
            Self::PlayerAppearance(_) => tag::PLAYER_APPEARANCE,
            Self::PlayerLife(_) => tag::PLAYER_LIFE,
            Self::PlayerMana(_) => tag::PLAYER_MANA,
        }
    }

    /// Short variant name for log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Auth(_) => "Auth",
            Self::FatalError(_) => "FatalError",
            Self::ConnectionApproved(_) => "ConnectionApproved",
            Self::PlayerAppearance(_) => "PlayerAppearance",
            Self::PlayerLife(_) => "PlayerLife",
            Self::PlayerMana(_) => "PlayerMana",
        }
    }
}

macro_rules! impl_into_message {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Message {
                fn from(m: $variant) -> Self {
                    Self::$variant(m)
                }
            }
        )*
    };
}

impl_into_message!(
    Auth,
    FatalError,
    ConnectionApproved,
    PlayerAppearance,
    PlayerLife,
    PlayerMana,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_byte_mapping() {
        assert_eq!(Gender::from(1), Gender::Male);
        assert_eq!(Gender::from(0), Gender::Female);
        assert_eq!(Gender::from(7), Gender::Other(7));
        for b in 0..=u8::MAX {
            assert_eq!(u8::from(Gender::from(b)), b, "byte {b} must survive");
        }
    }

    #[test]
    fn test_color_conversions_preserve_channel_order() {
        let c = Color::from((255, 0, 128));
        assert_eq!(c, Color::new(255, 0, 128));
        assert_eq!(<[u8; 3]>::from(c), [255, 0, 128]);
        assert_eq!(Color::from([1, 2, 3]), Color { r: 1, g: 2, b: 3 });
    }

    #[test]
    fn test_player_colors_array_order() {
        let colors = PlayerColors {
            hair: Color::new(1, 1, 1),
            skin: Color::new(2, 2, 2),
            eye: Color::new(3, 3, 3),
            shirt: Color::new(4, 4, 4),
            undershirt: Color::new(5, 5, 5),
            pants: Color::new(6, 6, 6),
            shoe: Color::new(7, 7, 7),
        };
        let arr = colors.to_array();
        assert_eq!(arr[0], colors.hair);
        assert_eq!(arr[6], colors.shoe);
        assert_eq!(PlayerColors::from_array(arr), colors);
    }

    #[test]
    fn test_message_tags() {
        assert_eq!(Message::from(Auth { version: "x".into() }).tag(), 1);
        assert_eq!(
            Message::from(FatalError { offset: 0, text: String::new() }).tag(),
            1
        );
        assert_eq!(Message::from(ConnectionApproved { player_slot: 0 }).tag(), 3);
        assert_eq!(
            Message::from(PlayerLife { slot: 0, current: 0, max: 0 }).tag(),
            0x10
        );
        assert_eq!(
            Message::from(PlayerMana { slot: 0, level: 0, max: 0 }).tag(),
            0x2A
        );
    }

    #[test]
    fn test_message_json_is_internally_tagged() {
        let msg = Message::from(PlayerLife { slot: 1, current: 100, max: 200 });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "PlayerLife");
        assert_eq!(json["current"], 100);
    }
}
