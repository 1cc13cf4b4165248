//! Randomized properties of the packet and frame codecs.
//!
//! Each test draws its inputs from a seeded RNG so failures reproduce.
//! Every property runs against every layout preset, since the whole point
//! of `ProtocolVersion` is that layouts differ.

use bytes::BytesMut;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use terrawire_protocol::{
    Auth, Color, ColorLayout, ConnectionApproved, Dispatcher, FatalError, FrameCodec, Gender,
    Message, PlayerAppearance, PlayerColors, PlayerLife, PlayerMana, ProtocolError,
    ProtocolVersion, Role, StringEncoding,
};

const ITERATIONS: usize = 300;

fn versions() -> Vec<ProtocolVersion> {
    vec![
        ProtocolVersion::terraria37(),
        ProtocolVersion::terraria49(),
        ProtocolVersion::trailing("Trailing1"),
        ProtocolVersion {
            colors: ColorLayout::Planar,
            ..ProtocolVersion::terraria37()
        },
    ]
}

/// Longest string `encoding` can carry (capped for test speed).
fn max_len(encoding: StringEncoding) -> usize {
    match encoding {
        StringEncoding::Fixed { width } => width,
        StringEncoding::LengthPrefixed => 255,
        StringEncoding::ToEnd => 64,
    }
}

fn random_string(rng: &mut StdRng, encoding: StringEncoding) -> String {
    let len = rng.random_range(0..=max_len(encoding));
    (0..len)
        .map(|_| rng.random_range(b' '..=b'~') as char)
        .collect()
}

fn random_color(rng: &mut StdRng) -> Color {
    Color::new(rng.random(), rng.random(), rng.random())
}

fn random_appearance(rng: &mut StdRng, v: &ProtocolVersion) -> PlayerAppearance {
    let mut colors = [Color::default(); PlayerColors::COUNT];
    for c in &mut colors {
        *c = random_color(rng);
    }
    PlayerAppearance {
        slot: rng.random(),
        hair_style: rng.random(),
        gender: Gender::from(rng.random::<u8>()),
        colors: PlayerColors::from_array(colors),
        difficulty: rng.random(),
        name: random_string(rng, v.player_name),
    }
}

/// A random server → client message.
fn random_inbound(rng: &mut StdRng, v: &ProtocolVersion) -> Message {
    match rng.random_range(0..5) {
        0 => FatalError {
            offset: rng.random(),
            text: random_string(rng, v.error_text),
        }
        .into(),
        1 => ConnectionApproved {
            player_slot: rng.random(),
        }
        .into(),
        2 => random_appearance(rng, v).into(),
        3 => PlayerLife {
            slot: rng.random(),
            current: rng.random(),
            max: rng.random(),
        }
        .into(),
        _ => PlayerMana {
            slot: rng.random(),
            level: rng.random(),
            max: rng.random(),
        }
        .into(),
    }
}

#[test]
fn test_inbound_messages_round_trip_for_every_version() {
    let mut rng = StdRng::seed_from_u64(0x7E44_0001);
    for v in versions() {
        let client = Dispatcher::for_role(Role::Client, v.clone());
        for _ in 0..ITERATIONS {
            let msg = random_inbound(&mut rng, &v);
            let payload = msg.encode(&v).unwrap();
            let back = client.decode(msg.tag(), &payload).unwrap().unwrap();
            assert_eq!(back, msg, "version {}", v.client_version);
        }
    }
}

#[test]
fn test_auth_round_trips_on_server_side() {
    let mut rng = StdRng::seed_from_u64(0x7E44_0002);
    for v in versions() {
        let server = Dispatcher::for_role(Role::Server, v.clone());
        for _ in 0..ITERATIONS {
            let msg = Message::from(Auth {
                version: random_string(&mut rng, v.auth_version),
            });
            let payload = msg.encode(&v).unwrap();
            assert_eq!(server.decode(1, &payload).unwrap().unwrap(), msg);
        }
    }
}

#[test]
fn test_boundary_field_values_round_trip() {
    for v in versions() {
        let client = Dispatcher::for_role(Role::Client, v.clone());
        let extremes = [
            Message::from(PlayerLife { slot: 0, current: i16::MIN, max: i16::MAX }),
            Message::from(PlayerMana { slot: 255, level: -1, max: 0 }),
            Message::from(ConnectionApproved { player_slot: 255 }),
            Message::from(PlayerAppearance {
                slot: 255,
                hair_style: 255,
                gender: Gender::Other(255),
                colors: PlayerColors::from_array([Color::new(255, 255, 255); 7]),
                difficulty: 255,
                name: "n".repeat(max_len(v.player_name)),
            }),
        ];
        for msg in extremes {
            let payload = msg.encode(&v).unwrap();
            assert_eq!(client.decode(msg.tag(), &payload).unwrap().unwrap(), msg);
        }
    }
}

#[test]
fn test_framed_messages_survive_every_split_point() {
    let mut rng = StdRng::seed_from_u64(0x7E44_0003);
    for v in versions() {
        let codec = FrameCodec::new(v.length);
        let client = Dispatcher::for_role(Role::Client, v.clone());
        for _ in 0..20 {
            let msg = random_inbound(&mut rng, &v);
            let mut wire = BytesMut::new();
            codec.encode(msg.tag(), &msg.encode(&v).unwrap(), &mut wire).unwrap();

            for split in 1..wire.len() {
                let mut buf = BytesMut::from(&wire[..split]);
                assert!(codec.decode(&mut buf).unwrap().is_none());
                buf.extend_from_slice(&wire[split..]);
                let frame = codec.decode(&mut buf).unwrap().unwrap();
                let back = client.decode(frame.tag, &frame.payload).unwrap().unwrap();
                assert_eq!(back, msg);
            }
        }
    }
}

#[test]
fn test_random_payloads_never_panic_or_overread() {
    // Garbage of every length for every tag: decoding must either succeed
    // or report a payload error. Never panic, never an I/O or framing error.
    let mut rng = StdRng::seed_from_u64(0x7E44_0004);
    for v in versions() {
        let client = Dispatcher::for_role(Role::Client, v.clone());
        for _ in 0..ITERATIONS {
            let len = rng.random_range(0..80);
            let payload: Vec<u8> = (0..len).map(|_| rng.random()).collect();
            for tag in [1u8, 3, 4, 0x10, 0x2A] {
                match client.decode(tag, &payload) {
                    Ok(Some(_)) => {}
                    Ok(None) => panic!("tag {tag} should be registered"),
                    Err(e) => assert!(e.is_malformed(), "unexpected error {e}"),
                }
            }
        }
    }
}

#[test]
fn test_truncated_appearance_prefix_always_fails() {
    let mut rng = StdRng::seed_from_u64(0x7E44_0005);
    for v in versions() {
        let client = Dispatcher::for_role(Role::Client, v.clone());
        let payload = Message::from(random_appearance(&mut rng, &v)).encode(&v).unwrap();
        for cut in 0..25 {
            let err = client.decode(4, &payload[..cut]).unwrap_err();
            assert!(
                matches!(err, ProtocolError::Truncated { needed: 25, .. }),
                "cut {cut}: {err}"
            );
        }
    }
}

#[test]
fn test_oversized_declared_name_length_is_malformed() {
    let v = ProtocolVersion::terraria49();
    let client = Dispatcher::for_role(Role::Client, v.clone());
    let mut rng = StdRng::seed_from_u64(0x7E44_0006);
    for _ in 0..ITERATIONS {
        let mut msg = random_appearance(&mut rng, &v);
        msg.name.truncate(100);
        let mut payload = Message::from(msg.clone()).encode(&v).unwrap().to_vec();
        let actual = msg.name.len();
        let declared = rng.random_range(actual + 1..=255);
        payload[25] = declared as u8;

        let err = client.decode(4, &payload).unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated { .. }), "{err}");
    }
}
