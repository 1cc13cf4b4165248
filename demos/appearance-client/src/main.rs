//! Connects to a server, joins with a fixed look, and logs what comes back.
//!
//! ```text
//! RUST_LOG=debug cargo run -p appearance-client -- 127.0.0.1:7777
//! ```

use terrawire::prelude::*;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Character
// ---------------------------------------------------------------------------

fn player1(slot: u8) -> PlayerAppearance {
    PlayerAppearance {
        slot,
        hair_style: 2,
        gender: Gender::Male,
        colors: PlayerColors {
            hair: Color::new(255, 0, 0),
            skin: Color::new(255, 255, 255),
            eye: Color::new(0, 0, 255),
            shirt: Color::new(0, 255, 0),
            undershirt: Color::new(0, 255, 0),
            pants: Color::new(0, 0, 128),
            shoe: Color::new(128, 128, 128),
        },
        difficulty: 0,
        name: "Player1".into(),
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

struct Logger;

impl MessageHandler for Logger {
    fn on_message(&mut self, message: Message) {
        match message {
            Message::PlayerAppearance(a) => tracing::info!(
                slot = a.slot,
                name = %a.name,
                hair_style = a.hair_style,
                gender = ?a.gender,
                difficulty = a.difficulty,
                hair = ?a.colors.hair,
                shirt = ?a.colors.shirt,
                "player appearance"
            ),
            Message::PlayerLife(l) => {
                tracing::info!(slot = l.slot, current = l.current, max = l.max, "player life")
            }
            Message::PlayerMana(m) => {
                tracing::info!(slot = m.slot, level = m.level, max = m.max, "player mana")
            }
            Message::FatalError(e) => {
                tracing::error!(offset = e.offset, text = %e.text, "server error")
            }
            other => tracing::debug!(message = other.name(), "received"),
        }
    }

    fn on_unknown(&mut self, tag: u8, payload: bytes::Bytes) {
        tracing::info!(tag = %format_args!("{tag:#04x}"), len = payload.len(), "unknown message type");
    }

    fn on_closed(&mut self, reason: CloseReason) {
        tracing::info!(?reason, "connection closed");
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), TerrawireError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_ADDR.to_string());
    let config = SessionConfig {
        protocol: ProtocolVersion::terraria37(),
        ..SessionConfig::default()
    };

    let mut session = ClientSession::new(config);
    let handler = session.on_message(Logger);

    let slot = session.connect(&TcpTransport::new(), &addr).await?;
    tracing::info!(%addr, slot, "joined");

    session.send(player1(slot)).await?;

    let handle = session.handle();
    tokio::select! {
        _ = handle.wait_closed() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
            handle.disconnect().await;
        }
    }

    if let Some(task) = handler {
        let _ = task.await;
    }
    Ok(())
}
