//! Roundtable demo
//!
//! Plays a territory game on a hotseat table with simple seeded bots, then
//! replays the recorded transcript from scratch and checks the state hashes.

use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{Duration, Utc};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use roundtable::{
    core::{Coord, DeterministicRng},
    games::territory::{Placement, Territory},
    host::{EngineConfig, HotseatSession, SessionConfig, SessionEvent, Transcript},
    Member, VERSION,
};

/// Upper bound on device handoffs before the demo gives up.
const MAX_HANDOFFS: u32 = 500;

fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    info!("Roundtable v{}", VERSION);

    let engine_config = EngineConfig::from_env()?;
    let session_config = SessionConfig::from_env()?;
    demo_territory(engine_config, session_config)
}

fn demo_territory(engine_config: EngineConfig, session_config: SessionConfig) -> anyhow::Result<()> {
    info!("=== Territory hotseat ===");

    let game = Territory::new(5, 5, 10);
    let (width, height) = (game.width, game.height);
    let engine = Arc::new(engine_config.build(game));
    let members = vec![
        Member::new("amber", "Amber", "#e0a030"),
        Member::new("cobalt", "Cobalt", "#3050e0"),
        Member::new("moss", "Moss", "#40a040"),
    ];
    let seed = "roundtable-demo";

    let mut table = HotseatSession::new(engine.clone(), members, seed, session_config)?;
    let mut bots = DeterministicRng::from_seed_str("demo-bots");
    let mut clock = Utc::now();

    let mut handoffs = 0;
    loop {
        if table.session_mut().status(clock)?.is_complete() {
            break;
        }
        handoffs += 1;
        if handoffs > MAX_HANDOFFS {
            bail!("game did not finish after {MAX_HANDOFFS} handoffs");
        }

        let Some(seat) = table.current_seat(clock)? else {
            // Delayed pacing: wait out the cooldown
            clock += engine_config.round_delay.unwrap_or_else(Duration::zero) + Duration::seconds(1);
            continue;
        };

        let reserve = table.draft_view(&seat, clock)?.state.reserve;
        let placement = Placement {
            at: Coord::new(bots.int(0, i64::from(width) - 1) as i32, bots.int(0, i64::from(height) - 1) as i32),
            power: bots.int(1, i64::from(reserve.max(1))) as u32,
        };
        if let Err(reason) = table.set_draft(&seat, placement, clock)? {
            warn!(player = %seat, code = %reason.code, "bot drafted an illegal placement");
        }
        table.submit_draft(&seat, clock)?;

        for event in table.session_mut().take_events() {
            match event {
                SessionEvent::RoundClosed {
                    round_index,
                    state_hash,
                    ..
                } => info!(
                    "Round {} closed, hash {}",
                    round_index,
                    state_hash.as_deref().map_or("-", |h| &h[..12])
                ),
                SessionEvent::SystemMessage { message, .. } => info!("  {}", message.text),
                SessionEvent::StatusChanged { status, .. } => info!("Status: {}", status.label()),
                _ => {}
            }
        }
    }

    let status = table.session_mut().status(clock)?;
    info!("=== Result ===");
    info!("Winners: {:?}", status.winners());

    info!("=== Verifying Determinism ===");
    let transcript = table.session().transcript();
    let bytes = transcript.to_bytes()?;
    info!("Transcript: {} rounds, {} bytes", transcript.round_count(), bytes.len());

    let restored = Transcript::<Placement>::from_bytes(&bytes)?;
    let report = restored.verify(&*engine)?;
    let last = table
        .session()
        .checkpoints()
        .last()
        .copied()
        .context("session has no checkpoints")?;

    info!(
        "Checked {} checkpoints, last at boundary {}: {}",
        report.checkpoints_checked,
        last.boundary,
        last.hex()
    );
    info!("Replayed final hash: {}", hex::encode(report.final_hash));
    if report.rounds_replayed == table.session().closed_rounds() {
        info!("DETERMINISM VERIFIED: Hashes match!");
        Ok(())
    } else {
        bail!("DETERMINISM FAILURE: Hashes differ!")
    }
}
