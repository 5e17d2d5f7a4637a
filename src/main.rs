//! Cangkulan Prover
//!
//! Plays a demo match between two local parties on the in-memory ledger and
//! logs every phase. Pass a config JSON path as the first argument to
//! override the defaults.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cangkulan_prover::{
    circuit::{testing::sample_artifact, testing::EchoBackend, ArtifactSource, NoirBridge},
    core::card,
    ledger::{InMemoryLedger, Outcome},
    session::{open_secret_store, SessionContext, SessionOrchestrator},
    EngineConfig, PlayAction, ProofMode, VERSION,
};

/// Upper bound on demo rounds; a dealt game needs far fewer.
const MAX_ROUNDS: usize = 200;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    info!("Cangkulan Prover v{}", VERSION);

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_json_file(&PathBuf::from(path))?,
        None => EngineConfig::default(),
    };
    config.validate()?;

    demo_match(&config).await
}

/// Two parties, one on Pedersen seed proofs and one on circuit proofs.
async fn demo_match(config: &EngineConfig) -> anyhow::Result<()> {
    info!("=== Starting Demo Match ===");

    let bridge = Arc::new(NoirBridge::new(
        ArtifactSource::Inline(Box::new(sample_artifact()?)),
        Arc::new(EchoBackend::default()),
    ));
    let ledger = Arc::new(InMemoryLedger::new().with_circuit_verifier(bridge.clone()));

    let session_id = 1;
    let (alice, bob) = ("GALICE", "GBOB");
    ledger.start_game(session_id, alice, bob).await?;
    info!("Session {} started: {} vs {}", session_id, alice, bob);

    let secrets = open_secret_store(config)?;
    let player = |party: &str, mode: ProofMode| {
        SessionOrchestrator::new(
            SessionContext::from_config(session_id, party, config).with_proof_mode(mode),
            ledger.clone(),
            ledger.clone(),
            secrets.clone(),
        )
        .with_config(config)
    };
    let players = [
        player(alice, ProofMode::Pedersen),
        player(bob, ProofMode::Noir).with_circuit_bridge(bridge.clone()),
    ];

    info!("=== Seed Phase ===");
    for p in &players {
        p.commit_seed().await?;
    }
    for p in &players {
        p.reveal_seed().await?;
    }
    let view = players[0].refresh().await?;
    info!(
        "Dealt: {} cards each, {} in the pile, flipped {:?}",
        view.my_hand.len(),
        view.draw_pile_size,
        view.flipped_card
    );

    info!("=== Trick Phase ===");
    for round in 0..MAX_ROUNDS {
        for p in &players {
            let view = p.refresh().await?;
            if view.is_finished() {
                break;
            }
            if !view.awaiting_my_play_commit() {
                continue;
            }
            let action = choose_action(&view.valid_set());
            info!("Round {}: {} plays {:?}", round, p.context().party, action);
            p.commit_play(action).await?;
        }
        for p in &players {
            p.poll_once().await?;
        }
        if players[0].cached_view().is_some_and(|v| v.is_finished()) {
            break;
        }
    }

    info!("=== Match Results ===");
    let view = players[0].refresh().await?;
    if !view.is_finished() {
        bail!("demo match did not finish within {} rounds", MAX_ROUNDS);
    }
    info!("Tricks won: {} - {}", view.tricks_won[0], view.tricks_won[1]);
    match view.outcome {
        Outcome::Player1Won => info!("Winner: {}", alice),
        Outcome::Player2Won => info!("Winner: {}", bob),
        Outcome::Draw => info!("Draw"),
        Outcome::Undecided => warn!("Finished without an outcome"),
    }
    info!("Circuit bridge initialized {} time(s)", bridge.init_runs());

    Ok(())
}

/// Follow suit with the highest card, otherwise cangkul.
fn choose_action(valid_set: &[card::CardId]) -> PlayAction {
    valid_set
        .iter()
        .copied()
        .max_by_key(|c| card::value_of(*c))
        .map(PlayAction::Card)
        .unwrap_or(PlayAction::Cangkul)
}
