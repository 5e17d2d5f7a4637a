//! Two orchestrators driving sessions on the in-memory ledger.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use cangkulan_prover::circuit::testing::{sample_artifact, EchoBackend};
use cangkulan_prover::circuit::{ArtifactSource, CircuitBackend, NoirBridge};
use cangkulan_prover::core::card;
use cangkulan_prover::ledger::{
    ContractError, InMemoryLedger, LedgerClient, LedgerError, Lifecycle, Outcome, SessionView, StateRefresh,
};
use cangkulan_prover::proof::{ProofError, VerifyError};
use cangkulan_prover::session::{ActionOutcome, Backoff, EngineError, SessionContext, SessionOrchestrator};
use cangkulan_prover::store::{MemoryStore, SecretStore, SeedRecord};
use cangkulan_prover::{PlayAction, ProofMode};

const SID: u32 = 42;
const ALICE: &str = "GALICE";
const BOB: &str = "GBOB";

fn fast_backoff() -> Backoff {
    Backoff::new(4, Duration::from_millis(1), Duration::from_millis(4))
}

fn deadbeef_seed() -> [u8; 32] {
    let mut seed = [0x11u8; 32];
    seed[..4].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
    seed
}

struct Table {
    ledger: Arc<InMemoryLedger>,
    alice: SessionOrchestrator,
    bob: SessionOrchestrator,
    alice_kv: Arc<MemoryStore>,
}

fn player(ledger: &Arc<InMemoryLedger>, ctx: SessionContext, kv: Arc<MemoryStore>) -> SessionOrchestrator {
    SessionOrchestrator::new(ctx, ledger.clone(), ledger.clone(), SecretStore::new(kv)).with_backoff(fast_backoff())
}

async fn table_with(ledger: InMemoryLedger, alice: SessionContext, bob: SessionContext) -> Table {
    let ledger = Arc::new(ledger);
    ledger.start_game(SID, ALICE, BOB).await.unwrap();
    let alice_kv = Arc::new(MemoryStore::new());
    Table {
        alice: player(&ledger, alice, alice_kv.clone()),
        bob: player(&ledger, bob, Arc::new(MemoryStore::new())),
        ledger,
        alice_kv,
    }
}

async fn table(mode: ProofMode) -> Table {
    table_with(
        InMemoryLedger::new(),
        SessionContext::new(SID, ALICE).with_proof_mode(mode),
        SessionContext::new(SID, BOB).with_proof_mode(mode),
    )
    .await
}

async fn dealt_table(alice: SessionContext, bob: SessionContext) -> Table {
    let t = table_with(InMemoryLedger::new(), alice, bob).await;
    t.alice.commit_seed().await.unwrap();
    t.bob.commit_seed().await.unwrap();
    t.alice.reveal_seed().await.unwrap();
    t.bob.reveal_seed().await.unwrap();
    assert_eq!(t.alice.refresh().await.unwrap().lifecycle, Lifecycle::Playing);
    t
}

fn choose(view: &SessionView) -> PlayAction {
    view.valid_set()
        .into_iter()
        .max_by_key(|c| card::value_of(*c))
        .map(PlayAction::Card)
        .unwrap_or(PlayAction::Cangkul)
}

/// Delays every view fetch so a second call can observe the first in flight.
struct SlowRefresh(Arc<InMemoryLedger>);

#[async_trait]
impl StateRefresh for SlowRefresh {
    async fn fetch_session_view(&self, session_id: u32, viewer: &str) -> Result<SessionView, LedgerError> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.0.fetch_session_view(session_id, viewer).await
    }
}

/// Passes views through, with one-shot interference a test can arm.
struct Interfering {
    ledger: Arc<InMemoryLedger>,
    phantom_card: Mutex<Option<card::CardId>>,
    opponent_ticks: AtomicBool,
}

impl Interfering {
    /// Next view shows `card` in the viewer's hand.
    fn add_phantom(&self, card: card::CardId) {
        *self.phantom_card.lock().unwrap() = Some(card);
    }

    /// Bob ticks the nonce right after the next view is taken.
    fn opponent_moves_next(&self) {
        self.opponent_ticks.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl StateRefresh for Interfering {
    async fn fetch_session_view(&self, session_id: u32, viewer: &str) -> Result<SessionView, LedgerError> {
        let mut view = self.ledger.fetch_session_view(session_id, viewer).await?;
        let phantom = self.phantom_card.lock().unwrap().take();
        if let Some(card) = phantom {
            view.my_hand.push(card);
        }
        if self.opponent_ticks.swap(false, Ordering::SeqCst) {
            self.ledger.tick_timeout(session_id, BOB).await?;
        }
        Ok(view)
    }
}

/// Alice on her own store, reading the ledger through [`Interfering`].
fn interfered_alice(t: &Table) -> (Arc<Interfering>, SessionOrchestrator) {
    let refresh = Arc::new(Interfering {
        ledger: t.ledger.clone(),
        phantom_card: Mutex::new(None),
        opponent_ticks: AtomicBool::new(false),
    });
    let alice = SessionOrchestrator::new(
        SessionContext::new(SID, ALICE),
        t.ledger.clone(),
        refresh.clone(),
        SecretStore::new(Arc::new(MemoryStore::new())),
    )
    .with_backoff(fast_backoff());
    (refresh, alice)
}

#[tokio::test]
async fn test_full_game_with_zk_plays() {
    let t = dealt_table(
        SessionContext::new(SID, ALICE).with_proof_mode(ProofMode::Pedersen),
        SessionContext::new(SID, BOB),
    )
    .await;

    for _ in 0..64 {
        for p in [&t.alice, &t.bob] {
            let view = p.refresh().await.unwrap();
            if view.awaiting_my_play_commit() {
                assert!(p.commit_play(choose(&view)).await.unwrap().is_submitted());
            }
        }
        t.alice.poll_once().await.unwrap();
        t.bob.poll_once().await.unwrap();
        if t.alice.refresh().await.unwrap().is_finished() {
            break;
        }
    }

    let view = t.alice.refresh().await.unwrap();
    assert!(view.is_finished());
    assert_ne!(view.outcome, Outcome::Undecided);
    assert!(view.tricks_won[0] + view.tricks_won[1] > 0);
    assert_eq!(t.ledger.call_count("commit_play"), 0);
    assert_eq!(t.ledger.call_count("reveal_play"), t.ledger.call_count("commit_play_zk") + t.ledger.call_count("commit_cangkul_zk"));
    assert!(t.alice_kv.is_empty());
}

#[tokio::test]
async fn test_contention_retries_with_refreshed_nonce() {
    let t = dealt_table(SessionContext::new(SID, ALICE), SessionContext::new(SID, BOB)).await;
    let (refresh, alice) = interfered_alice(&t);
    let view = alice.refresh().await.unwrap();
    let nonce = view.action_nonce;
    let fetches = t.ledger.call_count("fetch_session_view");

    // Bob's tick lands between Alice reading the nonce and submitting with it.
    refresh.opponent_moves_next();
    let outcome = alice.commit_play(choose(&view)).await.unwrap();

    assert_eq!(outcome, ActionOutcome::Submitted { attempts: 2 });
    assert_eq!(t.ledger.call_count("tick_timeout"), 1);
    let commits = t.ledger.call_count("commit_play_zk") + t.ledger.call_count("commit_cangkul_zk");
    assert_eq!(commits, 2);
    // One fetch up front, one before the retry.
    assert_eq!(t.ledger.call_count("fetch_session_view"), fetches + 2);
    assert_eq!(t.ledger.submitted_play_nonces(), vec![nonce, nonce + 1]);
    assert!(alice.refresh().await.unwrap().play_committed[0]);
}

#[tokio::test]
async fn test_injected_contention_uses_latest_nonce() {
    let t = dealt_table(SessionContext::new(SID, ALICE), SessionContext::new(SID, BOB)).await;
    let (refresh, alice) = interfered_alice(&t);
    let view = alice.refresh().await.unwrap();
    let nonce = view.action_nonce;

    t.ledger.inject_contention(1);
    refresh.opponent_moves_next();
    let outcome = alice.commit_play(choose(&view)).await.unwrap();

    // The injected failure eats the first attempt; the retry sees Bob's tick.
    assert_eq!(outcome, ActionOutcome::Submitted { attempts: 2 });
    assert_eq!(t.ledger.submitted_play_nonces(), vec![nonce, nonce + 1]);
}

#[tokio::test]
async fn test_stale_ring_proof_not_resubmitted() {
    let t = dealt_table(SessionContext::new(SID, ALICE), SessionContext::new(SID, BOB)).await;
    let (refresh, alice) = interfered_alice(&t);
    let view = alice.refresh().await.unwrap();
    let suit = view.trick_suit.unwrap();
    let phantom = (0..card::DECK_SIZE)
        .find(|c| card::suit_of(*c) == suit && !view.my_hand.contains(c) && view.flipped_card != Some(*c))
        .unwrap();
    let expected = match view.valid_set().len() {
        0 => VerifyError::EmptySet,
        n => VerifyError::StaleValidSet { proof_size: n + 1, set_size: n },
    };

    // The proof is built over a hand holding one card too many; the retry
    // sees the real hand.
    refresh.add_phantom(phantom);
    t.ledger.inject_contention(1);
    assert_eq!(alice.commit_play(PlayAction::Card(phantom)).await, Err(EngineError::Verify(expected)));
    assert_eq!(t.ledger.call_count("commit_play_zk"), 1);

    let view = alice.refresh().await.unwrap();
    assert!(alice.commit_play(choose(&view)).await.unwrap().is_submitted());
}

#[tokio::test]
async fn test_pedersen_commit_nizk_reveal_rejected() {
    let t = table(ProofMode::Pedersen).await;
    t.alice.commit_seed_with(deadbeef_seed()).await.unwrap();
    t.bob.commit_seed().await.unwrap();

    // Rewrite the stored record so the reveal takes the hash-based path.
    let store = SecretStore::new(t.alice_kv.clone());
    let record = store.load_seed(SID, ALICE).unwrap().unwrap();
    let forged = SeedRecord::new(&record.seed().unwrap(), &record.blinding().unwrap(), ProofMode::Nizk);
    store.save_seed(SID, ALICE, &forged).unwrap();

    assert_eq!(
        t.alice.reveal_seed().await,
        Err(EngineError::Verify(VerifyError::ModeMismatch { expected: ProofMode::Pedersen, len: 64 }))
    );
    assert_eq!(t.ledger.call_count("reveal_seed"), 0);
    assert!(store.load_seed(SID, ALICE).unwrap().is_some());

    // Restoring the real record lets the reveal through.
    store.save_seed(SID, ALICE, &record).unwrap();
    assert!(t.alice.reveal_seed().await.unwrap().is_submitted());
}

#[tokio::test]
async fn test_zero_seed_rejected_before_submission() {
    let t = table(ProofMode::Pedersen).await;

    let err = t.alice.commit_seed_with([0u8; 32]).await.unwrap_err();
    assert_eq!(err, EngineError::Proof(ProofError::WeakSeed));
    assert_eq!(t.ledger.call_count("commit_seed"), 0);
    assert!(t.alice_kv.is_empty());

    let outcome = t.alice.commit_seed_with(deadbeef_seed()).await.unwrap();
    assert_eq!(outcome, ActionOutcome::Submitted { attempts: 1 });
}

#[tokio::test]
async fn test_concurrent_action_is_skipped() {
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.start_game(SID, ALICE, BOB).await.unwrap();
    let alice = SessionOrchestrator::new(
        SessionContext::new(SID, ALICE),
        ledger.clone(),
        Arc::new(SlowRefresh(ledger.clone())),
        SecretStore::new(Arc::new(MemoryStore::new())),
    );

    let (first, second) = tokio::join!(alice.commit_seed(), alice.commit_seed());
    assert!(first.unwrap().is_submitted());
    assert_eq!(second.unwrap(), ActionOutcome::Skipped);
    assert_eq!(ledger.call_count("commit_seed"), 1);
}

#[tokio::test]
async fn test_auto_reveal_is_idempotent() {
    let t = table(ProofMode::Nizk).await;
    t.alice.commit_seed().await.unwrap();
    assert_eq!(t.alice.poll_once().await.unwrap(), ActionOutcome::NotNeeded);
    t.bob.commit_seed().await.unwrap();

    assert!(t.alice.poll_once().await.unwrap().is_submitted());
    assert_eq!(t.alice.poll_once().await.unwrap(), ActionOutcome::NotNeeded);
    assert_eq!(t.ledger.call_count("reveal_seed"), 1);

    assert!(t.bob.poll_once().await.unwrap().is_submitted());
    for p in [&t.alice, &t.bob] {
        let view = p.refresh().await.unwrap();
        p.commit_play(choose(&view)).await.unwrap();
    }
    assert!(t.alice.poll_once().await.unwrap().is_submitted());
    assert_eq!(t.alice.poll_once().await.unwrap(), ActionOutcome::NotNeeded);
    assert_eq!(t.ledger.call_count("reveal_play"), 1);
}

#[tokio::test]
async fn test_noir_verify_failure_stops_before_reveal() {
    let verifier = Arc::new(EchoBackend::default());
    verifier.reject_all(true);
    let verifier_backend: Arc<dyn CircuitBackend> = verifier.clone();
    let ledger_bridge = Arc::new(NoirBridge::new(
        ArtifactSource::Inline(Box::new(sample_artifact().unwrap())),
        verifier_backend,
    ));
    let prover = Arc::new(NoirBridge::new(
        ArtifactSource::Inline(Box::new(sample_artifact().unwrap())),
        Arc::new(EchoBackend::default()),
    ));

    let t = table_with(
        InMemoryLedger::new().with_circuit_verifier(ledger_bridge),
        SessionContext::new(SID, ALICE),
        SessionContext::new(SID, BOB).with_proof_mode(ProofMode::Noir),
    )
    .await;
    let bob = player(&t.ledger, SessionContext::new(SID, BOB).with_proof_mode(ProofMode::Noir), Arc::new(MemoryStore::new()))
        .with_circuit_bridge(prover);

    t.alice.commit_seed().await.unwrap();
    bob.commit_seed().await.unwrap();

    assert_eq!(
        bob.reveal_seed().await,
        Err(EngineError::Ledger(LedgerError::Contract(ContractError::UltraHonkVerificationFailed)))
    );
    assert_eq!(t.ledger.call_count("verify_noir_seed"), 1);
    assert_eq!(t.ledger.call_count("reveal_seed"), 0);
    assert_eq!(verifier.verifications(), 1);

    verifier.reject_all(false);
    assert!(bob.reveal_seed().await.unwrap().is_submitted());
    assert_eq!(t.ledger.call_count("reveal_seed"), 1);
}

#[tokio::test]
async fn test_circuit_proof_checked_before_ledger() {
    let backend = Arc::new(EchoBackend::default());
    let prover_backend: Arc<dyn CircuitBackend> = backend.clone();
    let prover = Arc::new(NoirBridge::new(
        ArtifactSource::Inline(Box::new(sample_artifact().unwrap())),
        prover_backend,
    ));
    let t = table(ProofMode::Nizk).await;
    let bob = player(&t.ledger, SessionContext::new(SID, BOB).with_proof_mode(ProofMode::Noir), Arc::new(MemoryStore::new()))
        .with_circuit_bridge(prover);

    t.alice.commit_seed().await.unwrap();
    bob.commit_seed().await.unwrap();

    backend.reject_all(true);
    assert_eq!(bob.reveal_seed().await, Err(EngineError::Verify(VerifyError::CircuitRejected)));
    assert_eq!(backend.verifications(), 1);
    assert_eq!(t.ledger.call_count("verify_noir_seed"), 0);
    assert_eq!(t.ledger.call_count("reveal_seed"), 0);
}

#[tokio::test]
async fn test_bot_session_commits_plain_plays() {
    let t = dealt_table(
        SessionContext::new(SID, ALICE).against_bot(true),
        SessionContext::new(SID, BOB).with_zk_plays(false),
    )
    .await;

    for p in [&t.alice, &t.bob] {
        let view = p.refresh().await.unwrap();
        assert!(p.commit_play(choose(&view)).await.unwrap().is_submitted());
    }
    assert_eq!(t.ledger.call_count("commit_play"), 2);
    assert_eq!(t.ledger.call_count("commit_play_zk"), 0);
    assert_eq!(t.ledger.call_count("commit_cangkul_zk"), 0);

    assert!(t.alice.reveal_play().await.unwrap().is_submitted());
    assert!(t.bob.reveal_play().await.unwrap().is_submitted());
}

#[tokio::test]
async fn test_plain_play_checked_before_commit() {
    let t = dealt_table(
        SessionContext::new(SID, ALICE).against_bot(true),
        SessionContext::new(SID, BOB),
    )
    .await;
    let view = t.alice.refresh().await.unwrap();
    let suit = view.trick_suit.unwrap();

    let outside = (0..card::DECK_SIZE).find(|c| !view.my_hand.contains(c)).unwrap();
    assert_eq!(
        t.alice.commit_play(PlayAction::Card(outside)).await,
        Err(EngineError::Proof(ProofError::CardNotInSet(outside)))
    );
    let (action, rejected) = if card::has_suit(&view.my_hand, suit) {
        (PlayAction::Cangkul, ProofError::HandHasSuit(suit))
    } else {
        (PlayAction::Card(view.my_hand[0]), ProofError::CardNotInSet(view.my_hand[0]))
    };
    assert_eq!(t.alice.commit_play(action).await, Err(EngineError::Proof(rejected)));

    assert_eq!(t.ledger.call_count("commit_play"), 0);
    assert!(t.alice_kv.is_empty());
    assert!(t.alice.commit_play(choose(&view)).await.unwrap().is_submitted());
}

#[tokio::test]
async fn test_store_failure_aborts_commit() {
    let t = table(ProofMode::Nizk).await;
    t.alice_kv.fail_writes(true);

    let err = t.alice.commit_seed().await.unwrap_err();
    assert!(matches!(err, EngineError::Store(_)));
    assert_eq!(t.ledger.call_count("commit_seed"), 0);

    t.alice_kv.fail_writes(false);
    assert!(t.alice.commit_seed().await.unwrap().is_submitted());
}

#[tokio::test]
async fn test_timeout_and_forfeit_through_orchestrator() {
    let t = dealt_table(SessionContext::new(SID, ALICE), SessionContext::new(SID, BOB)).await;
    let view = t.alice.refresh().await.unwrap();
    t.alice.commit_play(choose(&view)).await.unwrap();

    // Bob stalls; the ledger allows one tick per gap.
    assert!(t.alice.tick_timeout().await.unwrap().is_submitted());
    assert!(!t.alice.cached_view().unwrap().timeout_ready());
    assert_eq!(
        t.alice.tick_timeout().await,
        Err(EngineError::Ledger(LedgerError::Contract(ContractError::TickTooSoon)))
    );
    t.ledger.advance_ledger(60).await;
    assert!(t.alice.tick_timeout().await.unwrap().is_submitted());
    assert!(t.alice.cached_view().unwrap().timeout_ready());
    assert!(t.alice.resolve_timeout().await.unwrap().is_submitted());

    let view = t.alice.cached_view().unwrap();
    assert!(view.is_finished());
    assert_eq!(view.outcome, Outcome::Player1Won);
    assert_eq!(
        t.bob.forfeit().await,
        Err(EngineError::Ledger(LedgerError::Contract(ContractError::GameAlreadyEnded)))
    );
}
