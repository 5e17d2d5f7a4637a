//! Session Orchestrator
//!
//! Sequences one party's actions against the ledger: builds proofs, checks
//! them locally, persists opening material before anything is submitted,
//! retries contended calls with a fresh nonce, and fires reveals
//! automatically while polling.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::circuit::NoirBridge;
use crate::core::rng::{random_blinding, random_seed};
use crate::core::PlayAction;
use crate::ledger::{LedgerClient, LedgerError, Lifecycle, Outcome, SessionView, StateRefresh, TrickState};
use crate::proof::play::{check_play, prepare_cangkul, prepare_plain, prepare_ring, verify_prepared};
use crate::proof::seed::{commit_seed, prove_seed, verify_seed_reveal};
use crate::proof::{PlayProof, PreparedPlay, ProofContext, ProofMode, VerifyError};
use crate::store::{PlayRecord, SecretStore, SeedRecord};

use super::config::EngineConfig;
use super::context::SessionContext;
use super::retry::Backoff;
use super::{ActionOutcome, EngineError};

/// Default pause between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);

/// Clears the in-flight flag when dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Reveal invoked by the caller, or fired while polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Explicit,
    Auto,
}

/// Drives one party through one ledger session.
pub struct SessionOrchestrator {
    ctx: SessionContext,
    ledger: Arc<dyn LedgerClient>,
    refresh: Arc<dyn StateRefresh>,
    secrets: SecretStore,
    circuit: Option<Arc<NoirBridge>>,
    backoff: Backoff,
    poll_interval: Duration,
    in_flight: AtomicBool,
    view: StdMutex<Option<SessionView>>,
}

impl std::fmt::Debug for SessionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOrchestrator")
            .field("ctx", &self.ctx)
            .field("circuit", &self.circuit.is_some())
            .field("backoff", &self.backoff)
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .finish()
    }
}

impl SessionOrchestrator {
    /// Create an orchestrator with default retry and poll settings.
    pub fn new(
        ctx: SessionContext,
        ledger: Arc<dyn LedgerClient>,
        refresh: Arc<dyn StateRefresh>,
        secrets: SecretStore,
    ) -> Self {
        Self {
            ctx,
            ledger,
            refresh,
            secrets,
            circuit: None,
            backoff: Backoff::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            in_flight: AtomicBool::new(false),
            view: StdMutex::new(None),
        }
    }

    /// Take retry and poll settings from `config`.
    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.backoff = config.backoff();
        self.poll_interval = config.poll_interval();
        self
    }

    /// Override the retry policy.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Override the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Attach the circuit prover used for noir seed reveals.
    pub fn with_circuit_bridge(mut self, bridge: Arc<NoirBridge>) -> Self {
        self.circuit = Some(bridge);
        self
    }

    /// Session this orchestrator acts in.
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Last view fetched from the ledger.
    pub fn cached_view(&self) -> Option<SessionView> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Fetch and cache the current view.
    pub async fn refresh(&self) -> Result<SessionView, EngineError> {
        let view = self
            .refresh
            .fetch_session_view(self.ctx.session_id, &self.ctx.party)
            .await?;
        *self.view.lock().unwrap_or_else(PoisonError::into_inner) = Some(view.clone());
        Ok(view)
    }

    fn try_begin(&self) -> Option<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(&self.in_flight))
    }

    // ========================================================================
    // Seed phase
    // ========================================================================

    /// Commit a freshly generated seed.
    pub async fn commit_seed(&self) -> Result<ActionOutcome, EngineError> {
        self.commit_seed_with(random_seed()).await
    }

    /// Commit `seed`, persisting it and its blinding first.
    #[instrument(skip(self, seed), fields(session = self.ctx.session_id, party = %self.ctx.party, mode = %self.ctx.proof_mode))]
    pub async fn commit_seed_with(&self, seed: [u8; 32]) -> Result<ActionOutcome, EngineError> {
        let Some(_guard) = self.try_begin() else {
            return Ok(ActionOutcome::Skipped);
        };
        let view = self.refresh().await?;
        if !view.awaiting_my_seed_commit() {
            debug!(lifecycle = ?view.lifecycle, "seed commit not needed");
            return Ok(ActionOutcome::NotNeeded);
        }

        let mode = self.ctx.proof_mode;
        let blinding = random_blinding();
        let commitment = commit_seed(mode, &seed, &blinding, &self.ctx.proof_context())?;
        self.secrets
            .save_seed(self.ctx.session_id, &self.ctx.party, &SeedRecord::new(&seed, &blinding, mode))?;

        let (sid, party, ledger) = (self.ctx.session_id, self.ctx.party.as_str(), &self.ledger);
        let commit_hash = commitment.commit_hash;
        let attempts = self
            .submit("commit_seed", |_| async move { ledger.commit_seed(sid, party, commit_hash).await })
            .await?;
        info!(attempts, commit = %hex::encode(&commit_hash[..8]), "seed committed");
        Ok(ActionOutcome::Submitted { attempts })
    }

    /// Reveal the persisted seed.
    ///
    /// A missing record is [`EngineError::SecretLost`]; the timeout protocol
    /// is the only way forward from there.
    #[instrument(skip(self), fields(session = self.ctx.session_id, party = %self.ctx.party))]
    pub async fn reveal_seed(&self) -> Result<ActionOutcome, EngineError> {
        let Some(_guard) = self.try_begin() else {
            return Ok(ActionOutcome::Skipped);
        };
        let view = self.refresh().await?;
        self.reveal_seed_inner(&view, Trigger::Explicit).await
    }

    async fn reveal_seed_inner(&self, view: &SessionView, trigger: Trigger) -> Result<ActionOutcome, EngineError> {
        if !view.awaiting_my_seed_reveal() {
            return Ok(ActionOutcome::NotNeeded);
        }
        let (sid, party) = (self.ctx.session_id, self.ctx.party.as_str());
        let Some(record) = self.secrets.load_seed(sid, party)? else {
            return self.secret_missing("seed", trigger);
        };
        let seed = record.seed()?;
        let blinding = record.blinding()?;
        let mode = record.proof_mode;
        let proof_ctx = self.ctx.proof_context();
        // What this session committed, rebuilt from the stored opening.
        let committed = commit_seed(mode, &seed, &blinding, &proof_ctx)?;
        let ledger = &self.ledger;

        let attempts = match mode {
            ProofMode::Noir => {
                let bridge = self.circuit.as_ref().ok_or(EngineError::CircuitUnavailable)?;
                let seed_hash = committed.seed_hash;
                let noir = bridge.prove_knowledge(&seed, &seed_hash).await?;
                info!(proof_len = noir.proof.len(), elapsed_ms = noir.elapsed_ms, "circuit seed proof ready");

                let proof = &noir.proof;
                checked(
                    "seed reveal",
                    verify_seed_reveal(self.ctx.proof_mode, &committed.commit_hash, &seed_hash, proof, &proof_ctx),
                )?;
                if !bridge.verify_seed_proof(&seed_hash, proof).await? {
                    checked("seed reveal", Err(VerifyError::CircuitRejected))?;
                }
                let verified = self
                    .submit("verify_noir_seed", |_| async move {
                        ledger.verify_noir_seed(sid, party, seed_hash, proof.clone()).await
                    })
                    .await?;
                let revealed = self
                    .submit("reveal_seed", |_| async move {
                        ledger.reveal_seed(sid, party, seed_hash, Vec::new()).await
                    })
                    .await?;
                verified + revealed
            }
            ProofMode::Nizk | ProofMode::Pedersen => {
                let reveal = prove_seed(mode, &seed, &blinding, &proof_ctx)?;
                let (seed_hash, proof) = (reveal.seed_hash, &reveal.proof);
                checked(
                    "seed reveal",
                    verify_seed_reveal(self.ctx.proof_mode, &committed.commit_hash, &seed_hash, proof, &proof_ctx),
                )?;
                self.submit("reveal_seed", |_| async move {
                    ledger.reveal_seed(sid, party, seed_hash, proof.clone()).await
                })
                .await?
            }
        };

        self.secrets.clear_seed(sid, party)?;
        info!(attempts, %mode, ?trigger, "seed revealed");
        Ok(ActionOutcome::Submitted { attempts })
    }

    // ========================================================================
    // Trick phase
    // ========================================================================

    /// Commit a card or a cangkul for the open trick.
    ///
    /// ZK sessions commit cards with a ring proof over the cards that follow
    /// the trick suit, and cangkul with an exclusion proof over the hand.
    #[instrument(skip(self), fields(session = self.ctx.session_id, party = %self.ctx.party))]
    pub async fn commit_play(&self, action: PlayAction) -> Result<ActionOutcome, EngineError> {
        let Some(_guard) = self.try_begin() else {
            return Ok(ActionOutcome::Skipped);
        };
        let view = self.refresh().await?;
        if view.lifecycle == Lifecycle::Playing && view.trick_state == TrickState::None {
            return Err(EngineError::NoTrick);
        }
        if !view.awaiting_my_play_commit() {
            return Ok(ActionOutcome::NotNeeded);
        }

        let suit = view.trick_suit.ok_or(EngineError::NoTrick)?;
        check_play(action, &view.my_hand, suit)?;

        let ctx = self.ctx.proof_context();
        let prepared = if self.ctx.use_zk_plays() {
            match action {
                PlayAction::Card(card) => prepare_ring(card, &view.valid_set(), &ctx)?,
                PlayAction::Cangkul => prepare_cangkul(&view.my_hand, suit, &ctx)?,
            }
        } else {
            prepare_plain(action)
        };

        let (sid, party) = (self.ctx.session_id, self.ctx.party.as_str());
        self.secrets
            .save_play(sid, party, &PlayRecord::new(action, &prepared.salt, prepared.proof.is_zk()))?;

        // Runs against the view of every attempt, retries included.
        let check = |view: &SessionView| check_prepared(&prepared, view, &ctx);
        let ledger = &self.ledger;
        let commit_hash = prepared.commit_hash;
        let attempts = match &prepared.proof {
            PlayProof::Plain => {
                self.submit_checked("commit_play", check, |nonce| async move {
                    ledger.commit_play(sid, party, commit_hash, nonce).await
                })
                .await?
            }
            PlayProof::Ring { proof, .. } => {
                self.submit_checked("commit_play_zk", check, |nonce| async move {
                    ledger.commit_play_zk(sid, party, commit_hash, nonce, proof.clone()).await
                })
                .await?
            }
            PlayProof::Aggregate { proof } => {
                self.submit_checked("commit_cangkul_zk", check, |nonce| async move {
                    ledger.commit_cangkul_zk(sid, party, commit_hash, nonce, proof.clone()).await
                })
                .await?
            }
        };
        info!(attempts, zk = prepared.proof.is_zk(), "play committed");
        Ok(ActionOutcome::Submitted { attempts })
    }

    /// Reveal the persisted play.
    #[instrument(skip(self), fields(session = self.ctx.session_id, party = %self.ctx.party))]
    pub async fn reveal_play(&self) -> Result<ActionOutcome, EngineError> {
        let Some(_guard) = self.try_begin() else {
            return Ok(ActionOutcome::Skipped);
        };
        let view = self.refresh().await?;
        self.reveal_play_inner(&view, Trigger::Explicit).await
    }

    async fn reveal_play_inner(&self, view: &SessionView, trigger: Trigger) -> Result<ActionOutcome, EngineError> {
        if !view.awaiting_my_play_reveal() {
            return Ok(ActionOutcome::NotNeeded);
        }
        let (sid, party) = (self.ctx.session_id, self.ctx.party.as_str());
        let Some(record) = self.secrets.load_play(sid, party)? else {
            return self.secret_missing("play", trigger);
        };
        let action = record.action();
        let salt = record.salt()?;
        let ledger = &self.ledger;
        let attempts = self
            .submit("reveal_play", |_| async move { ledger.reveal_play(sid, party, action, salt).await })
            .await?;

        self.secrets.clear_play(sid, party)?;
        info!(attempts, ?action, ?trigger, "play revealed");
        Ok(ActionOutcome::Submitted { attempts })
    }

    fn secret_missing(&self, kind: &'static str, trigger: Trigger) -> Result<ActionOutcome, EngineError> {
        match trigger {
            Trigger::Explicit => Err(EngineError::SecretLost { kind, session_id: self.ctx.session_id }),
            Trigger::Auto => {
                warn!(session = self.ctx.session_id, kind, "no stored secret to auto-reveal");
                Ok(ActionOutcome::NotNeeded)
            }
        }
    }

    // ========================================================================
    // Timeouts
    // ========================================================================

    /// Push the action nonce toward the deadline.
    #[instrument(skip(self), fields(session = self.ctx.session_id, party = %self.ctx.party))]
    pub async fn tick_timeout(&self) -> Result<ActionOutcome, EngineError> {
        let Some(_guard) = self.try_begin() else {
            return Ok(ActionOutcome::Skipped);
        };
        let (sid, party, ledger) = (self.ctx.session_id, self.ctx.party.as_str(), &self.ledger);
        let attempts = self
            .submit("tick_timeout", |_| async move {
                ledger.tick_timeout(sid, party).await.map(|nonce| debug!(nonce, "nonce ticked"))
            })
            .await?;
        self.refresh().await?;
        Ok(ActionOutcome::Submitted { attempts })
    }

    /// Settle a stalled game in favour of whoever is not holding it up.
    #[instrument(skip(self), fields(session = self.ctx.session_id, party = %self.ctx.party))]
    pub async fn resolve_timeout(&self) -> Result<ActionOutcome, EngineError> {
        let Some(_guard) = self.try_begin() else {
            return Ok(ActionOutcome::Skipped);
        };
        let (sid, party, ledger) = (self.ctx.session_id, self.ctx.party.as_str(), &self.ledger);
        let attempts = self
            .submit("resolve_timeout", |_| async move { ledger.resolve_timeout(sid, party).await })
            .await?;
        let view = self.refresh().await?;
        info!(outcome = ?view.outcome, "timeout resolved");
        Ok(ActionOutcome::Submitted { attempts })
    }

    /// Concede the game and drop any stored secrets.
    #[instrument(skip(self), fields(session = self.ctx.session_id, party = %self.ctx.party))]
    pub async fn forfeit(&self) -> Result<ActionOutcome, EngineError> {
        let Some(_guard) = self.try_begin() else {
            return Ok(ActionOutcome::Skipped);
        };
        let (sid, party, ledger) = (self.ctx.session_id, self.ctx.party.as_str(), &self.ledger);
        let attempts = self
            .submit("forfeit", |_| async move { ledger.forfeit(sid, party).await })
            .await?;
        self.secrets.clear_seed(sid, party)?;
        self.secrets.clear_play(sid, party)?;
        self.refresh().await?;
        info!("forfeited");
        Ok(ActionOutcome::Submitted { attempts })
    }

    // ========================================================================
    // Polling
    // ========================================================================

    /// One poll step: refresh, then fire any reveal the ledger waits on.
    pub async fn poll_once(&self) -> Result<ActionOutcome, EngineError> {
        let Some(_guard) = self.try_begin() else {
            return Ok(ActionOutcome::Skipped);
        };
        let view = self.refresh().await?;
        if view.awaiting_my_seed_reveal() {
            return self.reveal_seed_inner(&view, Trigger::Auto).await;
        }
        if view.awaiting_my_play_reveal() {
            return self.reveal_play_inner(&view, Trigger::Auto).await;
        }
        Ok(ActionOutcome::NotNeeded)
    }

    /// Poll until the game finishes or `shutdown` flips to `true`.
    ///
    /// Poll errors are logged and the loop carries on.
    #[instrument(skip(self, shutdown), fields(session = self.ctx.session_id, party = %self.ctx.party))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<Outcome, EngineError> {
        loop {
            if *shutdown.borrow() {
                info!("shutdown requested");
                break;
            }
            if let Err(e) = self.poll_once().await {
                warn!(error = %e, "poll failed");
            }
            if self.cached_view().is_some_and(|v| v.is_finished()) {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        Ok(self.cached_view().map(|v| v.outcome).unwrap_or(Outcome::Undecided))
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Run `call` with the last known nonce, retrying contended attempts.
    ///
    /// Returns the number of attempts used.
    async fn submit<F, Fut>(&self, action: &'static str, call: F) -> Result<u32, EngineError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<(), LedgerError>>,
    {
        self.submit_checked(action, |_| Ok(()), call).await
    }

    /// [`Self::submit`], running `check` on the view before every attempt.
    async fn submit_checked<C, F, Fut>(&self, action: &'static str, check: C, mut call: F) -> Result<u32, EngineError>
    where
        C: Fn(&SessionView) -> Result<(), EngineError>,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<(), LedgerError>>,
    {
        let mut view = match self.cached_view() {
            Some(view) => view,
            None => self.refresh().await?,
        };
        let mut attempt = 1;
        loop {
            check(&view)?;
            let nonce = view.action_nonce;
            match call(nonce).await {
                Ok(()) => return Ok(attempt),
                Err(e) if e.is_contention() && self.backoff.allows_retry_after(attempt) => {
                    warn!(action, attempt, nonce, error = %e, "contended, retrying");
                    self.backoff.sleep(attempt).await;
                    view = self.refresh().await?;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(action, attempt, error = %e, "submission failed");
                    return Err(e.into());
                }
            }
        }
    }
}

/// Surface a failed local verification instead of submitting.
fn checked(what: &'static str, result: Result<(), VerifyError>) -> Result<(), EngineError> {
    result.map_err(|e| {
        warn!(what, error = %e, "local verification failed");
        EngineError::Verify(e)
    })
}

/// Does `play` still hold against `view`?
fn check_prepared(play: &PreparedPlay, view: &SessionView, ctx: &ProofContext<'_>) -> Result<(), EngineError> {
    let suit = view.trick_suit.ok_or(EngineError::NoTrick)?;
    checked("play commit", verify_prepared(play, &view.my_hand, suit, ctx))?;
    check_play(play.action, &view.my_hand, suit)?;
    Ok(())
}
