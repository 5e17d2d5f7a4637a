//! In-Process Ledger
//!
//! Keeps every session in memory and applies the deployed game contract's
//! rules: phase checks, the action-nonce guard, commitment openings, proof
//! verification, the seeded shuffle, trick resolution and timeouts.
//!
//! Built for tests and for the demo binary behind the `test-ledger`
//! feature. Fault injection ([`InMemoryLedger::inject_contention`]) and
//! per-call counters make the orchestrator's retry path observable.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::circuit::NoirBridge;
use crate::core::card::{self, CardId, PlayAction, DECK_SIZE};
use crate::core::hash::{distinct_byte_count, keccak256_concat, Hash32, MIN_DISTINCT_HASH_BYTES};
use crate::proof::hand::verify_exclusion;
use crate::proof::mode::{classify_play_proof, classify_seed_proof, PlayProofKind, SeedProofKind};
use crate::proof::play::opens_play;
use crate::proof::ring::verify_membership;
use crate::proof::seed::{verify_circuit_binding, verify_seed_reveal};
use crate::proof::ProofContext;

use super::errors::{ContractError, LedgerError};
use super::view::{Lifecycle, Outcome, SessionView, Slot, TrickState};
use super::{LedgerClient, StateRefresh};

/// Actions after the last state change before a timeout may be claimed.
pub const TIMEOUT_ACTIONS: u32 = 2;

/// Ledgers after the last state change before a timeout may be claimed.
pub const TIMEOUT_LEDGERS: u32 = 120;

/// Minimum ledger gap between two `tick_timeout` calls on one session.
pub const MIN_TICK_GAP_LEDGERS: u32 = 60;

/// Ledger sequence a fresh [`InMemoryLedger`] starts at.
pub const GENESIS_LEDGER: u32 = 1000;

/// Cards dealt to each player.
pub const HAND_SIZE: usize = 5;

#[derive(Debug, Clone, Default)]
struct Seat {
    address: String,
    seed_commit: Option<Hash32>,
    seed_hash: Option<Hash32>,
    seed_revealed: bool,
    hand: Vec<CardId>,
    play_commit: Option<Hash32>,
    zk_play: bool,
    trick_card: Option<CardId>,
    tricks_won: u32,
}

impl Seat {
    fn new(address: &str) -> Self {
        Self { address: address.to_string(), ..Self::default() }
    }

    fn clear_trick(&mut self) {
        self.play_commit = None;
        self.zk_play = false;
        self.trick_card = None;
    }

    /// Sum of face values, `id % 9 + 2` per card.
    fn hand_value(&self) -> u32 {
        self.hand.iter().map(|c| card::value_of(*c)).sum()
    }
}

#[derive(Debug, Clone)]
struct Game {
    seats: [Seat; 2],
    lifecycle: Lifecycle,
    trick_state: TrickState,
    draw_pile: Vec<CardId>,
    flipped_card: Option<CardId>,
    trick_suit: Option<u32>,
    action_nonce: u32,
    deadline_nonce: Option<u32>,
    deadline_ledger: Option<u32>,
    last_tick_ledger: u32,
    outcome: Outcome,
}

impl Game {
    fn new(player1: &str, player2: &str) -> Self {
        Self {
            seats: [Seat::new(player1), Seat::new(player2)],
            lifecycle: Lifecycle::SeedCommit,
            trick_state: TrickState::None,
            draw_pile: Vec::new(),
            flipped_card: None,
            trick_suit: None,
            action_nonce: 0,
            deadline_nonce: None,
            deadline_ledger: None,
            last_tick_ledger: 0,
            outcome: Outcome::Undecided,
        }
    }

    fn seat(&self, slot: Slot) -> &Seat {
        &self.seats[slot.index()]
    }

    fn seat_mut(&mut self, slot: Slot) -> &mut Seat {
        &mut self.seats[slot.index()]
    }

    fn slot_of(&self, party: &str) -> Result<Slot, ContractError> {
        if self.seats[0].address == party {
            Ok(Slot::Player1)
        } else if self.seats[1].address == party {
            Ok(Slot::Player2)
        } else {
            Err(ContractError::NotAPlayer)
        }
    }

    fn require_lifecycle(&self, expected: Lifecycle) -> Result<(), ContractError> {
        if self.lifecycle != expected {
            return Err(ContractError::WrongPhase);
        }
        Ok(())
    }

    fn require_active(&self) -> Result<(), ContractError> {
        if self.lifecycle == Lifecycle::Finished {
            return Err(ContractError::GameAlreadyEnded);
        }
        Ok(())
    }

    fn require_nonce(&self, expected_nonce: u32) -> Result<(), ContractError> {
        if expected_nonce != self.action_nonce {
            return Err(ContractError::InvalidNonce);
        }
        Ok(())
    }

    fn require_commit_turn(&self, slot: Slot) -> Result<(), ContractError> {
        if !self.trick_state.awaits_commit(slot) {
            return Err(ContractError::NotYourTurn);
        }
        if self.seat(slot).play_commit.is_some() {
            return Err(ContractError::PlayCommitAlreadySubmitted);
        }
        Ok(())
    }

    fn bump_nonce(&mut self) {
        self.action_nonce = self.action_nonce.saturating_add(1);
    }

    fn reset_deadline(&mut self, ledger: u32) {
        self.deadline_nonce = Some(self.action_nonce.saturating_add(TIMEOUT_ACTIONS));
        self.deadline_ledger = Some(ledger.saturating_add(TIMEOUT_LEDGERS));
    }

    // -------------------------------------------------------------------------
    // Deal and tricks
    // -------------------------------------------------------------------------

    /// Fisher-Yates over `keccak256(seed_hash1 ‖ seed_hash2 ‖ session_be4)`.
    fn shuffle_and_deal(&mut self, session_id: u32) {
        let (Some(sh1), Some(sh2)) = (self.seats[0].seed_hash, self.seats[1].seed_hash) else {
            return;
        };
        let seed = keccak256_concat(&[&sh1[..], &sh2[..], &session_id.to_be_bytes()[..]]);
        let mut rng = StdRng::from_seed(seed);

        let mut deck: Vec<CardId> = (0..DECK_SIZE).collect();
        for idx in (1..deck.len()).rev() {
            let j = rng.gen_range(0..=idx);
            deck.swap(idx, j);
        }

        self.seats[0].hand = deck[..HAND_SIZE].to_vec();
        self.seats[1].hand = deck[HAND_SIZE..2 * HAND_SIZE].to_vec();
        self.draw_pile = deck[2 * HAND_SIZE..].to_vec();
    }

    fn flip_next_card(&mut self) {
        if self.draw_pile.is_empty() {
            return;
        }
        let flipped = self.draw_pile.remove(0);
        self.flipped_card = Some(flipped);
        self.trick_suit = Some(card::suit_of(flipped));
        for seat in &mut self.seats {
            seat.clear_trick();
        }
        self.trick_state = TrickState::CommitWaitBoth;
    }

    fn advance_commit(&mut self, slot: Slot) {
        self.trick_state = match (self.trick_state, slot) {
            (TrickState::CommitWaitBoth, Slot::Player1) => TrickState::CommitWaitP2,
            (TrickState::CommitWaitBoth, Slot::Player2) => TrickState::CommitWaitP1,
            _ => TrickState::RevealWaitBoth,
        };
    }

    fn advance_reveal(&mut self, slot: Slot) {
        self.trick_state = match (self.trick_state, slot) {
            (TrickState::RevealWaitBoth, Slot::Player1) => TrickState::RevealWaitP2,
            (TrickState::RevealWaitBoth, Slot::Player2) => TrickState::RevealWaitP1,
            _ => TrickState::None,
        };
    }

    fn give_penalty_card(&mut self, slot: Slot) {
        if self.draw_pile.is_empty() {
            return;
        }
        let penalty = self.draw_pile.remove(0);
        self.seat_mut(slot).hand.push(penalty);
    }

    fn resolve_trick(&mut self, ledger: u32) {
        let cards = (self.seats[0].trick_card, self.seats[1].trick_card);
        let winner = match cards {
            // Higher face wins; the lead takes ties.
            (Some(c1), Some(c2)) => Some(if card::value_of(c1) >= card::value_of(c2) { Slot::Player1 } else { Slot::Player2 }),
            (Some(_), None) => {
                self.give_penalty_card(Slot::Player2);
                Some(Slot::Player1)
            }
            (None, Some(_)) => {
                self.give_penalty_card(Slot::Player1);
                Some(Slot::Player2)
            }
            (None, None) => None,
        };
        if let Some(slot) = winner {
            self.seat_mut(slot).tricks_won += 1;
        }
        debug!(?winner, card1 = ?cards.0, card2 = ?cards.1, "trick resolved");

        self.flipped_card = None;
        self.trick_suit = None;
        for seat in &mut self.seats {
            seat.clear_trick();
        }

        if self.seats.iter().any(|s| s.hand.is_empty()) || self.draw_pile.is_empty() {
            let outcome = self.determine_winner();
            self.finalize(outcome);
            return;
        }

        self.flip_next_card();
        self.reset_deadline(ledger);
    }

    fn determine_winner(&self) -> Outcome {
        let [p1, p2] = &self.seats;
        let (len1, len2) = (p1.hand.len(), p2.hand.len());

        if len1 == 0 && len2 > 0 {
            return Outcome::Player1Won;
        }
        if len2 == 0 && len1 > 0 {
            return Outcome::Player2Won;
        }
        if p1.tricks_won != p2.tricks_won {
            return if p1.tricks_won > p2.tricks_won { Outcome::Player1Won } else { Outcome::Player2Won };
        }
        if len1 != len2 {
            return if len1 < len2 { Outcome::Player1Won } else { Outcome::Player2Won };
        }
        let (sum1, sum2) = (p1.hand_value(), p2.hand_value());
        match sum1.cmp(&sum2) {
            std::cmp::Ordering::Less => Outcome::Player1Won,
            std::cmp::Ordering::Greater => Outcome::Player2Won,
            std::cmp::Ordering::Equal => Outcome::Draw,
        }
    }

    fn timeout_outcome(&self) -> Result<Outcome, ContractError> {
        let [p1, p2] = &self.seats;
        match self.lifecycle {
            Lifecycle::SeedCommit => match (p1.seed_commit.is_some(), p2.seed_commit.is_some()) {
                (true, false) => Ok(Outcome::Player1Won),
                (false, true) => Ok(Outcome::Player2Won),
                _ => Err(ContractError::TimeoutNotApplicable),
            },
            Lifecycle::SeedReveal => match (p1.seed_revealed, p2.seed_revealed) {
                (true, false) => Ok(Outcome::Player1Won),
                (false, true) => Ok(Outcome::Player2Won),
                (false, false) => Ok(Outcome::Draw),
                (true, true) => Err(ContractError::TimeoutNotApplicable),
            },
            Lifecycle::Playing => match self.trick_state {
                TrickState::CommitWaitP1 | TrickState::RevealWaitP1 => Ok(Outcome::Player2Won),
                TrickState::CommitWaitP2 | TrickState::RevealWaitP2 => Ok(Outcome::Player1Won),
                TrickState::CommitWaitBoth | TrickState::RevealWaitBoth => Ok(self.determine_winner()),
                TrickState::None => Err(ContractError::TimeoutNotApplicable),
            },
            Lifecycle::Finished => Err(ContractError::TimeoutNotApplicable),
        }
    }

    fn finalize(&mut self, outcome: Outcome) {
        info!(?outcome, tricks = ?[self.seats[0].tricks_won, self.seats[1].tricks_won], "game finished");
        self.outcome = outcome;
        self.lifecycle = Lifecycle::Finished;
        self.deadline_nonce = None;
        self.deadline_ledger = None;
    }

    fn view_for(&self, session_id: u32, slot: Slot, current_ledger: u32) -> SessionView {
        let [p1, p2] = &self.seats;
        SessionView {
            session_id,
            my_slot: slot,
            lifecycle: self.lifecycle,
            trick_state: self.trick_state,
            seed_committed: [p1.seed_commit.is_some(), p2.seed_commit.is_some()],
            seed_revealed: [p1.seed_revealed, p2.seed_revealed],
            play_committed: [p1.play_commit.is_some(), p2.play_commit.is_some()],
            my_hand: self.seat(slot).hand.clone(),
            opponent_hand_size: self.seat(slot.other()).hand.len(),
            draw_pile_size: self.draw_pile.len(),
            flipped_card: self.flipped_card,
            trick_suit: self.trick_suit,
            tricks_won: [p1.tricks_won, p2.tricks_won],
            action_nonce: self.action_nonce,
            deadline_nonce: self.deadline_nonce,
            deadline_ledger: self.deadline_ledger,
            current_ledger,
            outcome: self.outcome,
        }
    }
}

fn check_seed_hash_entropy(seed_hash: &Hash32) -> Result<(), ContractError> {
    if distinct_byte_count(seed_hash) < MIN_DISTINCT_HASH_BYTES {
        return Err(ContractError::WeakSeedEntropy);
    }
    Ok(())
}

#[derive(Debug)]
struct LedgerState {
    games: HashMap<u32, Game>,
    sequence: u32,
    /// Circuit proofs verified ahead of a zero-length reveal.
    noir_flags: HashMap<(u32, Slot), Hash32>,
}

/// Proof attached to a play commit.
#[derive(Debug, Clone, Copy)]
enum PlayCommitProof<'a> {
    Plain,
    Ring(&'a [u8]),
    Cangkul(&'a [u8]),
}

impl PlayCommitProof<'_> {
    fn call(self) -> &'static str {
        match self {
            Self::Plain => "commit_play",
            Self::Ring(_) => "commit_play_zk",
            Self::Cangkul(_) => "commit_cangkul_zk",
        }
    }

    fn is_zk(self) -> bool {
        !matches!(self, Self::Plain)
    }
}

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process ledger.
#[derive(Debug)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
    circuit_verifier: Option<Arc<NoirBridge>>,
    pending_contention: AtomicU32,
    calls: StdMutex<HashMap<&'static str, usize>>,
    play_nonces: StdMutex<Vec<u32>>,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    /// Empty ledger at [`GENESIS_LEDGER`], without a circuit verifier.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState {
                games: HashMap::new(),
                sequence: GENESIS_LEDGER,
                noir_flags: HashMap::new(),
            }),
            circuit_verifier: None,
            pending_contention: AtomicU32::new(0),
            calls: StdMutex::new(HashMap::new()),
            play_nonces: StdMutex::new(Vec::new()),
        }
    }

    /// Verify circuit seed proofs through `bridge`.
    pub fn with_circuit_verifier(mut self, bridge: Arc<NoirBridge>) -> Self {
        self.circuit_verifier = Some(bridge);
        self
    }

    /// Open a session between two distinct players.
    pub async fn start_game(&self, session_id: u32, player1: &str, player2: &str) -> Result<(), LedgerError> {
        if player1 == player2 {
            return Err(ContractError::SelfPlayNotAllowed.into());
        }
        let mut state = self.state.lock().await;
        if state.games.contains_key(&session_id) {
            return Err(ContractError::SessionAlreadyExists.into());
        }
        state.games.insert(session_id, Game::new(player1, player2));
        info!(session_id, player1, player2, "game started");
        Ok(())
    }

    /// Close `n` more ledgers.
    pub async fn advance_ledger(&self, n: u32) -> u32 {
        let mut state = self.state.lock().await;
        state.sequence = state.sequence.saturating_add(n);
        state.sequence
    }

    /// Current ledger sequence.
    pub async fn current_ledger(&self) -> u32 {
        self.state.lock().await.sequence
    }

    /// Reject the next `n` mutating calls with [`LedgerError::Contention`].
    pub fn inject_contention(&self, n: u32) {
        self.pending_contention.fetch_add(n, Ordering::SeqCst);
    }

    /// How many times `call` was invoked, including rejected attempts.
    pub fn call_count(&self, call: &str) -> usize {
        lock(&self.calls).get(call).copied().unwrap_or(0)
    }

    /// `expected_nonce` of every play commit attempt, in order.
    pub fn submitted_play_nonces(&self) -> Vec<u32> {
        lock(&self.play_nonces).clone()
    }

    fn record(&self, call: &'static str) {
        *lock(&self.calls).entry(call).or_insert(0) += 1;
    }

    /// Count the call and consume one injected contention, if any.
    fn enter(&self, call: &'static str) -> Result<(), LedgerError> {
        self.record(call);
        let injected = self
            .pending_contention
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            debug!(call, "injected contention");
            return Err(LedgerError::Contention(format!("{call}: state footprint conflict")));
        }
        Ok(())
    }

    async fn verify_circuit(&self, seed_hash: &Hash32, proof: &[u8]) -> Result<(), ContractError> {
        let bridge = self
            .circuit_verifier
            .as_ref()
            .ok_or(ContractError::UltraHonkVerifierNotSet)?;
        match bridge.verify_seed_proof(seed_hash, proof).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(ContractError::UltraHonkVerificationFailed),
            Err(e) => {
                warn!(error = %e, "circuit verifier unavailable");
                Err(ContractError::UltraHonkVerificationFailed)
            }
        }
    }

    /// Shared body of the three play-commit calls.
    async fn commit_play_with(
        &self,
        session_id: u32,
        party: &str,
        commit_hash: Hash32,
        expected_nonce: u32,
        proof: PlayCommitProof<'_>,
    ) -> Result<(), LedgerError> {
        lock(&self.play_nonces).push(expected_nonce);
        self.enter(proof.call())?;

        let mut state = self.state.lock().await;
        let ledger = state.sequence;
        let game = state.games.get_mut(&session_id).ok_or(ContractError::GameNotFound)?;
        game.require_lifecycle(Lifecycle::Playing)?;
        game.require_nonce(expected_nonce)?;
        let slot = game.slot_of(party)?;
        game.require_commit_turn(slot)?;

        if proof.is_zk() {
            let suit = game.trick_suit.ok_or(ContractError::NoTrickInProgress)?;
            let hand = &game.seat(slot).hand;
            let ctx = ProofContext::new(session_id, party);
            match proof {
                PlayCommitProof::Ring(bytes) => {
                    let valid_set = card::valid_set(hand, suit);
                    if valid_set.is_empty() {
                        return Err(ContractError::ZkPlaySetEmpty.into());
                    }
                    if !matches!(classify_play_proof(bytes.len()), Some(PlayProofKind::Ring { .. })) {
                        return Err(ContractError::ZkPlayProofInvalid.into());
                    }
                    verify_membership(&commit_hash, &valid_set, bytes, &ctx).map_err(|e| {
                        debug!(error = %e, "ring proof rejected");
                        ContractError::ZkPlayProofInvalid
                    })?;
                }
                PlayCommitProof::Cangkul(bytes) => {
                    if card::has_suit(hand, suit) {
                        return Err(ContractError::HasMatchingSuit.into());
                    }
                    if classify_play_proof(bytes.len()) != Some(PlayProofKind::Aggregate) {
                        return Err(ContractError::ZkCangkulProofInvalid.into());
                    }
                    verify_exclusion(&commit_hash, suit, hand, bytes, &ctx).map_err(|e| {
                        debug!(error = %e, "exclusion proof rejected");
                        ContractError::ZkCangkulProofInvalid
                    })?;
                }
                PlayCommitProof::Plain => {}
            }
        }

        let seat = game.seat_mut(slot);
        seat.play_commit = Some(commit_hash);
        seat.zk_play = proof.is_zk();
        game.advance_commit(slot);
        game.bump_nonce();
        game.reset_deadline(ledger);
        debug!(session_id, ?slot, zk = proof.is_zk(), nonce = game.action_nonce, "play committed");
        Ok(())
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn commit_seed(&self, session_id: u32, party: &str, commit_hash: Hash32) -> Result<(), LedgerError> {
        self.enter("commit_seed")?;
        let mut state = self.state.lock().await;
        let ledger = state.sequence;
        let game = state.games.get_mut(&session_id).ok_or(ContractError::GameNotFound)?;
        game.require_lifecycle(Lifecycle::SeedCommit)?;
        let slot = game.slot_of(party)?;

        let seat = game.seat_mut(slot);
        if seat.seed_commit.is_some() {
            return Err(ContractError::CommitAlreadySubmitted.into());
        }
        seat.seed_commit = Some(commit_hash);
        game.bump_nonce();

        if game.deadline_nonce.is_none() {
            game.reset_deadline(ledger);
        }
        if game.seats.iter().all(|s| s.seed_commit.is_some()) {
            game.lifecycle = Lifecycle::SeedReveal;
            game.reset_deadline(ledger);
        }
        debug!(session_id, ?slot, "seed committed");
        Ok(())
    }

    async fn reveal_seed(
        &self,
        session_id: u32,
        party: &str,
        seed_hash: Hash32,
        proof: Vec<u8>,
    ) -> Result<(), LedgerError> {
        self.enter("reveal_seed")?;
        let mut state = self.state.lock().await;
        let LedgerState { games, sequence, noir_flags } = &mut *state;
        let ledger = *sequence;
        let game = games.get_mut(&session_id).ok_or(ContractError::GameNotFound)?;
        game.require_lifecycle(Lifecycle::SeedReveal)?;
        let slot = game.slot_of(party)?;
        let seat = game.seat(slot);
        if seat.seed_revealed {
            return Err(ContractError::RevealAlreadySubmitted.into());
        }
        let commit_hash = seat.seed_commit.ok_or(ContractError::MissingCommit)?;
        check_seed_hash_entropy(&seed_hash)?;

        let ctx = ProofContext::new(session_id, party);
        match classify_seed_proof(proof.len()) {
            Some(SeedProofKind::PreVerified) => {
                let verified = noir_flags
                    .get(&(session_id, slot))
                    .copied()
                    .ok_or(ContractError::InvalidZkProof)?;
                if verified != seed_hash || verify_circuit_binding(&commit_hash, &seed_hash).is_err() {
                    return Err(ContractError::CommitHashMismatch.into());
                }
                noir_flags.remove(&(session_id, slot));
            }
            Some(kind @ (SeedProofKind::Nizk | SeedProofKind::Pedersen)) => {
                verify_seed_reveal(kind.mode(), &commit_hash, &seed_hash, &proof, &ctx).map_err(|e| {
                    debug!(error = %e, "seed proof rejected");
                    ContractError::InvalidZkProof
                })?;
            }
            Some(SeedProofKind::Circuit) => {
                verify_circuit_binding(&commit_hash, &seed_hash).map_err(|_| ContractError::CommitHashMismatch)?;
                self.verify_circuit(&seed_hash, &proof).await?;
            }
            None => return Err(ContractError::InvalidZkProof.into()),
        }

        let seat = game.seat_mut(slot);
        seat.seed_revealed = true;
        seat.seed_hash = Some(seed_hash);
        game.bump_nonce();
        debug!(session_id, ?slot, proof_len = proof.len(), "seed revealed");

        if game.seats.iter().all(|s| s.seed_revealed) {
            game.shuffle_and_deal(session_id);
            game.lifecycle = Lifecycle::Playing;
            game.flip_next_card();
            game.reset_deadline(ledger);
            info!(session_id, flipped = ?game.flipped_card, "deck shuffled and dealt");
        }
        Ok(())
    }

    async fn verify_noir_seed(
        &self,
        session_id: u32,
        party: &str,
        seed_hash: Hash32,
        proof: Vec<u8>,
    ) -> Result<(), LedgerError> {
        self.enter("verify_noir_seed")?;
        let mut state = self.state.lock().await;
        let LedgerState { games, noir_flags, .. } = &mut *state;
        let game = games.get(&session_id).ok_or(ContractError::GameNotFound)?;
        game.require_lifecycle(Lifecycle::SeedReveal)?;
        let slot = game.slot_of(party)?;
        let seat = game.seat(slot);
        if seat.seed_revealed {
            return Err(ContractError::RevealAlreadySubmitted.into());
        }
        check_seed_hash_entropy(&seed_hash)?;
        let commit_hash = seat.seed_commit.ok_or(ContractError::MissingCommit)?;
        verify_circuit_binding(&commit_hash, &seed_hash).map_err(|_| ContractError::CommitHashMismatch)?;
        if classify_seed_proof(proof.len()) != Some(SeedProofKind::Circuit) {
            return Err(ContractError::InvalidZkProof.into());
        }
        self.verify_circuit(&seed_hash, &proof).await?;

        noir_flags.insert((session_id, slot), seed_hash);
        debug!(session_id, ?slot, "circuit seed proof verified");
        Ok(())
    }

    async fn commit_play(
        &self,
        session_id: u32,
        party: &str,
        commit_hash: Hash32,
        expected_nonce: u32,
    ) -> Result<(), LedgerError> {
        self.commit_play_with(session_id, party, commit_hash, expected_nonce, PlayCommitProof::Plain)
            .await
    }

    async fn commit_play_zk(
        &self,
        session_id: u32,
        party: &str,
        commit_hash: Hash32,
        expected_nonce: u32,
        ring_proof: Vec<u8>,
    ) -> Result<(), LedgerError> {
        self.commit_play_with(session_id, party, commit_hash, expected_nonce, PlayCommitProof::Ring(&ring_proof))
            .await
    }

    async fn commit_cangkul_zk(
        &self,
        session_id: u32,
        party: &str,
        commit_hash: Hash32,
        expected_nonce: u32,
        hand_proof: Vec<u8>,
    ) -> Result<(), LedgerError> {
        self.commit_play_with(session_id, party, commit_hash, expected_nonce, PlayCommitProof::Cangkul(&hand_proof))
            .await
    }

    async fn reveal_play(
        &self,
        session_id: u32,
        party: &str,
        action: PlayAction,
        salt: [u8; 32],
    ) -> Result<(), LedgerError> {
        self.enter("reveal_play")?;
        let mut state = self.state.lock().await;
        let ledger = state.sequence;
        let game = state.games.get_mut(&session_id).ok_or(ContractError::GameNotFound)?;
        game.require_lifecycle(Lifecycle::Playing)?;
        let slot = game.slot_of(party)?;
        if !game.trick_state.awaits_reveal(slot) {
            return Err(ContractError::NotYourTurn.into());
        }
        let seat = game.seat(slot);
        let commit = seat.play_commit.ok_or(ContractError::PlayCommitMissing)?;
        if !opens_play(&commit, action, &salt, seat.zk_play, &seat.hand) {
            let mismatch = if seat.zk_play {
                ContractError::ZkPlayOpeningMismatch
            } else {
                ContractError::PlayRevealMismatch
            };
            return Err(mismatch.into());
        }

        let suit = game.trick_suit.ok_or(ContractError::NoTrickInProgress)?;
        match action {
            PlayAction::Cangkul => {
                if card::has_suit(&game.seat(slot).hand, suit) {
                    return Err(ContractError::HasMatchingSuit.into());
                }
            }
            PlayAction::Card(card_id) => {
                if !card::is_valid_card(card_id) {
                    return Err(ContractError::InvalidCardId.into());
                }
                let pos = game
                    .seat(slot)
                    .hand
                    .iter()
                    .position(|c| *c == card_id)
                    .ok_or(ContractError::CardNotInHand)?;
                if card::suit_of(card_id) != suit {
                    return Err(ContractError::WrongSuit.into());
                }
                let seat = game.seat_mut(slot);
                seat.hand.remove(pos);
                seat.trick_card = Some(card_id);
            }
        }

        game.advance_reveal(slot);
        game.bump_nonce();
        debug!(session_id, ?slot, ?action, "play revealed");
        if game.trick_state == TrickState::None {
            game.resolve_trick(ledger);
        } else {
            game.reset_deadline(ledger);
        }
        Ok(())
    }

    async fn tick_timeout(&self, session_id: u32, caller: &str) -> Result<u32, LedgerError> {
        self.enter("tick_timeout")?;
        let mut state = self.state.lock().await;
        let ledger = state.sequence;
        let game = state.games.get_mut(&session_id).ok_or(ContractError::GameNotFound)?;
        game.require_active()?;
        game.slot_of(caller)?;
        if ledger < game.last_tick_ledger.saturating_add(MIN_TICK_GAP_LEDGERS) {
            return Err(ContractError::TickTooSoon.into());
        }
        game.last_tick_ledger = ledger;
        game.bump_nonce();
        Ok(game.action_nonce)
    }

    async fn resolve_timeout(&self, session_id: u32, caller: &str) -> Result<(), LedgerError> {
        self.enter("resolve_timeout")?;
        let mut state = self.state.lock().await;
        let ledger = state.sequence;
        let game = state.games.get_mut(&session_id).ok_or(ContractError::GameNotFound)?;
        game.require_active()?;
        game.slot_of(caller)?;
        let deadline = game.deadline_nonce.ok_or(ContractError::TimeoutNotConfigured)?;
        let nonce_expired = game.action_nonce >= deadline;
        let ledger_expired = game.deadline_ledger.is_some_and(|dl| ledger >= dl);
        if !nonce_expired && !ledger_expired {
            return Err(ContractError::TimeoutNotReached.into());
        }
        let outcome = game.timeout_outcome()?;
        game.finalize(outcome);
        Ok(())
    }

    async fn forfeit(&self, session_id: u32, caller: &str) -> Result<(), LedgerError> {
        self.enter("forfeit")?;
        let mut state = self.state.lock().await;
        let game = state.games.get_mut(&session_id).ok_or(ContractError::GameNotFound)?;
        game.require_active()?;
        let slot = game.slot_of(caller)?;
        game.finalize(Outcome::won_by(slot.other()));
        Ok(())
    }
}

#[async_trait]
impl StateRefresh for InMemoryLedger {
    async fn fetch_session_view(&self, session_id: u32, viewer: &str) -> Result<SessionView, LedgerError> {
        self.record("fetch_session_view");
        let state = self.state.lock().await;
        let game = state.games.get(&session_id).ok_or(ContractError::GameNotFound)?;
        let slot = game.slot_of(viewer)?;
        Ok(game.view_for(session_id, slot, state.sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::testing::{sample_artifact, EchoBackend};
    use crate::circuit::{ArtifactSource, NoirBridge};
    use crate::core::card::CANNOT_FOLLOW_SENTINEL;
    use crate::core::hash::blake2s256;
    use crate::core::rng::random_blinding;
    use crate::proof::mode::ProofMode;
    use crate::proof::play::{prepare_cangkul, prepare_plain, prepare_ring};
    use crate::proof::seed::{commit_seed, prove_seed};

    const SID: u32 = 42;
    const ALICE: &str = "GALICE";
    const BOB: &str = "GBOB";

    fn seed(tag: u8) -> [u8; 32] {
        let mut s = [tag; 32];
        s[..4].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        s[31] = tag.wrapping_mul(7);
        s
    }

    async fn ledger_in_play() -> InMemoryLedger {
        let ledger = InMemoryLedger::new();
        ledger.start_game(SID, ALICE, BOB).await.unwrap();
        seed_phase(&ledger).await;
        ledger
    }

    async fn seed_phase(ledger: &InMemoryLedger) {
        let mut reveals = Vec::new();
        for (party, tag) in [(ALICE, 1u8), (BOB, 2u8)] {
            let ctx = ProofContext::new(SID, party);
            let blinding = random_blinding();
            let c = commit_seed(ProofMode::Nizk, &seed(tag), &blinding, &ctx).unwrap();
            ledger.commit_seed(SID, party, c.commit_hash).await.unwrap();
            reveals.push((party, prove_seed(ProofMode::Nizk, &seed(tag), &blinding, &ctx).unwrap()));
        }
        for (party, r) in reveals {
            ledger.reveal_seed(SID, party, r.seed_hash, r.proof).await.unwrap();
        }
    }

    async fn view(ledger: &InMemoryLedger, party: &str) -> SessionView {
        ledger.fetch_session_view(SID, party).await.unwrap()
    }

    fn code(err: LedgerError) -> Option<u32> {
        err.code()
    }

    #[tokio::test]
    async fn test_start_game_rules() {
        let ledger = InMemoryLedger::new();
        assert_eq!(code(ledger.start_game(1, ALICE, ALICE).await.unwrap_err()), Some(4));
        ledger.start_game(1, ALICE, BOB).await.unwrap();
        assert_eq!(code(ledger.start_game(1, ALICE, BOB).await.unwrap_err()), Some(2));
        assert_eq!(code(ledger.fetch_session_view(1, "GEVE").await.unwrap_err()), Some(3));
        assert_eq!(code(ledger.fetch_session_view(9, ALICE).await.unwrap_err()), Some(1));
    }

    #[tokio::test]
    async fn test_seed_phase_deals_cards() {
        let ledger = ledger_in_play().await;
        let v = view(&ledger, ALICE).await;
        assert_eq!(v.lifecycle, Lifecycle::Playing);
        assert_eq!(v.trick_state, TrickState::CommitWaitBoth);
        assert_eq!(v.my_hand.len(), HAND_SIZE);
        assert_eq!(v.opponent_hand_size, HAND_SIZE);
        assert_eq!(v.draw_pile_size, 36 - 2 * HAND_SIZE - 1);
        assert_eq!(v.trick_suit, v.flipped_card.map(card::suit_of));
        assert_eq!(v.action_nonce, 4);
        assert_eq!(v.deadline_nonce, Some(6));
    }

    #[tokio::test]
    async fn test_duplicate_and_wrong_phase_seed_calls() {
        let ledger = InMemoryLedger::new();
        ledger.start_game(SID, ALICE, BOB).await.unwrap();
        ledger.commit_seed(SID, ALICE, [9; 32]).await.unwrap();
        assert_eq!(code(ledger.commit_seed(SID, ALICE, [9; 32]).await.unwrap_err()), Some(7));
        let err = ledger.reveal_seed(SID, ALICE, [1; 32], vec![0; 64]).await.unwrap_err();
        assert_eq!(code(err), Some(6));
        assert_eq!(code(ledger.commit_seed(SID, "GEVE", [9; 32]).await.unwrap_err()), Some(3));
    }

    #[tokio::test]
    async fn test_reveal_rejects_weak_hash_and_bad_proofs() {
        let ledger = InMemoryLedger::new();
        ledger.start_game(SID, ALICE, BOB).await.unwrap();
        let ctx = ProofContext::new(SID, ALICE);
        let blinding = random_blinding();
        let c = commit_seed(ProofMode::Pedersen, &seed(1), &blinding, &ctx).unwrap();
        ledger.commit_seed(SID, ALICE, c.commit_hash).await.unwrap();
        ledger.commit_seed(SID, BOB, [5; 32]).await.unwrap();

        let weak = ledger.reveal_seed(SID, ALICE, [0; 32], vec![0; 224]).await.unwrap_err();
        assert_eq!(code(weak), Some(24));

        // Proof of the wrong mode for this commitment.
        let nizk = prove_seed(ProofMode::Nizk, &seed(1), &blinding, &ctx).unwrap();
        let err = ledger.reveal_seed(SID, ALICE, c.seed_hash, nizk.proof).await.unwrap_err();
        assert_eq!(code(err), Some(10));

        let odd = ledger.reveal_seed(SID, ALICE, c.seed_hash, vec![1; 100]).await.unwrap_err();
        assert_eq!(code(odd), Some(10));

        let good = prove_seed(ProofMode::Pedersen, &seed(1), &blinding, &ctx).unwrap();
        ledger.reveal_seed(SID, ALICE, good.seed_hash, good.proof).await.unwrap();
        let again = prove_seed(ProofMode::Pedersen, &seed(1), &blinding, &ctx).unwrap();
        let dup = ledger.reveal_seed(SID, ALICE, again.seed_hash, again.proof).await.unwrap_err();
        assert_eq!(code(dup), Some(8));
    }

    #[tokio::test]
    async fn test_play_commit_nonce_guard() {
        let ledger = ledger_in_play().await;
        let v = view(&ledger, ALICE).await;
        let play = prepare_plain(PlayAction::Cangkul);
        let stale = ledger
            .commit_play(SID, ALICE, play.commit_hash, v.action_nonce - 1)
            .await
            .unwrap_err();
        assert!(stale.is_contention());
        assert_eq!(code(stale), Some(25));

        ledger.commit_play(SID, ALICE, play.commit_hash, v.action_nonce).await.unwrap();
        let dup = ledger
            .commit_play(SID, ALICE, play.commit_hash, v.action_nonce + 1)
            .await
            .unwrap_err();
        assert_eq!(code(dup), Some(12));
        assert_eq!(ledger.submitted_play_nonces(), vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn test_zk_trick_resolves() {
        let ledger = ledger_in_play().await;
        let mut reveals = Vec::new();
        for party in [ALICE, BOB] {
            let v = view(&ledger, party).await;
            let ctx = ProofContext::new(SID, party);
            let suit = v.trick_suit.unwrap();
            let valid = v.valid_set();
            let prepared = if let Some(card) = valid.first() {
                let p = prepare_ring(*card, &valid, &ctx).unwrap();
                let proof = match &p.proof {
                    crate::proof::PlayProof::Ring { proof, .. } => proof.clone(),
                    other => panic!("unexpected {other:?}"),
                };
                ledger
                    .commit_play_zk(SID, party, p.commit_hash, v.action_nonce, proof)
                    .await
                    .unwrap();
                p
            } else {
                let p = prepare_cangkul(&v.my_hand, suit, &ctx).unwrap();
                let proof = match &p.proof {
                    crate::proof::PlayProof::Aggregate { proof } => proof.clone(),
                    other => panic!("unexpected {other:?}"),
                };
                ledger
                    .commit_cangkul_zk(SID, party, p.commit_hash, v.action_nonce, proof)
                    .await
                    .unwrap();
                p
            };
            reveals.push((party, prepared));
        }
        assert_eq!(view(&ledger, ALICE).await.trick_state, TrickState::RevealWaitBoth);

        let before = view(&ledger, ALICE).await;
        for (party, p) in &reveals {
            ledger.reveal_play(SID, party, p.action, p.salt).await.unwrap();
        }
        let after = view(&ledger, ALICE).await;
        let both_cangkul = reveals.iter().all(|(_, p)| p.action == PlayAction::Cangkul);
        let total_tricks: u32 = after.tricks_won.iter().sum();
        assert_eq!(total_tricks, if both_cangkul { 0 } else { 1 });
        assert_ne!(after.flipped_card, before.flipped_card);
    }

    #[tokio::test]
    async fn test_reveal_must_open_commitment() {
        let ledger = ledger_in_play().await;
        let v = view(&ledger, ALICE).await;
        let play = prepare_plain(PlayAction::Card(v.my_hand[0]));
        ledger.commit_play(SID, ALICE, play.commit_hash, v.action_nonce).await.unwrap();
        let other = prepare_plain(PlayAction::Cangkul);
        ledger.commit_play(SID, BOB, other.commit_hash, v.action_nonce + 1).await.unwrap();

        let wrong = ledger.reveal_play(SID, ALICE, play.action, [7; 32]).await.unwrap_err();
        assert_eq!(code(wrong), Some(28));
        assert_eq!(PlayAction::Cangkul.wire_value(), CANNOT_FOLLOW_SENTINEL);
    }

    #[tokio::test]
    async fn test_timeout_flow() {
        let ledger = InMemoryLedger::new();
        ledger.start_game(SID, ALICE, BOB).await.unwrap();
        assert_eq!(code(ledger.resolve_timeout(SID, ALICE).await.unwrap_err()), Some(22));

        ledger.commit_seed(SID, ALICE, [9; 32]).await.unwrap();
        assert_eq!(code(ledger.resolve_timeout(SID, ALICE).await.unwrap_err()), Some(21));

        assert_eq!(ledger.tick_timeout(SID, ALICE).await.unwrap(), 2);
        assert_eq!(code(ledger.tick_timeout(SID, ALICE).await.unwrap_err()), Some(38));
        ledger.advance_ledger(MIN_TICK_GAP_LEDGERS).await;
        assert_eq!(ledger.tick_timeout(SID, BOB).await.unwrap(), 3);

        ledger.resolve_timeout(SID, ALICE).await.unwrap();
        let v = view(&ledger, BOB).await;
        assert_eq!(v.outcome, Outcome::Player1Won);
        assert!(v.is_finished());
        assert_eq!(code(ledger.forfeit(SID, BOB).await.unwrap_err()), Some(5));
    }

    #[tokio::test]
    async fn test_ledger_deadline_alone_allows_resolution() {
        let ledger = ledger_in_play().await;
        let v = view(&ledger, ALICE).await;
        let play = prepare_plain(PlayAction::Cangkul);
        ledger.commit_play(SID, ALICE, play.commit_hash, v.action_nonce).await.unwrap();
        assert_eq!(code(ledger.resolve_timeout(SID, ALICE).await.unwrap_err()), Some(21));
        ledger.advance_ledger(TIMEOUT_LEDGERS).await;
        ledger.resolve_timeout(SID, ALICE).await.unwrap();
        assert_eq!(view(&ledger, ALICE).await.outcome, Outcome::Player1Won);
    }

    #[tokio::test]
    async fn test_forfeit_caller_loses() {
        let ledger = ledger_in_play().await;
        ledger.forfeit(SID, ALICE).await.unwrap();
        assert_eq!(view(&ledger, BOB).await.outcome, Outcome::Player2Won);
    }

    #[tokio::test]
    async fn test_injected_contention_is_consumed() {
        let ledger = InMemoryLedger::new();
        ledger.start_game(SID, ALICE, BOB).await.unwrap();
        ledger.inject_contention(2);
        assert!(ledger.commit_seed(SID, ALICE, [9; 32]).await.unwrap_err().is_contention());
        assert!(ledger.commit_seed(SID, ALICE, [9; 32]).await.unwrap_err().is_contention());
        ledger.commit_seed(SID, ALICE, [9; 32]).await.unwrap();
        assert_eq!(ledger.call_count("commit_seed"), 3);
    }

    #[tokio::test]
    async fn test_noir_split_verification() {
        let bridge = Arc::new(NoirBridge::new(
            ArtifactSource::Inline(Box::new(sample_artifact().unwrap())),
            Arc::new(EchoBackend::default()),
        ));
        let ledger = InMemoryLedger::new().with_circuit_verifier(bridge.clone());
        ledger.start_game(SID, ALICE, BOB).await.unwrap();

        let s = seed(3);
        let ctx = ProofContext::new(SID, ALICE);
        let c = commit_seed(ProofMode::Noir, &s, &[0; 32], &ctx).unwrap();
        assert_eq!(c.seed_hash, blake2s256(&s));
        ledger.commit_seed(SID, ALICE, c.commit_hash).await.unwrap();
        ledger.commit_seed(SID, BOB, [5; 32]).await.unwrap();

        // Zero-length reveal without a prior verification.
        let early = ledger.reveal_seed(SID, ALICE, c.seed_hash, Vec::new()).await.unwrap_err();
        assert_eq!(code(early), Some(10));

        let proof = bridge.prove_knowledge(&s, &c.seed_hash).await.unwrap();
        let short = ledger
            .verify_noir_seed(SID, ALICE, c.seed_hash, vec![1; 64])
            .await
            .unwrap_err();
        assert_eq!(code(short), Some(10));
        ledger
            .verify_noir_seed(SID, ALICE, c.seed_hash, proof.proof)
            .await
            .unwrap();
        ledger.reveal_seed(SID, ALICE, c.seed_hash, Vec::new()).await.unwrap();
        assert!(view(&ledger, ALICE).await.seed_revealed[0]);
    }

    #[tokio::test]
    async fn test_circuit_proof_without_verifier() {
        let ledger = InMemoryLedger::new();
        ledger.start_game(SID, ALICE, BOB).await.unwrap();
        let s = seed(4);
        let c = commit_seed(ProofMode::Noir, &s, &[0; 32], &ProofContext::new(SID, ALICE)).unwrap();
        ledger.commit_seed(SID, ALICE, c.commit_hash).await.unwrap();
        ledger.commit_seed(SID, BOB, [5; 32]).await.unwrap();
        let err = ledger
            .verify_noir_seed(SID, ALICE, c.seed_hash, vec![1; 4096])
            .await
            .unwrap_err();
        assert_eq!(code(err), Some(30));
    }

    #[test]
    fn test_shuffle_is_deterministic() {
        let mut a = Game::new(ALICE, BOB);
        a.seats[0].seed_hash = Some([1; 32]);
        a.seats[1].seed_hash = Some([2; 32]);
        let mut b = a.clone();
        a.shuffle_and_deal(SID);
        b.shuffle_and_deal(SID);
        assert_eq!(a.seats[0].hand, b.seats[0].hand);
        assert_eq!(a.draw_pile, b.draw_pile);

        let mut all: Vec<CardId> = a.seats.iter().flat_map(|s| s.hand.clone()).collect();
        all.extend(&a.draw_pile);
        all.sort_unstable();
        assert_eq!(all, (0..DECK_SIZE).collect::<Vec<_>>());

        let mut c = b.clone();
        c.shuffle_and_deal(SID + 1);
        assert_ne!(c.draw_pile, b.draw_pile);
    }

    #[test]
    fn test_determine_winner_tie_breaks() {
        let mut g = Game::new(ALICE, BOB);
        g.seats[0].hand = vec![0];
        g.seats[1].hand = vec![];
        assert_eq!(g.determine_winner(), Outcome::Player2Won);

        g.seats[1].hand = vec![1];
        g.seats[0].tricks_won = 2;
        assert_eq!(g.determine_winner(), Outcome::Player1Won);

        g.seats[1].tricks_won = 2;
        g.seats[1].hand = vec![1, 2];
        assert_eq!(g.determine_winner(), Outcome::Player1Won);

        // Same count, lower face total wins.
        g.seats[1].hand = vec![9];
        g.seats[0].hand = vec![8];
        assert_eq!(g.determine_winner(), Outcome::Player2Won);

        g.seats[0].hand = vec![9];
        g.seats[1].hand = vec![18];
        assert_eq!(g.determine_winner(), Outcome::Draw);
    }

    #[test]
    fn test_resolve_trick_penalty_and_tie() {
        let mut g = Game::new(ALICE, BOB);
        g.lifecycle = Lifecycle::Playing;
        g.seats[0].hand = vec![1, 2];
        g.seats[1].hand = vec![3, 4];
        g.draw_pile = vec![20, 21];

        g.seats[0].trick_card = Some(5);
        g.resolve_trick(GENESIS_LEDGER);
        assert_eq!(g.seats[0].tricks_won, 1);
        assert_eq!(g.seats[1].hand, vec![3, 4, 20]);
        assert_eq!(g.flipped_card, Some(21));
        assert!(g.draw_pile.is_empty());

        g.seats[0].trick_card = Some(0);
        g.seats[1].trick_card = Some(9);
        g.resolve_trick(GENESIS_LEDGER);
        assert_eq!(g.seats[0].tricks_won, 2);
        // Nothing left to flip: game over.
        assert_eq!(g.lifecycle, Lifecycle::Finished);
    }
}
