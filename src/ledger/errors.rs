//! Ledger Failure Codes
//!
//! The contract reports failures as numeric codes. Each known code has one
//! fixed user-facing message.

use std::fmt;

use thiserror::Error;

/// Known contract failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ContractError {
    /// 1
    GameNotFound = 1,
    /// 2
    SessionAlreadyExists = 2,
    /// 3
    NotAPlayer = 3,
    /// 4
    SelfPlayNotAllowed = 4,
    /// 5
    GameAlreadyEnded = 5,
    /// 6
    WrongPhase = 6,
    /// 7
    CommitAlreadySubmitted = 7,
    /// 8
    RevealAlreadySubmitted = 8,
    /// 9
    CommitHashMismatch = 9,
    /// 10
    InvalidZkProof = 10,
    /// 11
    MissingCommit = 11,
    /// 12
    NotYourTurn = 12,
    /// 13
    CardNotInHand = 13,
    /// 14
    WrongSuit = 14,
    /// 15
    HasMatchingSuit = 15,
    /// 16
    DrawPileEmpty = 16,
    /// 17
    NoTrickInProgress = 17,
    /// 18
    AdminNotSet = 18,
    /// 19
    GameHubNotSet = 19,
    /// 20
    VerifierNotSet = 20,
    /// 21
    TimeoutNotReached = 21,
    /// 22
    TimeoutNotConfigured = 22,
    /// 23
    TimeoutNotApplicable = 23,
    /// 24
    WeakSeedEntropy = 24,
    /// 25
    InvalidNonce = 25,
    /// 26
    PlayCommitAlreadySubmitted = 26,
    /// 27
    PlayCommitMissing = 27,
    /// 28
    PlayRevealMismatch = 28,
    /// 29
    InvalidCardId = 29,
    /// 30
    UltraHonkVerifierNotSet = 30,
    /// 31
    UltraHonkVerificationFailed = 31,
    /// 32
    ZkPlayProofInvalid = 32,
    /// 33
    ZkPlaySetEmpty = 33,
    /// 34
    ZkPlayOpeningMismatch = 34,
    /// 35
    ZkCangkulProofInvalid = 35,
    /// 38
    TickTooSoon = 38,
}

const ALL: [ContractError; 36] = [
    ContractError::GameNotFound,
    ContractError::SessionAlreadyExists,
    ContractError::NotAPlayer,
    ContractError::SelfPlayNotAllowed,
    ContractError::GameAlreadyEnded,
    ContractError::WrongPhase,
    ContractError::CommitAlreadySubmitted,
    ContractError::RevealAlreadySubmitted,
    ContractError::CommitHashMismatch,
    ContractError::InvalidZkProof,
    ContractError::MissingCommit,
    ContractError::NotYourTurn,
    ContractError::CardNotInHand,
    ContractError::WrongSuit,
    ContractError::HasMatchingSuit,
    ContractError::DrawPileEmpty,
    ContractError::NoTrickInProgress,
    ContractError::AdminNotSet,
    ContractError::GameHubNotSet,
    ContractError::VerifierNotSet,
    ContractError::TimeoutNotReached,
    ContractError::TimeoutNotConfigured,
    ContractError::TimeoutNotApplicable,
    ContractError::WeakSeedEntropy,
    ContractError::InvalidNonce,
    ContractError::PlayCommitAlreadySubmitted,
    ContractError::PlayCommitMissing,
    ContractError::PlayRevealMismatch,
    ContractError::InvalidCardId,
    ContractError::UltraHonkVerifierNotSet,
    ContractError::UltraHonkVerificationFailed,
    ContractError::ZkPlayProofInvalid,
    ContractError::ZkPlaySetEmpty,
    ContractError::ZkPlayOpeningMismatch,
    ContractError::ZkCangkulProofInvalid,
    ContractError::TickTooSoon,
];

impl ContractError {
    /// Numeric code.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Look up a numeric code.
    pub fn from_code(code: u32) -> Option<Self> {
        ALL.iter().copied().find(|e| e.code() == code)
    }

    /// Fixed user-facing message.
    pub fn message(self) -> &'static str {
        match self {
            Self::GameNotFound => "Game not found. It may have expired.",
            Self::SessionAlreadyExists => "A game with this session already exists.",
            Self::NotAPlayer => "You are not a player in this game.",
            Self::SelfPlayNotAllowed => "You cannot play against yourself.",
            Self::GameAlreadyEnded => "This game has already ended.",
            Self::WrongPhase => "That action is not allowed in the current phase.",
            Self::CommitAlreadySubmitted => "You already committed your seed.",
            Self::RevealAlreadySubmitted => "You already revealed your seed.",
            Self::CommitHashMismatch => "Revealed value does not match your commitment.",
            Self::InvalidZkProof => "Seed proof failed verification.",
            Self::MissingCommit => "No commitment found to reveal.",
            Self::NotYourTurn => "It is not your turn.",
            Self::CardNotInHand => "That card is not in your hand.",
            Self::WrongSuit => "That card does not follow the trick suit.",
            Self::HasMatchingSuit => "You hold a card of the trick suit and must follow.",
            Self::DrawPileEmpty => "The draw pile is empty.",
            Self::NoTrickInProgress => "No trick is in progress.",
            Self::AdminNotSet => "Contract admin is not configured.",
            Self::GameHubNotSet => "Game hub is not configured.",
            Self::VerifierNotSet => "Proof verifier is not configured.",
            Self::TimeoutNotReached => "The opponent still has time to act.",
            Self::TimeoutNotConfigured => "No timeout is running for this game.",
            Self::TimeoutNotApplicable => "A timeout cannot be claimed in this state.",
            Self::WeakSeedEntropy => "Seed is too weak. Generate a new one.",
            Self::InvalidNonce => "Game state changed. Retrying with fresh state.",
            Self::PlayCommitAlreadySubmitted => "You already committed a play this trick.",
            Self::PlayCommitMissing => "No play commitment found to reveal.",
            Self::PlayRevealMismatch => "Revealed play does not match your commitment.",
            Self::InvalidCardId => "Invalid card.",
            Self::UltraHonkVerifierNotSet => "Circuit verifier is not configured.",
            Self::UltraHonkVerificationFailed => "Circuit proof failed verification.",
            Self::ZkPlayProofInvalid => "Card proof failed verification.",
            Self::ZkPlaySetEmpty => "You have no card of the trick suit.",
            Self::ZkPlayOpeningMismatch => "Revealed card does not match your commitment.",
            Self::ZkCangkulProofInvalid => "Cannot-follow proof failed verification.",
            Self::TickTooSoon => "Wait before advancing the timeout clock again.",
        }
    }
}

impl fmt::Display for ContractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} (#{})", self, self.code())
    }
}

/// Ledger call failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The contract rejected the call with a known code.
    #[error("contract error {0}")]
    Contract(ContractError),

    /// The contract rejected the call with a code this client does not know.
    #[error("contract error code {0}")]
    UnknownCode(u32),

    /// Sequencing or state-footprint conflict with a concurrent submission.
    #[error("contention: {0}")]
    Contention(String),

    /// Temporary rejection; the same call may succeed later.
    #[error("transient: {0}")]
    Transient(String),

    /// The call never reached the ledger or the response was lost.
    #[error("transport: {0}")]
    Transport(String),
}

impl LedgerError {
    /// Map a raw code to the matching variant.
    pub fn from_code(code: u32) -> Self {
        ContractError::from_code(code).map_or(Self::UnknownCode(code), Self::Contract)
    }

    /// Numeric contract code, if any.
    pub fn code(&self) -> Option<u32> {
        match self {
            Self::Contract(e) => Some(e.code()),
            Self::UnknownCode(code) => Some(*code),
            _ => None,
        }
    }

    /// Worth retrying with a refreshed nonce.
    pub fn is_contention(&self) -> bool {
        matches!(
            self,
            Self::Contract(ContractError::InvalidNonce) | Self::Contention(_) | Self::Transient(_)
        )
    }
}

impl From<ContractError> for LedgerError {
    fn from(e: ContractError) -> Self {
        Self::Contract(e)
    }
}

/// Human-readable message for a ledger failure.
///
/// Known codes map to one fixed message; everything else passes through raw.
pub fn user_message(err: &LedgerError) -> String {
    match err {
        LedgerError::Contract(e) => e.message().to_string(),
        LedgerError::Transport(raw) | LedgerError::Contention(raw) | LedgerError::Transient(raw) => raw.clone(),
        other => other.to_string(),
    }
}
