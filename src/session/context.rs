//! Session Context
//!
//! Everything an engine call needs to know about the session it acts in.
//! Passed explicitly; there is no process-wide session state.

use crate::proof::{ProofContext, ProofMode};

use super::config::EngineConfig;

/// One party's seat in one ledger session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Ledger session id.
    pub session_id: u32,
    /// This party's ledger address.
    pub party: String,
    /// Seed proof mode chosen before the seed commit.
    pub proof_mode: ProofMode,
    /// Commit card plays with ZK proofs.
    pub zk_plays: bool,
    /// The opponent is an automated player.
    pub opponent_is_bot: bool,
}

impl SessionContext {
    /// Context with the default mode and ZK plays on.
    pub fn new(session_id: u32, party: impl Into<String>) -> Self {
        Self {
            session_id,
            party: party.into(),
            proof_mode: ProofMode::default(),
            zk_plays: true,
            opponent_is_bot: false,
        }
    }

    /// Context with the configured mode and play setting.
    pub fn from_config(session_id: u32, party: impl Into<String>, config: &EngineConfig) -> Self {
        Self::new(session_id, party)
            .with_proof_mode(config.default_proof_mode)
            .with_zk_plays(config.zk_plays)
    }

    /// Override the seed proof mode.
    pub fn with_proof_mode(mut self, mode: ProofMode) -> Self {
        self.proof_mode = mode;
        self
    }

    /// Override the ZK play toggle.
    pub fn with_zk_plays(mut self, zk_plays: bool) -> Self {
        self.zk_plays = zk_plays;
        self
    }

    /// Mark the opponent as a bot.
    pub fn against_bot(mut self, bot: bool) -> Self {
        self.opponent_is_bot = bot;
        self
    }

    /// Transcript binding for proofs built in this session.
    pub fn proof_context(&self) -> ProofContext<'_> {
        ProofContext::new(self.session_id, &self.party)
    }

    /// Bot sessions always use plain hash commitments.
    pub fn use_zk_plays(&self) -> bool {
        self.zk_plays && !self.opponent_is_bot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bot_sessions_use_plain_plays() {
        let ctx = SessionContext::new(1, "GALICE");
        assert!(ctx.use_zk_plays());
        assert!(!ctx.clone().against_bot(true).use_zk_plays());
        assert!(!ctx.with_zk_plays(false).use_zk_plays());
    }

    #[test]
    fn test_from_config() {
        let config = EngineConfig { default_proof_mode: ProofMode::Noir, zk_plays: false, ..Default::default() };
        let ctx = SessionContext::from_config(9, "GBOB", &config);
        assert_eq!(ctx.proof_mode, ProofMode::Noir);
        assert!(!ctx.zk_plays);
        assert_eq!(ctx.proof_context().tail_bytes(), [&9u32.to_be_bytes()[..], b"GBOB"].concat());
    }
}
