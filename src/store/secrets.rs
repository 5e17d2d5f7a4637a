//! Typed secret records.
//!
//! Keys: `cangkulan:{seed|play}:{session}:{party}`. Records are camelCase
//! JSON with hex byte fields, readable by other clients of the same store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::card::{CardId, PlayAction};
use crate::core::encoding::bytes32_from_hex;
use crate::proof::mode::ProofMode;

use super::{KeyValueStore, StoreError};

const KEY_PREFIX: &str = "cangkulan";

/// Opening material for a committed seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedRecord {
    /// Raw seed, hex.
    pub secret_hex: String,
    /// Blinding factor, hex.
    pub blinding_hex: String,
    /// Mode the seed was committed under.
    pub proof_mode: ProofMode,
    /// When the record was written.
    pub saved_at: DateTime<Utc>,
}

impl SeedRecord {
    /// New record stamped now.
    pub fn new(seed: &[u8; 32], blinding: &[u8; 32], proof_mode: ProofMode) -> Self {
        Self {
            secret_hex: hex::encode(seed),
            blinding_hex: hex::encode(blinding),
            proof_mode,
            saved_at: Utc::now(),
        }
    }

    /// Decoded seed.
    pub fn seed(&self) -> Result<[u8; 32], StoreError> {
        decode("secretHex", &self.secret_hex)
    }

    /// Decoded blinding.
    pub fn blinding(&self) -> Result<[u8; 32], StoreError> {
        decode("blindingHex", &self.blinding_hex)
    }
}

/// Opening material for a committed play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayRecord {
    /// Card id or the cangkul sentinel.
    pub card_id: CardId,
    /// Salt or blinding, hex.
    pub salt_hex: String,
    /// Committed with a Pedersen opening.
    pub zk: bool,
    /// When the record was written.
    pub saved_at: DateTime<Utc>,
}

impl PlayRecord {
    /// New record stamped now.
    pub fn new(action: PlayAction, salt: &[u8; 32], zk: bool) -> Self {
        Self {
            card_id: action.wire_value(),
            salt_hex: hex::encode(salt),
            zk,
            saved_at: Utc::now(),
        }
    }

    /// Committed action.
    pub fn action(&self) -> PlayAction {
        PlayAction::from_wire(self.card_id)
    }

    /// Decoded salt.
    pub fn salt(&self) -> Result<[u8; 32], StoreError> {
        decode("saltHex", &self.salt_hex)
    }
}

fn decode(field: &str, text: &str) -> Result<[u8; 32], StoreError> {
    bytes32_from_hex(text).map_err(|e| StoreError::Corrupt {
        key: field.to_string(),
        reason: e.to_string(),
    })
}

/// Seed and play records over a [`KeyValueStore`].
#[derive(Clone)]
pub struct SecretStore {
    kv: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for SecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretStore").finish_non_exhaustive()
    }
}

impl SecretStore {
    /// Wrap a key-value backend.
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Storage key for a record kind.
    pub fn key(kind: &str, session_id: u32, party: &str) -> String {
        format!("{KEY_PREFIX}:{kind}:{session_id}:{party}")
    }

    fn save<T: Serialize>(&self, key: &str, record: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string(record).map_err(|e| StoreError::Serde(e.to_string()))?;
        self.kv.set(key, &json)?;
        debug!(key, "secret saved");
        Ok(())
    }

    fn load<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.kv.get(key)? {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| StoreError::Corrupt { key: key.to_string(), reason: e.to_string() }),
            None => Ok(None),
        }
    }

    /// Persist seed opening material, replacing any previous record.
    pub fn save_seed(&self, session_id: u32, party: &str, record: &SeedRecord) -> Result<(), StoreError> {
        self.save(&Self::key("seed", session_id, party), record)
    }

    /// Load seed opening material.
    pub fn load_seed(&self, session_id: u32, party: &str) -> Result<Option<SeedRecord>, StoreError> {
        self.load(&Self::key("seed", session_id, party))
    }

    /// Consume seed opening material.
    pub fn clear_seed(&self, session_id: u32, party: &str) -> Result<(), StoreError> {
        self.kv.delete(&Self::key("seed", session_id, party))
    }

    /// Persist play opening material, replacing any previous record.
    pub fn save_play(&self, session_id: u32, party: &str, record: &PlayRecord) -> Result<(), StoreError> {
        self.save(&Self::key("play", session_id, party), record)
    }

    /// Load play opening material.
    pub fn load_play(&self, session_id: u32, party: &str) -> Result<Option<PlayRecord>, StoreError> {
        self.load(&Self::key("play", session_id, party))
    }

    /// Consume play opening material.
    pub fn clear_play(&self, session_id: u32, party: &str) -> Result<(), StoreError> {
        self.kv.delete(&Self::key("play", session_id, party))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::card::CANNOT_FOLLOW_SENTINEL;
    use crate::store::{FileStore, MemoryStore};

    fn memory() -> SecretStore {
        SecretStore::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_key_format() {
        assert_eq!(SecretStore::key("seed", 42, "GABC"), "cangkulan:seed:42:GABC");
    }

    #[test]
    fn test_seed_roundtrip_and_clear() {
        let store = memory();
        let record = SeedRecord::new(&[1u8; 32], &[2u8; 32], ProofMode::Pedersen);
        store.save_seed(7, "GA", &record).unwrap();

        let loaded = store.load_seed(7, "GA").unwrap().unwrap();
        assert_eq!(loaded, record);
        assert_eq!(loaded.seed().unwrap(), [1u8; 32]);
        assert_eq!(loaded.blinding().unwrap(), [2u8; 32]);

        store.clear_seed(7, "GA").unwrap();
        assert_eq!(store.load_seed(7, "GA").unwrap(), None);
    }

    #[test]
    fn test_parties_are_isolated() {
        let store = memory();
        store.save_play(1, "GA", &PlayRecord::new(PlayAction::Card(3), &[1u8; 32], false)).unwrap();
        store.save_play(1, "GB", &PlayRecord::new(PlayAction::Cangkul, &[2u8; 32], true)).unwrap();

        assert_eq!(store.load_play(1, "GA").unwrap().unwrap().action(), PlayAction::Card(3));
        let other = store.load_play(1, "GB").unwrap().unwrap();
        assert_eq!(other.card_id, CANNOT_FOLLOW_SENTINEL);
        assert!(other.zk);

        store.clear_play(1, "GA").unwrap();
        assert!(store.load_play(1, "GA").unwrap().is_none());
        assert!(store.load_play(1, "GB").unwrap().is_some());
        assert!(store.load_play(2, "GB").unwrap().is_none());
    }

    #[test]
    fn test_record_json_is_camel_case() {
        let record = PlayRecord::new(PlayAction::Card(5), &[0xAB; 32], true);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["cardId"], 5);
        assert_eq!(json["saltHex"], "ab".repeat(32));
        assert_eq!(json["zk"], true);
        assert!(json.get("savedAt").is_some());

        let seed = serde_json::to_value(SeedRecord::new(&[0; 32], &[0; 32], ProofMode::Noir)).unwrap();
        assert_eq!(seed["proofMode"], "noir");
        assert!(seed.get("secretHex").is_some());
    }

    #[test]
    fn test_corrupt_record_is_reported() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(&SecretStore::key("seed", 1, "GA"), "not json").unwrap();
        let store = SecretStore::new(kv);
        assert!(matches!(store.load_seed(1, "GA"), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_failed_write_surfaces() {
        let kv = Arc::new(MemoryStore::new());
        kv.fail_writes(true);
        let store = SecretStore::new(kv);
        let record = SeedRecord::new(&[1u8; 32], &[2u8; 32], ProofMode::Nizk);
        assert!(matches!(store.save_seed(1, "GA", &record), Err(StoreError::Io(_))));
    }

    #[test]
    fn test_file_store_durable_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let record = SeedRecord::new(&[9u8; 32], &[8u8; 32], ProofMode::Nizk);
        {
            let store = SecretStore::new(Arc::new(FileStore::open(dir.path()).unwrap()));
            store.save_seed(3, "GPLAYER", &record).unwrap();
        }
        let store = SecretStore::new(Arc::new(FileStore::open(dir.path()).unwrap()));
        assert_eq!(store.load_seed(3, "GPLAYER").unwrap(), Some(record));
    }
}
