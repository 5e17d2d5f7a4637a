//! Compiled Circuit Artifact
//!
//! The JSON a Noir compiler emits: version, hash, ABI and base64 bytecode.
//! Fields this crate does not use are kept so the artifact can be written
//! back out unchanged for the prover CLI.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::CircuitError;

/// Parameter visibility in the circuit ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Witness-only input.
    Private,
    /// Public input.
    Public,
}

/// One ABI parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbiParameter {
    /// Parameter name.
    pub name: String,
    /// Parameter visibility.
    pub visibility: Visibility,
    /// Type descriptor, passed through untouched.
    #[serde(rename = "type", default)]
    pub ty: serde_json::Value,
}

/// Circuit ABI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitAbi {
    /// Input parameters.
    pub parameters: Vec<AbiParameter>,
    /// Everything else in the ABI object.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Compiled seed-knowledge circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitArtifact {
    /// Compiler version string.
    pub noir_version: String,
    /// Compiler-assigned circuit hash.
    #[serde(default)]
    pub hash: serde_json::Value,
    /// Input/output ABI.
    pub abi: CircuitAbi,
    /// Base64 ACIR bytecode.
    pub bytecode: String,
    /// Remaining top-level fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CircuitArtifact {
    /// Parse from JSON text and validate the ABI.
    pub fn from_json(text: &str) -> Result<Self, CircuitError> {
        let artifact: Self =
            serde_json::from_str(text).map_err(|e| CircuitError::Artifact(e.to_string()))?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Load from disk and validate the ABI.
    pub async fn load(path: &Path) -> Result<Self, CircuitError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CircuitError::Artifact(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    /// Serialize back to JSON.
    pub fn to_json(&self) -> Result<String, CircuitError> {
        serde_json::to_string(self).map_err(|e| CircuitError::Artifact(e.to_string()))
    }

    /// The seed circuit must take a private `seed` and a public `seed_hash`.
    pub fn validate(&self) -> Result<(), CircuitError> {
        self.require_param("seed", Visibility::Private)?;
        self.require_param("seed_hash", Visibility::Public)?;
        if self.bytecode.is_empty() {
            return Err(CircuitError::Artifact("empty bytecode".into()));
        }
        Ok(())
    }

    fn require_param(&self, name: &str, visibility: Visibility) -> Result<(), CircuitError> {
        match self.abi.parameters.iter().find(|p| p.name == name) {
            Some(p) if p.visibility == visibility => Ok(()),
            Some(p) => Err(CircuitError::Artifact(format!(
                "parameter `{name}` is {:?}, expected {:?}",
                p.visibility, visibility
            ))),
            None => Err(CircuitError::Artifact(format!("missing parameter `{name}`"))),
        }
    }
}
