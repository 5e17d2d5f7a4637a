//! Circuit Prover Backends
//!
//! [`CircuitBackend`] is the seam to a general-purpose prover. The shipped
//! implementation drives the `nargo` witness solver and the `bb` prover CLI
//! as child processes. Every call works in its own scratch directory, with
//! its own copy of the Noir project, so concurrent proofs never share a
//! witness file.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::artifact::CircuitArtifact;
use super::witness::SeedWitness;
use super::CircuitError;

/// Prover/verifier for a compiled circuit.
#[async_trait]
pub trait CircuitBackend: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Produce a proof for `witness`.
    async fn prove(&self, artifact: &CircuitArtifact, witness: &SeedWitness) -> Result<Vec<u8>, CircuitError>;

    /// Verify `proof` against the encoded public inputs.
    async fn verify(
        &self,
        artifact: &CircuitArtifact,
        proof: &[u8],
        public_inputs: &[u8],
    ) -> Result<bool, CircuitError>;
}

/// `nargo` + `bb` command-line backend.
#[derive(Debug, Clone)]
pub struct BbCliBackend {
    /// `bb` binary.
    pub bb_binary: PathBuf,
    /// `nargo` binary.
    pub nargo_binary: PathBuf,
    /// Noir project directory (holds `Nargo.toml` and `src/`). Read only.
    pub project_dir: PathBuf,
    /// Scratch directory for per-job files.
    pub work_dir: PathBuf,
}

static JOB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Project entries the witness solver needs.
const PROJECT_ENTRIES: [&str; 2] = ["Nargo.toml", "src"];

/// Scratch directory for one prove or verify call, removed on drop.
#[derive(Debug)]
struct JobDir(PathBuf);

impl JobDir {
    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for JobDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.0) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(dir = %self.0.display(), error = %e, "failed to remove prover scratch dir");
            }
        }
    }
}

impl BbCliBackend {
    /// Create a backend rooted at `project_dir`, using `work_dir` for scratch files.
    pub fn new(bb_binary: PathBuf, nargo_binary: PathBuf, project_dir: PathBuf, work_dir: PathBuf) -> Self {
        Self { bb_binary, nargo_binary, project_dir, work_dir }
    }

    async fn job_dir(&self) -> Result<JobDir, CircuitError> {
        let id = JOB_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = self.work_dir.join(format!("job-{}-{id}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.map_err(io_err)?;
        Ok(JobDir(dir))
    }

    /// Copy the project into `job` and write the witness inputs next to it.
    async fn stage_project(&self, job: &JobDir, witness: &SeedWitness) -> Result<PathBuf, CircuitError> {
        let program = job.path().join("program");
        let (from, to) = (self.project_dir.clone(), program.clone());
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            std::fs::create_dir_all(&to)?;
            for entry in PROJECT_ENTRIES {
                copy_tree(&from.join(entry), &to.join(entry))?;
            }
            Ok(())
        })
        .await
        .map_err(|e| CircuitError::Backend(format!("project copy task failed: {e}")))?
        .map_err(io_err)?;

        tokio::fs::write(program.join("Prover.toml"), witness.to_prover_toml())
            .await
            .map_err(io_err)?;
        Ok(program)
    }

    async fn write_artifact(&self, artifact: &CircuitArtifact, dir: &Path) -> Result<PathBuf, CircuitError> {
        let path = dir.join("circuit.json");
        tokio::fs::write(&path, artifact.to_json()?).await.map_err(io_err)?;
        Ok(path)
    }
}

fn io_err(e: std::io::Error) -> CircuitError {
    CircuitError::Backend(e.to_string())
}

fn copy_tree(from: &Path, to: &Path) -> std::io::Result<()> {
    if from.is_dir() {
        std::fs::create_dir_all(to)?;
        for entry in std::fs::read_dir(from)? {
            let entry = entry?;
            copy_tree(&entry.path(), &to.join(entry.file_name()))?;
        }
        Ok(())
    } else {
        std::fs::copy(from, to).map(|_| ())
    }
}

async fn run(binary: &Path, args: &[&str], cwd: &Path) -> Result<bool, CircuitError> {
    debug!(binary = %binary.display(), ?args, "running prover command");
    let output = Command::new(binary)
        .args(args)
        .current_dir(cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| CircuitError::Backend(format!("{}: {e}", binary.display())))?;
    if !output.status.success() {
        debug!(stderr = %String::from_utf8_lossy(&output.stderr), "prover command failed");
    }
    Ok(output.status.success())
}

#[async_trait]
impl CircuitBackend for BbCliBackend {
    fn name(&self) -> &str {
        "bb-cli"
    }

    async fn prove(&self, artifact: &CircuitArtifact, witness: &SeedWitness) -> Result<Vec<u8>, CircuitError> {
        let job = self.job_dir().await?;
        let dir = job.path();
        let circuit = self.write_artifact(artifact, dir).await?;

        let program = self.stage_project(&job, witness).await?;
        if !run(&self.nargo_binary, &["execute", "seed_witness"], &program).await? {
            return Err(CircuitError::Backend("witness solver failed".into()));
        }

        let witness_path = program.join("target").join("seed_witness.gz");
        let circuit_arg = circuit.to_string_lossy().into_owned();
        let witness_arg = witness_path.to_string_lossy().into_owned();
        let out_arg = dir.to_string_lossy().into_owned();
        let args = [
            "prove", "--scheme", "ultra_honk", "--oracle_hash", "keccak",
            "-b", &circuit_arg, "-w", &witness_arg, "-o", &out_arg,
        ];
        if !run(&self.bb_binary, &args, dir).await? {
            return Err(CircuitError::Backend("bb prove failed".into()));
        }

        tokio::fs::read(dir.join("proof")).await.map_err(io_err)
    }

    async fn verify(
        &self,
        artifact: &CircuitArtifact,
        proof: &[u8],
        public_inputs: &[u8],
    ) -> Result<bool, CircuitError> {
        let job = self.job_dir().await?;
        let dir = job.path();
        let circuit = self.write_artifact(artifact, dir).await?;
        let proof_path = dir.join("proof");
        let inputs_path = dir.join("public_inputs");
        tokio::fs::write(&proof_path, proof).await.map_err(io_err)?;
        tokio::fs::write(&inputs_path, public_inputs).await.map_err(io_err)?;

        let circuit_arg = circuit.to_string_lossy().into_owned();
        let out_arg = dir.to_string_lossy().into_owned();
        let vk_args = [
            "write_vk", "--scheme", "ultra_honk", "--oracle_hash", "keccak",
            "-b", &circuit_arg, "-o", &out_arg,
        ];
        if !run(&self.bb_binary, &vk_args, dir).await? {
            return Err(CircuitError::Backend("bb write_vk failed".into()));
        }

        let vk_arg = dir.join("vk").to_string_lossy().into_owned();
        let proof_arg = proof_path.to_string_lossy().into_owned();
        let inputs_arg = inputs_path.to_string_lossy().into_owned();
        let verify_args = [
            "verify", "--scheme", "ultra_honk", "--oracle_hash", "keccak",
            "-k", &vk_arg, "-p", &proof_arg, "-i", &inputs_arg,
        ];
        run(&self.bb_binary, &verify_args, dir).await
    }
}
