//! Groth16 Prover Backends
//!
//! Witness calculation, proving and verification are delegated to external
//! tooling behind [`ProverBackend`]:
//! - [`SnarkjsBackend`] shells out to the `snarkjs` CLI
//! - [`MockBackend`] produces deterministic placeholder proofs for development

use async_trait::async_trait;
use num_bigint::BigUint;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Output;
use thiserror::Error;
use tokio::process::Command;
use tracing::{error, info, instrument};

use crate::types::GeneratedProof;

#[derive(Error, Debug)]
pub enum ProverError {
    #[error("Circuit not found: {0}")]
    CircuitNotFound(String),
    #[error("`{program} {args}` failed with {status}: {stderr}")]
    CommandFailed {
        program: String,
        args: String,
        status: String,
        stderr: String,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for ProverError {
    fn from(e: serde_json::Error) -> Self {
        ProverError::SerializationError(e.to_string())
    }
}

/// Paths of the compiled circuit and its keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitArtifacts {
    pub name: String,
    /// Witness generator compiled to wasm
    pub wasm: PathBuf,
    /// Groth16 proving key
    pub zkey: PathBuf,
    /// Verification key (JSON)
    pub vkey: PathBuf,
}

impl CircuitArtifacts {
    /// Resolve the circom/snarkjs build layout:
    /// `<build>/<name>_js/<name>.wasm`, `<build>/<name>.zkey`,
    /// `<build>/artifacts/circuit_vk.json`
    pub fn resolve(build_dir: &Path, name: &str) -> Self {
        Self {
            name: name.to_string(),
            wasm: build_dir.join(format!("{name}_js")).join(format!("{name}.wasm")),
            zkey: build_dir.join(format!("{name}.zkey")),
            vkey: build_dir.join("artifacts").join("circuit_vk.json"),
        }
    }

    fn require(path: &Path) -> Result<(), ProverError> {
        if path.exists() {
            Ok(())
        } else {
            Err(ProverError::CircuitNotFound(format!(
                "{} does not exist",
                path.display()
            )))
        }
    }
}

#[async_trait]
pub trait ProverBackend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Compute the binary witness (`.wtns`) for an input bundle
    async fn compute_witness(
        &self,
        circuit: &CircuitArtifacts,
        inputs: &serde_json::Value,
    ) -> Result<Vec<u8>, ProverError>;

    /// Produce a Groth16 proof and its public signals from a witness
    async fn prove(
        &self,
        circuit: &CircuitArtifacts,
        witness: &[u8],
    ) -> Result<GeneratedProof, ProverError>;

    /// Check a proof against the circuit's verification key
    async fn verify(
        &self,
        circuit: &CircuitArtifacts,
        proof: &GeneratedProof,
    ) -> Result<bool, ProverError>;
}

/// `snarkjs` CLI backend
#[derive(Debug, Clone)]
pub struct SnarkjsBackend {
    program: String,
    /// Leading arguments, e.g. `snarkjs` when run through `npx`
    args: Vec<String>,
}

impl Default for SnarkjsBackend {
    fn default() -> Self {
        Self::new("snarkjs")
    }
}

impl SnarkjsBackend {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Split a whitespace-separated command line such as `npx snarkjs`
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(String::from);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    async fn output<S: AsRef<OsStr>>(&self, args: &[S]) -> Result<Output, ProverError> {
        Ok(Command::new(&self.program)
            .args(&self.args)
            .args(args)
            .output()
            .await?)
    }

    async fn run<S: AsRef<OsStr>>(&self, args: &[S]) -> Result<Output, ProverError> {
        let output = self.output(args).await?;
        if output.status.success() {
            return Ok(output);
        }
        Err(self.failure(args, &output))
    }

    fn failure<S: AsRef<OsStr>>(&self, args: &[S], output: &Output) -> ProverError {
        let args = args
            .iter()
            .map(|a| a.as_ref().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ");
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let stdout = String::from_utf8_lossy(&output.stdout);
        error!(program = %self.program, %args, status = %output.status, %stderr, %stdout, "snarkjs command failed");

        ProverError::CommandFailed {
            program: self.program.clone(),
            args,
            status: output.status.to_string(),
            stderr,
        }
    }
}

#[async_trait]
impl ProverBackend for SnarkjsBackend {
    fn name(&self) -> &'static str {
        "snarkjs"
    }

    #[instrument(skip(self, inputs), fields(circuit = %circuit.name))]
    async fn compute_witness(
        &self,
        circuit: &CircuitArtifacts,
        inputs: &serde_json::Value,
    ) -> Result<Vec<u8>, ProverError> {
        CircuitArtifacts::require(&circuit.wasm)?;

        let scratch = tempfile::tempdir()?;
        let input_path = scratch.path().join("input.json");
        let witness_path = scratch.path().join("witness.wtns");
        tokio::fs::write(&input_path, serde_json::to_vec(inputs)?).await?;

        info!("Calculating witness");
        self.run(&[
            OsStr::new("wtns"),
            OsStr::new("calculate"),
            circuit.wasm.as_os_str(),
            input_path.as_os_str(),
            witness_path.as_os_str(),
        ])
        .await?;

        Ok(tokio::fs::read(&witness_path).await?)
    }

    #[instrument(skip(self, witness), fields(circuit = %circuit.name, witness_len = witness.len()))]
    async fn prove(
        &self,
        circuit: &CircuitArtifacts,
        witness: &[u8],
    ) -> Result<GeneratedProof, ProverError> {
        CircuitArtifacts::require(&circuit.zkey)?;

        let scratch = tempfile::tempdir()?;
        let witness_path = scratch.path().join("witness.wtns");
        let proof_path = scratch.path().join("proof.json");
        let public_path = scratch.path().join("public.json");
        tokio::fs::write(&witness_path, witness).await?;

        info!("Starting Groth16 proof generation...");
        self.run(&[
            OsStr::new("groth16"),
            OsStr::new("prove"),
            circuit.zkey.as_os_str(),
            witness_path.as_os_str(),
            proof_path.as_os_str(),
            public_path.as_os_str(),
        ])
        .await?;

        let proof = serde_json::from_slice(&tokio::fs::read(&proof_path).await?)?;
        let public_signals = serde_json::from_slice(&tokio::fs::read(&public_path).await?)?;

        Ok(GeneratedProof {
            proof,
            public_signals,
        })
    }

    #[instrument(skip(self, proof), fields(circuit = %circuit.name))]
    async fn verify(
        &self,
        circuit: &CircuitArtifacts,
        proof: &GeneratedProof,
    ) -> Result<bool, ProverError> {
        CircuitArtifacts::require(&circuit.vkey)?;

        let scratch = tempfile::tempdir()?;
        let proof_path = scratch.path().join("proof.json");
        let public_path = scratch.path().join("public.json");
        tokio::fs::write(&proof_path, serde_json::to_vec(&proof.proof)?).await?;
        tokio::fs::write(&public_path, serde_json::to_vec(&proof.public_signals)?).await?;

        let args = [
            OsStr::new("groth16"),
            OsStr::new("verify"),
            circuit.vkey.as_os_str(),
            public_path.as_os_str(),
            proof_path.as_os_str(),
        ];
        let output = self.output(&args).await?;

        // snarkjs exits non-zero for an invalid proof; tell that apart from a crash
        let stdout = String::from_utf8_lossy(&output.stdout);
        if output.status.success() && stdout.contains("OK") {
            Ok(true)
        } else if stdout.contains("Invalid proof") {
            Ok(false)
        } else {
            Err(self.failure(&args, &output))
        }
    }
}

/// Mock witness magic, matching the real `.wtns` container header
const MOCK_WITNESS_MAGIC: &[u8; 4] = b"wtns";

/// Deterministic mock backend for development and tests.
///
/// The witness is a SHA-256 digest of the input bundle, the proof is a
/// placeholder Groth16 object and the single public signal is the first 31
/// digest bytes as a field element. No cryptographic guarantees.
#[derive(Debug, Clone, Default)]
pub struct MockBackend;

impl MockBackend {
    fn digest_from_witness(witness: &[u8]) -> Result<&[u8], ProverError> {
        witness
            .strip_prefix(MOCK_WITNESS_MAGIC.as_slice())
            .filter(|digest| digest.len() == 32)
            .ok_or_else(|| {
                ProverError::SerializationError("Not a mock witness".to_string())
            })
    }

    fn public_signal(digest: &[u8]) -> String {
        BigUint::from_bytes_le(&digest[..31]).to_string()
    }
}

#[async_trait]
impl ProverBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn compute_witness(
        &self,
        _circuit: &CircuitArtifacts,
        inputs: &serde_json::Value,
    ) -> Result<Vec<u8>, ProverError> {
        info!("Generating mock witness (dev mode)");

        let digest = Sha256::digest(serde_json::to_vec(inputs)?);
        let mut witness = Vec::with_capacity(36);
        witness.extend_from_slice(MOCK_WITNESS_MAGIC);
        witness.extend_from_slice(&digest);
        Ok(witness)
    }

    async fn prove(
        &self,
        _circuit: &CircuitArtifacts,
        witness: &[u8],
    ) -> Result<GeneratedProof, ProverError> {
        info!("Generating mock proof (dev mode)");

        let digest = Self::digest_from_witness(witness)?;

        Ok(GeneratedProof {
            proof: json!({
                "pi_a": ["0", "0", "1"],
                "pi_b": [["0", "0"], ["0", "0"], ["1", "0"]],
                "pi_c": ["0", "0", "1"],
                "protocol": "groth16",
                "curve": "bn128",
                "mock_digest": hex::encode(digest),
            }),
            public_signals: vec![Self::public_signal(digest)],
        })
    }

    async fn verify(
        &self,
        _circuit: &CircuitArtifacts,
        proof: &GeneratedProof,
    ) -> Result<bool, ProverError> {
        let Some(digest) = proof
            .proof
            .get("mock_digest")
            .and_then(|d| d.as_str())
            .and_then(|d| hex::decode(d).ok())
            .filter(|d| d.len() == 32)
        else {
            return Ok(false);
        };

        Ok(proof.public_signals == [Self::public_signal(&digest)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circuit() -> CircuitArtifacts {
        CircuitArtifacts::resolve(Path::new("build"), "chess")
    }

    #[test]
    fn test_resolve_circuit_layout() {
        let circuit = circuit();
        assert_eq!(circuit.wasm, PathBuf::from("build/chess_js/chess.wasm"));
        assert_eq!(circuit.zkey, PathBuf::from("build/chess.zkey"));
        assert_eq!(circuit.vkey, PathBuf::from("build/artifacts/circuit_vk.json"));
    }

    #[tokio::test]
    async fn test_mock_proof_verifies() {
        let backend = MockBackend;
        let inputs = json!({ "expectedMove": ["13413"] });

        let witness = backend.compute_witness(&circuit(), &inputs).await.unwrap();
        assert!(witness.starts_with(b"wtns"));

        let proof = backend.prove(&circuit(), &witness).await.unwrap();
        assert_eq!(proof.public_signals.len(), 1);
        assert!(backend.verify(&circuit(), &proof).await.unwrap());
    }

    #[tokio::test]
    async fn test_mock_rejects_tampered_signals() {
        let backend = MockBackend;
        let witness = backend
            .compute_witness(&circuit(), &json!({ "fenIndex": "3" }))
            .await
            .unwrap();

        let mut proof = backend.prove(&circuit(), &witness).await.unwrap();
        proof.public_signals = vec!["42".to_string()];
        assert!(!backend.verify(&circuit(), &proof).await.unwrap());
    }

    #[tokio::test]
    async fn test_mock_rejects_foreign_witness() {
        let err = MockBackend.prove(&circuit(), b"not a witness").await.unwrap_err();
        assert!(matches!(err, ProverError::SerializationError(_)));
    }

    #[tokio::test]
    async fn test_snarkjs_missing_circuit() {
        let backend = SnarkjsBackend::default();
        let circuit = CircuitArtifacts::resolve(Path::new("/nonexistent/build"), "chess");

        let err = backend.compute_witness(&circuit, &json!({})).await.unwrap_err();
        assert!(matches!(err, ProverError::CircuitNotFound(_)));
    }

    #[test]
    fn test_snarkjs_from_command_line() {
        let backend = SnarkjsBackend::from_command_line("npx snarkjs").unwrap();
        assert_eq!(backend.program, "npx");
        assert_eq!(backend.args, vec!["snarkjs"]);
        assert!(SnarkjsBackend::from_command_line("").is_none());
    }

    /// Backend running `sh <script>` in place of the snarkjs CLI.
    ///
    /// snarkjs arguments land in `$1..`, so for `groth16 prove` the proof path
    /// is `$5` and the public signals path is `$6`.
    #[cfg(unix)]
    fn scripted_snarkjs(dir: &Path, script: &str) -> SnarkjsBackend {
        let path = dir.join("snarkjs.sh");
        std::fs::write(&path, script).unwrap();
        SnarkjsBackend {
            program: "sh".to_string(),
            args: vec![path.to_string_lossy().into_owned()],
        }
    }

    /// Touch the wasm, zkey and vkey under `<dir>/build`
    #[cfg(unix)]
    fn built_circuit(dir: &Path) -> CircuitArtifacts {
        let circuit = CircuitArtifacts::resolve(&dir.join("build"), "chess");
        for path in [&circuit.wasm, &circuit.zkey, &circuit.vkey] {
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, b"").unwrap();
        }
        circuit
    }

    #[cfg(unix)]
    fn sample_proof() -> GeneratedProof {
        GeneratedProof {
            proof: json!({ "protocol": "groth16", "curve": "bn128" }),
            public_signals: vec!["7".to_string()],
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_snarkjs_verify_accepts_ok() {
        let dir = tempfile::tempdir().unwrap();
        let circuit = built_circuit(dir.path());
        let backend = scripted_snarkjs(dir.path(), "echo '[INFO]  snarkJS: OK!'\nexit 0\n");

        assert!(backend.verify(&circuit, &sample_proof()).await.unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_snarkjs_verify_rejects_invalid_proof() {
        let dir = tempfile::tempdir().unwrap();
        let circuit = built_circuit(dir.path());
        let backend =
            scripted_snarkjs(dir.path(), "echo '[ERROR] snarkJS: Invalid proof'\nexit 1\n");

        assert!(!backend.verify(&circuit, &sample_proof()).await.unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_snarkjs_verify_reports_crash() {
        let dir = tempfile::tempdir().unwrap();
        let circuit = built_circuit(dir.path());
        let backend = scripted_snarkjs(dir.path(), "echo 'vkey is corrupt' >&2\nexit 2\n");

        let err = backend.verify(&circuit, &sample_proof()).await.unwrap_err();
        match err {
            ProverError::CommandFailed { args, stderr, .. } => {
                assert!(args.starts_with("groth16 verify"));
                assert!(stderr.contains("vkey is corrupt"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_snarkjs_verify_passes_public_and_proof() {
        let dir = tempfile::tempdir().unwrap();
        let circuit = built_circuit(dir.path());
        // groth16 verify <vkey> <public> <proof>
        let backend = scripted_snarkjs(
            dir.path(),
            "grep -q '\"7\"' \"$4\" && grep -q groth16 \"$5\" && echo OK!\n",
        );

        assert!(backend.verify(&circuit, &sample_proof()).await.unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_snarkjs_prove_reads_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let circuit = built_circuit(dir.path());
        let script = r#"[ "$1 $2" = "groth16 prove" ] || exit 9
echo '{"pi_a":["1","2","1"],"protocol":"groth16","curve":"bn128"}' > "$5"
echo '["7","11"]' > "$6"
"#;
        let backend = scripted_snarkjs(dir.path(), script);

        let proof = backend.prove(&circuit, b"wtns").await.unwrap();
        assert_eq!(proof.public_signals, vec!["7", "11"]);
        assert_eq!(proof.proof["protocol"], "groth16");
        assert_eq!(proof.proof["pi_a"][1], "2");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_snarkjs_prove_rejects_malformed_public_signals() {
        let dir = tempfile::tempdir().unwrap();
        let circuit = built_circuit(dir.path());
        let backend = scripted_snarkjs(dir.path(), "echo '{}' > \"$5\"\necho 'oops' > \"$6\"\n");

        let err = backend.prove(&circuit, b"wtns").await.unwrap_err();
        assert!(matches!(err, ProverError::SerializationError(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_snarkjs_witness_reads_wtns() {
        let dir = tempfile::tempdir().unwrap();
        let circuit = built_circuit(dir.path());
        // wtns calculate <wasm> <input> <witness>
        let script = r#"grep -q expectedMove "$4" || exit 9
printf 'wtns-bytes' > "$5"
"#;
        let backend = scripted_snarkjs(dir.path(), script);

        let witness = backend
            .compute_witness(&circuit, &json!({ "expectedMove": ["13413"] }))
            .await
            .unwrap();
        assert_eq!(witness, b"wtns-bytes");
    }
}
