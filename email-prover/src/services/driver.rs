//! Proof Driver
//!
//! Sequences one proving run: email -> circuit inputs -> witness -> proof ->
//! verification, writing every artifact to the output directory.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::config::Config;
use crate::services::extractor::{extract_move_and_fen, ExtractError, FieldEncoding};
use crate::services::inputs::{
    email_body_bytes, CommandInputGenerator, EmailInputGenerator, EmailInputOptions, InputError,
    UnsignedInputGenerator,
};
use crate::services::prover::{
    CircuitArtifacts, MockBackend, ProverBackend, ProverError, SnarkjsBackend,
};
use crate::types::{ChessCircuitInputs, ChessFields, EmailVerifierInputs, ProofRun};

pub const INPUT_FILE: &str = "input.json";
pub const WITNESS_FILE: &str = "input.wtns";
pub const PROOF_FILE: &str = "proof.json";
pub const PUBLIC_FILE: &str = "public.json";

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Email file not found: {}", .0.display())]
    EmailFileNotFound(PathBuf),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Prover(#[from] ProverError),
    #[error("Proof Verification Failed")]
    VerificationFailed,
}

impl DriverError {
    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.to_path_buf();
        move |source| DriverError::Io { path, source }
    }
}

/// Merge generator output with the extracted move and FEN.
///
/// Pure: no I/O, so it can be checked without any external tooling.
pub fn build_circuit_inputs(
    email: EmailVerifierInputs,
    encoding: &FieldEncoding,
) -> Result<(ChessCircuitInputs, ChessFields), DriverError> {
    let body = email_body_bytes(&email)?;
    let fields = extract_move_and_fen(&body)?;

    let expected_move = encoding.encode(fields.chess_move.bytes());
    let expected_fen = encoding.encode(fields.fen.bytes());

    let inputs = ChessCircuitInputs {
        email,
        move_index: fields.chess_move.index.to_string(),
        fen_index: fields.fen.index.to_string(),
        expected_move: expected_move.values(),
        expected_fen: expected_fen.values(),
        expected_move_length: expected_move.length().map(|l| l.to_string()),
        expected_fen_length: expected_fen.length().map(|l| l.to_string()),
    };

    Ok((inputs, fields))
}

/// Generate the full circuit input bundle for a raw email.
pub async fn generate_chess_circuit_inputs(
    raw_email: &[u8],
    generator: &dyn EmailInputGenerator,
    encoding: &FieldEncoding,
) -> Result<ChessCircuitInputs, DriverError> {
    let email = generator
        .generate(raw_email, &EmailInputOptions::default())
        .await?;
    let (inputs, _) = build_circuit_inputs(email, encoding)?;
    Ok(inputs)
}

pub struct ProofDriver {
    config: Config,
    generator: Box<dyn EmailInputGenerator>,
    backend: Box<dyn ProverBackend>,
}

impl ProofDriver {
    /// Create a driver with explicit collaborators
    pub fn new(
        config: Config,
        generator: Box<dyn EmailInputGenerator>,
        backend: Box<dyn ProverBackend>,
    ) -> Self {
        Self {
            config,
            generator,
            backend,
        }
    }

    /// Pick collaborators from configuration
    pub fn from_config(config: Config) -> Result<Self, DriverError> {
        if config.dev_mode {
            info!("Running in DEVELOPMENT mode - proofs are MOCKED");
            return Ok(Self::new(
                config,
                Box::new(UnsignedInputGenerator),
                Box::new(MockBackend),
            ));
        }

        let generator = CommandInputGenerator::from_command_line(&config.input_generator)
            .ok_or_else(|| DriverError::Config("email input generator is empty".to_string()))?;
        let backend = SnarkjsBackend::from_command_line(&config.snarkjs_bin)
            .ok_or_else(|| DriverError::Config("snarkjs command is empty".to_string()))?;

        Ok(Self::new(config, Box::new(generator), Box::new(backend)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    #[instrument(skip(self), fields(email_file = %self.config.email_file.display(), backend = self.backend.name()))]
    pub async fn run(&self) -> Result<ProofRun, DriverError> {
        let start = Instant::now();
        let email_file = &self.config.email_file;

        if !email_file.is_file() {
            return Err(DriverError::EmailFileNotFound(email_file.clone()));
        }

        let output_dir = &self.config.output_dir;
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(DriverError::io(output_dir))?;

        info!("Generating input and proof");

        let raw_email = tokio::fs::read(email_file)
            .await
            .map_err(DriverError::io(email_file))?;

        let email = self
            .generator
            .generate(&raw_email, &EmailInputOptions::default())
            .await?;
        let (inputs, fields) = build_circuit_inputs(email, &self.config.field_encoding())?;

        info!(
            chess_move = %fields.chess_move.value,
            fen = %fields.fen.value,
            move_index = fields.chess_move.index,
            fen_index = fields.fen.index,
            "Extracted move and position"
        );
        debug!(?inputs, "Generated inputs");

        let input_json = serde_json::to_vec_pretty(&inputs)?;
        let input_digest = hex::encode(Sha256::digest(&input_json));
        let input_path = output_dir.join(INPUT_FILE);
        write_artifact(&input_path, &input_json).await?;
        info!(path = %input_path.display(), %input_digest, "Inputs written");

        let circuit = CircuitArtifacts::resolve(&self.config.build_dir, &self.config.circuit_name);

        let witness = self
            .backend
            .compute_witness(&circuit, &serde_json::to_value(&inputs)?)
            .await?;
        let witness_path = output_dir.join(WITNESS_FILE);
        write_artifact(&witness_path, &witness).await?;
        info!(path = %witness_path.display(), size = witness.len(), "Witness written");

        let generated = self.backend.prove(&circuit, &witness).await?;

        let proof_path = output_dir.join(PROOF_FILE);
        write_artifact(&proof_path, &serde_json::to_vec_pretty(&generated.proof)?).await?;
        info!(path = %proof_path.display(), "Proof written");

        let public_path = output_dir.join(PUBLIC_FILE);
        write_artifact(
            &public_path,
            &serde_json::to_vec_pretty(&generated.public_signals)?,
        )
        .await?;
        info!(
            path = %public_path.display(),
            signals = generated.public_signals.len(),
            "Public inputs written"
        );

        let verified = if self.config.verify {
            if !self.backend.verify(&circuit, &generated).await? {
                return Err(DriverError::VerificationFailed);
            }
            info!("Proof verified");
            Some(true)
        } else {
            info!("Skipping proof verification");
            None
        };

        let generation_time_ms = start.elapsed().as_millis() as u64;
        info!(generation_time_ms, "Proof generated successfully");

        Ok(ProofRun {
            chess_move: fields.chess_move.value,
            fen: fields.fen.value,
            input_path,
            witness_path,
            proof_path,
            public_path,
            verified,
            input_digest,
            generation_time_ms,
        })
    }
}

async fn write_artifact(path: &Path, bytes: &[u8]) -> Result<(), DriverError> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(DriverError::io(path))
}
