//! Type definitions for the chess email prover
//!
//! Circuit input bundle, generator output and proof artifacts. Field names
//! serialize in camelCase to match the signal names the circuit declares.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Output of the email-verification input generator.
///
/// Every value is a decimal string (or an array of them) ready to be fed to
/// the circuit as field elements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailVerifierInputs {
    pub email_header: Vec<String>,
    pub email_header_length: String,
    pub pubkey: Vec<String>,
    pub signature: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_body: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_body_length: Option<String>,
    #[serde(
        default,
        rename = "precomputedSHA",
        skip_serializing_if = "Option::is_none"
    )]
    pub precomputed_sha: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_hash_index: Option<String>,
}

/// Full input bundle for the chess circuit.
///
/// The email verifier inputs are flattened so the serialized JSON is a single
/// flat object, as the witness calculator expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChessCircuitInputs {
    #[serde(flatten)]
    pub email: EmailVerifierInputs,
    pub move_index: String,
    pub fen_index: String,
    pub expected_move: Vec<String>,
    pub expected_fen: Vec<String>,
    /// Only present with the padded encoding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_move_length: Option<String>,
    /// Only present with the padded encoding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_fen_length: Option<String>,
}

/// Move and position pulled out of an email body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChessFields {
    pub chess_move: ExtractedField,
    pub fen: ExtractedField,
}

/// A single labeled value and where it starts in the body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedField {
    /// Offset of the first byte after the label
    pub index: usize,
    /// Value with surrounding whitespace removed
    pub value: String,
}

impl ExtractedField {
    pub fn bytes(&self) -> &[u8] {
        self.value.as_bytes()
    }
}

/// Proof and public signals returned by the prover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedProof {
    /// Groth16 proof object as emitted by the prover (`pi_a`, `pi_b`, `pi_c`, ...)
    pub proof: serde_json::Value,
    /// Public signals as decimal strings
    pub public_signals: Vec<String>,
}

/// Summary of a completed driver run
#[derive(Debug, Clone)]
pub struct ProofRun {
    pub chess_move: String,
    pub fen: String,
    pub input_path: PathBuf,
    pub witness_path: PathBuf,
    pub proof_path: PathBuf,
    pub public_path: PathBuf,
    /// `None` when verification was skipped
    pub verified: Option<bool>,
    /// Hex SHA-256 of the serialized input bundle
    pub input_digest: String,
    pub generation_time_ms: u64,
}
