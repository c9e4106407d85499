//! Services for the chess email prover
//!
//! Field extraction plus the external collaborators it feeds: the email input
//! generator and the Groth16 prover backend.

pub mod driver;
pub mod extractor;
pub mod inputs;
pub mod prover;

pub use driver::{DriverError, ProofDriver};
pub use extractor::{ExtractError, FieldEncoding};
pub use inputs::{EmailInputGenerator, InputError};
pub use prover::{CircuitArtifacts, ProverBackend, ProverError};
