//! Email Verifier Input Generation
//!
//! The DKIM-related circuit inputs (canonicalized header, public key,
//! signature, body) are produced by an external generator. This module wraps
//! it behind [`EmailInputGenerator`] so the chess-specific logic can run
//! against any implementation.

use async_trait::async_trait;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::types::EmailVerifierInputs;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Failed to run input generator: {0}")]
    Io(#[from] std::io::Error),
    #[error("Input generator exited with {status}: {stderr}")]
    GeneratorFailed { status: String, stderr: String },
    #[error("Malformed input generator output: {0}")]
    MalformedOutput(#[from] serde_json::Error),
    #[error("Generator output has no email body")]
    MissingBody,
    #[error("Invalid byte value in email body: {0:?}")]
    InvalidByte(String),
    #[error("Failed to parse email: {0}")]
    Parse(#[from] mailparse::MailParseError),
}

/// Options forwarded to the generator
#[derive(Debug, Clone, Default)]
pub struct EmailInputOptions {
    /// Body prefix up to which the SHA-256 state is precomputed outside the
    /// circuit. Empty means the whole body is hashed in-circuit.
    pub sha_precompute_selector: String,
}

#[async_trait]
pub trait EmailInputGenerator: Send + Sync {
    async fn generate(
        &self,
        raw_email: &[u8],
        options: &EmailInputOptions,
    ) -> Result<EmailVerifierInputs, InputError>;
}

/// Decode the generator's `emailBody` char array back into bytes.
pub fn email_body_bytes(inputs: &EmailVerifierInputs) -> Result<Vec<u8>, InputError> {
    let body = inputs.email_body.as_ref().ok_or(InputError::MissingBody)?;

    body.iter()
        .map(|c| c.parse::<u8>().map_err(|_| InputError::InvalidByte(c.clone())))
        .collect()
}

/// Encode bytes as a circuit char array (one decimal string per byte)
pub fn to_char_array(bytes: &[u8]) -> Vec<String> {
    bytes.iter().map(|b| b.to_string()).collect()
}

/// Runs an external program that reads the raw email on stdin and prints
/// [`EmailVerifierInputs`] JSON on stdout.
#[derive(Debug, Clone)]
pub struct CommandInputGenerator {
    program: String,
    args: Vec<String>,
}

impl CommandInputGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a whitespace-separated command line into program and arguments
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(String::from);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl EmailInputGenerator for CommandInputGenerator {
    async fn generate(
        &self,
        raw_email: &[u8],
        options: &EmailInputOptions,
    ) -> Result<EmailVerifierInputs, InputError> {
        info!(program = %self.program, "Running email input generator");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg("--sha-precompute-selector")
            .arg(&options.sha_precompute_selector)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Feed stdin concurrently so a chatty generator cannot block on a full pipe
        let writer = child.stdin.take().map(|mut stdin| {
            let email = raw_email.to_vec();
            tokio::spawn(async move { stdin.write_all(&email).await })
        });

        let output = child.wait_with_output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            error!(status = %output.status, %stderr, "Email input generator failed");
            return Err(InputError::GeneratorFailed {
                status: output.status.to_string(),
                stderr,
            });
        }

        // A generator may exit successfully before draining stdin
        if let Some(writer) = writer {
            match writer.await.map_err(std::io::Error::other)? {
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    debug!("Email input generator exited without reading the whole email");
                }
                result => result?,
            }
        }

        let inputs: EmailVerifierInputs = serde_json::from_slice(&output.stdout)?;
        debug!(
            header_len = inputs.email_header.len(),
            has_body = inputs.email_body.is_some(),
            "Email verifier inputs generated"
        );
        Ok(inputs)
    }
}

/// Splits the message into header and body without any signature material.
///
/// Only meaningful together with the mock prover backend.
#[derive(Debug, Clone, Default)]
pub struct UnsignedInputGenerator;

#[async_trait]
impl EmailInputGenerator for UnsignedInputGenerator {
    async fn generate(
        &self,
        raw_email: &[u8],
        _options: &EmailInputOptions,
    ) -> Result<EmailVerifierInputs, InputError> {
        let (headers, body_offset) = mailparse::parse_headers(raw_email)?;
        debug!(
            header_count = headers.len(),
            body_offset, "Parsed unsigned email"
        );

        let header = &raw_email[..body_offset];
        let body = &raw_email[body_offset..];

        Ok(EmailVerifierInputs {
            email_header: to_char_array(header),
            email_header_length: header.len().to_string(),
            pubkey: Vec::new(),
            signature: Vec::new(),
            email_body: Some(to_char_array(body)),
            email_body_length: Some(body.len().to_string()),
            precomputed_sha: None,
            body_hash_index: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMAIL: &[u8] = b"From: alice@example.com\r\nSubject: move\r\n\r\nMOVE: e4\r\nFEN: 8/8/8/8/8/8/8/8 w - - 0 1\r\n";

    #[test]
    fn test_body_bytes_roundtrip() {
        let inputs = EmailVerifierInputs {
            email_body: Some(to_char_array(b"MOVE")),
            ..Default::default()
        };
        assert_eq!(email_body_bytes(&inputs).unwrap(), b"MOVE".to_vec());
    }

    #[test]
    fn test_body_bytes_rejects_missing_and_invalid() {
        let missing = EmailVerifierInputs::default();
        assert!(matches!(
            email_body_bytes(&missing),
            Err(InputError::MissingBody)
        ));

        let invalid = EmailVerifierInputs {
            email_body: Some(vec!["256".into()]),
            ..Default::default()
        };
        assert!(matches!(
            email_body_bytes(&invalid),
            Err(InputError::InvalidByte(v)) if v == "256"
        ));
    }

    #[test]
    fn test_from_command_line() {
        let generator = CommandInputGenerator::from_command_line("node gen.js --foo").unwrap();
        assert_eq!(generator.program(), "node");
        assert_eq!(generator.args, vec!["gen.js", "--foo"]);
        assert!(CommandInputGenerator::from_command_line("   ").is_none());
    }

    #[tokio::test]
    async fn test_unsigned_generator_splits_header_and_body() {
        let inputs = UnsignedInputGenerator
            .generate(EMAIL, &EmailInputOptions::default())
            .await
            .unwrap();

        let body = email_body_bytes(&inputs).unwrap();
        assert!(body.starts_with(b"MOVE: e4"));
        assert_eq!(
            inputs.email_header_length.parse::<usize>().unwrap() + body.len(),
            EMAIL.len()
        );
        assert!(inputs.signature.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_generator_parses_stdout() {
        let script = r#"cat > /dev/null; echo '{"emailHeader":["1"],"emailHeaderLength":"1","pubkey":[],"signature":[],"emailBody":["77"]}'"#;
        let generator = CommandInputGenerator::new("sh", vec!["-c".into(), script.into()]);

        let inputs = generator
            .generate(EMAIL, &EmailInputOptions::default())
            .await
            .unwrap();
        assert_eq!(inputs.email_body, Some(vec!["77".to_string()]));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_generator_may_leave_stdin_unread() {
        let script = r#"head -c 16 > /dev/null; echo '{"emailHeader":["1"],"emailHeaderLength":"1","pubkey":[],"signature":[],"emailBody":["77"]}'"#;
        let generator = CommandInputGenerator::new("sh", vec!["-c".into(), script.into()]);

        // Far larger than a pipe buffer, so the writer is still busy when the generator exits
        let mut email = EMAIL.to_vec();
        email.resize(4 * 1024 * 1024, b'x');

        let inputs = generator
            .generate(&email, &EmailInputOptions::default())
            .await
            .unwrap();
        assert_eq!(inputs.email_header_length, "1");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_generator_reports_failure() {
        let generator = CommandInputGenerator::new(
            "sh",
            vec!["-c".into(), "echo 'no DKIM-Signature' >&2; exit 3".into()],
        );

        let err = generator
            .generate(EMAIL, &EmailInputOptions::default())
            .await
            .unwrap_err();
        match err {
            InputError::GeneratorFailed { stderr, .. } => {
                assert!(stderr.contains("no DKIM-Signature"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
