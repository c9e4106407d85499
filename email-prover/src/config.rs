//! Prover Configuration
//!
//! Handles loading configuration from environment variables, then applying
//! command-line arguments on top.

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;

use crate::services::extractor::FieldEncoding;

/// Circuit input layout for the extracted fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EncodingKind {
    /// 31-byte little-endian chunks, one field element each
    #[default]
    Packed,
    /// One field element per byte, zero-padded to a fixed length
    Padded,
}

/// Prover configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Raw email file to prove
    #[serde(default)]
    pub email_file: PathBuf,

    /// Suppress progress logging
    #[serde(default)]
    pub silent: bool,

    /// Directory holding the compiled circuit and keys
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,

    /// Directory receiving input.json, input.wtns, proof.json, public.json
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_circuit_name")]
    pub circuit_name: String,

    #[serde(default)]
    pub encoding: EncodingKind,

    /// Fixed field length for the padded encoding
    #[serde(default = "default_max_field_length")]
    pub max_field_length: usize,

    /// Run the verifier after proving
    #[serde(default = "default_verify")]
    pub verify: bool,

    /// Enable development mode (mock proofs, unsigned inputs)
    #[serde(default)]
    pub dev_mode: bool,

    /// snarkjs command line
    #[serde(default = "default_snarkjs_bin")]
    pub snarkjs_bin: String,

    /// Email input generator command line
    #[serde(default = "default_input_generator")]
    pub input_generator: String,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("build")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("proofs")
}

fn default_circuit_name() -> String {
    "chess".to_string()
}

fn default_max_field_length() -> usize {
    128
}

fn default_verify() -> bool {
    true
}

fn default_snarkjs_bin() -> String {
    "snarkjs".to_string()
}

fn default_input_generator() -> String {
    "zk-email-inputs".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            email_file: PathBuf::new(),
            silent: false,
            build_dir: default_build_dir(),
            output_dir: default_output_dir(),
            circuit_name: default_circuit_name(),
            encoding: EncodingKind::default(),
            max_field_length: default_max_field_length(),
            verify: default_verify(),
            dev_mode: cfg!(feature = "dev-mode"),
            snarkjs_bin: default_snarkjs_bin(),
            input_generator: default_input_generator(),
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let defaults = Self::default();

        Self {
            build_dir: std::env::var("CHESS_BUILD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.build_dir),
            output_dir: std::env::var("CHESS_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            circuit_name: std::env::var("CIRCUIT_NAME").unwrap_or(defaults.circuit_name),
            encoding: std::env::var("FIELD_ENCODING")
                .ok()
                .and_then(|e| EncodingKind::from_str(&e, true).ok())
                .unwrap_or(defaults.encoding),
            max_field_length: std::env::var("MAX_FIELD_LENGTH")
                .ok()
                .and_then(|n| n.parse().ok())
                .unwrap_or(defaults.max_field_length),
            dev_mode: defaults.dev_mode
                || std::env::var("DEV_MODE").unwrap_or_default() == "true",
            snarkjs_bin: std::env::var("SNARKJS_BIN").unwrap_or(defaults.snarkjs_bin),
            input_generator: std::env::var("EMAIL_INPUT_GENERATOR")
                .unwrap_or(defaults.input_generator),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            json_logs: std::env::var("JSON_LOGS").unwrap_or_default() == "true",
            ..defaults
        }
    }

    /// Override with command-line arguments
    pub fn with_args(mut self, args: CliArgs) -> Self {
        self.email_file = args.email_file;
        self.silent = args.silent;
        if let Some(build_dir) = args.build_dir {
            self.build_dir = build_dir;
        }
        if let Some(output_dir) = args.output_dir {
            self.output_dir = output_dir;
        }
        if let Some(circuit_name) = args.circuit_name {
            self.circuit_name = circuit_name;
        }
        if let Some(encoding) = args.encoding {
            self.encoding = encoding;
        }
        if let Some(max_field_length) = args.max_field_length {
            self.max_field_length = max_field_length;
        }
        if args.skip_verify {
            self.verify = false;
        }
        if args.dev_mode {
            self.dev_mode = true;
        }
        self
    }

    /// Log filter that overrides both `RUST_LOG` and `LOG_LEVEL`.
    ///
    /// `--silent` keeps errors only, so a failed run still says why.
    pub fn forced_log_filter(&self) -> Option<&'static str> {
        self.silent.then_some("error")
    }

    /// Encoding applied to the extracted move and FEN
    pub fn field_encoding(&self) -> FieldEncoding {
        match self.encoding {
            EncodingKind::Packed => FieldEncoding::Packed,
            EncodingKind::Padded => FieldEncoding::Padded {
                max_length: self.max_field_length,
            },
        }
    }
}

/// Generate a Groth16 proof that a signed email carries a chess move.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to email file
    #[arg(long)]
    pub email_file: PathBuf,

    /// No console logs
    #[arg(long)]
    pub silent: bool,

    /// Directory holding the compiled circuit and keys
    #[arg(long)]
    pub build_dir: Option<PathBuf>,

    /// Directory to write proof artifacts to
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Circuit name used to locate the wasm and zkey
    #[arg(long)]
    pub circuit_name: Option<String>,

    /// Circuit input layout for the move and FEN
    #[arg(long, value_enum)]
    pub encoding: Option<EncodingKind>,

    /// Field length for the padded encoding
    #[arg(long)]
    pub max_field_length: Option<usize>,

    /// Do not verify the proof after generating it
    #[arg(long)]
    pub skip_verify: bool,

    /// Mock proofs and unsigned inputs, no external tooling needed
    #[arg(long)]
    pub dev_mode: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_circuit_layout() {
        let config = Config::default();
        assert_eq!(config.build_dir, PathBuf::from("build"));
        assert_eq!(config.output_dir, PathBuf::from("proofs"));
        assert_eq!(config.circuit_name, "chess");
        assert!(config.verify);
        assert_eq!(config.field_encoding(), FieldEncoding::Packed);
    }

    #[test]
    fn test_email_file_is_required() {
        assert!(CliArgs::try_parse_from(["chess-email-prover", "--silent"]).is_err());
    }

    #[test]
    fn test_args_override_config() {
        let args = CliArgs::try_parse_from([
            "chess-email-prover",
            "--email-file",
            "mail.eml",
            "--silent",
            "--encoding",
            "padded",
            "--max-field-length",
            "16",
            "--output-dir",
            "out",
            "--skip-verify",
        ])
        .unwrap();

        let config = Config::default().with_args(args);
        assert_eq!(config.email_file, PathBuf::from("mail.eml"));
        assert!(config.silent);
        assert!(!config.verify);
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.build_dir, PathBuf::from("build"));
        assert_eq!(
            config.field_encoding(),
            FieldEncoding::Padded { max_length: 16 }
        );
    }

    #[test]
    fn test_silent_keeps_errors_only() {
        assert_eq!(Config::default().forced_log_filter(), None);

        let args =
            CliArgs::try_parse_from(["chess-email-prover", "--email-file", "m.eml", "--silent"])
                .unwrap();
        let config = Config::default().with_args(args);
        assert_eq!(config.forced_log_filter(), Some("error"));
    }

    #[test]
    fn test_encoding_deserializes_lowercase() {
        let config: Config =
            serde_json::from_str(r#"{ "encoding": "padded", "max_field_length": 8 }"#).unwrap();
        assert_eq!(config.encoding, EncodingKind::Padded);
        assert_eq!(config.circuit_name, "chess");
    }
}
