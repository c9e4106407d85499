//! # Chess Email Prover
//!
//! Generates a Groth16 proof that a DKIM-signed email carries a given chess
//! move and board position.
//!
//! ## Usage
//!
//! ```bash
//! # Real proving (needs snarkjs and the compiled circuit under ./build)
//! cargo run -- --email-file move.eml
//!
//! # Development mode (mock proofs, no external tooling)
//! DEV_MODE=true cargo run -- --email-file move.eml
//! ```
//!
//! ## Outputs
//!
//! `input.json`, `input.wtns`, `proof.json` and `public.json` in the output
//! directory (`proofs/` by default).

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use chess_email_prover::config::{CliArgs, Config};
use chess_email_prover::driver::ProofDriver;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = Config::from_env().with_args(CliArgs::parse());

    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        dev_mode = config.dev_mode,
        encoding = ?config.encoding,
        "Starting chess email prover"
    );

    match generate(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Error generating proof");
            ExitCode::FAILURE
        }
    }
}

async fn generate(config: Config) -> anyhow::Result<()> {
    let driver = ProofDriver::from_config(config)?;
    let run = driver.run().await?;

    if run.verified == Some(true) {
        println!("Proof Verified");
    }

    info!(
        chess_move = %run.chess_move,
        proof = %run.proof_path.display(),
        public = %run.public_path.display(),
        generation_time_ms = run.generation_time_ms,
        "Done"
    );
    Ok(())
}

/// Initialize logging based on configuration
///
/// `--silent` keeps errors only; `RUST_LOG` wins over `LOG_LEVEL` otherwise.
fn init_logging(config: &Config) {
    let filter = match config.forced_log_filter() {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
    };

    if config.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(true),
            )
            .init();
    }
}
