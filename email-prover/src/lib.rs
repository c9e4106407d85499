// Library entry point for chess-email-prover
// Exposes core modules for testing and external use

pub mod config;
pub mod services;
pub mod types;

// Re-export commonly used items
pub use services::driver;
pub use services::extractor;
pub use services::prover;
