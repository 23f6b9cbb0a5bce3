//! Common error type for the Intake crates.

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, IntakeError>;

/// Errors surfaced by the core layers.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
