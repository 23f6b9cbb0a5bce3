//! # Intake Core
//!
//! Shared foundation for the Intake service: configuration loading and the
//! common error type. Everything else (storage, scheduler, gateway) builds
//! on this crate.

pub mod config;
pub mod error;

pub use config::IntakeConfig;
pub use error::{IntakeError, Result};
