//! # Intake Gateway
//!
//! HTTP and WebSocket surface for the Intake service:
//! - JWT login + bearer-token middleware
//! - application CRUD and manual status updates
//! - WebSocket event hub pushing status changes to dashboard clients
//!
//! Handlers are thin: they validate input, call the store, and keep the
//! status scheduler's registry in sync (register on create, unregister on
//! manual resolution or deletion).

pub mod auth;
pub mod hub;
pub mod routes;
pub mod server;
pub mod ws;

pub use hub::EventHub;
pub use server::{build_router, AppState};
