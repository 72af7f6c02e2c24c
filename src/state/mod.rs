//! Session-scoped state
//!
//! Handles:
//! - Session lifecycle (sign-in / sign-out)
//! - Per-session stores, confirmation queue and engine

mod manager;
mod session;

pub use manager::SessionManager;
pub use session::{Session, SessionInfo};
