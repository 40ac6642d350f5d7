//! Serial session management
//!
//! This module handles:
//! - Port discovery and automatic opening of known ports
//! - Open attempts and their stale results
//! - Hot-plug reconnection
//! - Best-effort, non-blocking command delivery

mod manager;

pub use manager::{LinkEvent, SessionConfig, SessionManager, SessionNotice};
