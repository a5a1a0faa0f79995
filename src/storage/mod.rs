//! Persistence layer.
//!
//! Saves and loads a session snapshot to/from a JSON file so a player
//! can walk away and resume with the same balance, loans and upgrades.

use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::{debug, info};

use crate::engine::session::SessionState;

/// Default state file path.
pub const DEFAULT_STATE_FILE: &str = "coinflip_session.json";

/// Save a session snapshot to a JSON file.
///
/// Refuses to save while a flip is in flight; the wager would be
/// restored without anything left to reveal it.
pub fn save_state(state: &SessionState, path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);
    if state.is_flipping() {
        bail!("Cannot save while a flip is in flight");
    }
    let json = serde_json::to_string_pretty(state)
        .context("Failed to serialise session state")?;

    std::fs::write(path, &json)
        .context(format!("Failed to write state to {path}"))?;

    debug!(path, balance = %state.balance, "State saved");
    Ok(())
}

/// Load a session snapshot from a JSON file.
/// Returns None if the file doesn't exist (fresh start).
pub fn load_state(path: Option<&str>) -> Result<Option<SessionState>> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);

    if !Path::new(path).exists() {
        info!(path, "No saved session found, starting fresh");
        return Ok(None);
    }

    let json = std::fs::read_to_string(path)
        .context(format!("Failed to read state from {path}"))?;

    let state: SessionState = serde_json::from_str(&json)
        .context(format!("Failed to parse state from {path}"))?;

    info!(
        path,
        balance = %state.balance,
        flips = state.flip_index,
        loans = state.loans.len(),
        "Session loaded from disk"
    );

    Ok(Some(state))
}

/// Delete the state file (for testing or reset).
pub fn delete_state(path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);
    if Path::new(path).exists() {
        std::fs::remove_file(path)
            .context(format!("Failed to delete state file {path}"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
