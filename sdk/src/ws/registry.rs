//! Process-wide manager slots.
//!
//! Components that are wired up independently still have to share one
//! physical connection. They meet here, under a well-known slot name.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock, PoisonError};

use super::error::WsError;
use super::manager::ConnectionManager;

/// Slot holding the notifications manager.
pub const NOTIFICATIONS_SLOT: &str = "slate.notifications";

static SLOTS: OnceLock<Mutex<HashMap<&'static str, ConnectionManager>>> = OnceLock::new();

fn slots() -> &'static Mutex<HashMap<&'static str, ConnectionManager>> {
    SLOTS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Returns the manager in `slot`, creating it with `init` if the slot is
/// empty or its event loop has stopped (for example because the runtime
/// that hosted it shut down).
///
/// # Errors
///
/// Returns the error of `init`.
pub fn get_or_try_init<F>(slot: &'static str, init: F) -> Result<ConnectionManager, WsError>
where
    F: FnOnce() -> Result<ConnectionManager, WsError>,
{
    let mut slots = slots().lock().unwrap_or_else(PoisonError::into_inner);

    if let Some(existing) = slots.get(slot).filter(|manager| manager.is_running()) {
        return Ok(existing.clone());
    }

    let manager = init()?;
    slots.insert(slot, manager.clone());
    Ok(manager)
}

/// Returns the live manager in `slot`, if any.
#[must_use]
pub fn get(slot: &str) -> Option<ConnectionManager> {
    slots()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(slot)
        .filter(|manager| manager.is_running())
        .cloned()
}

/// Empties `slot` and returns what it held.
pub fn remove(slot: &str) -> Option<ConnectionManager> {
    slots()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(slot)
}
