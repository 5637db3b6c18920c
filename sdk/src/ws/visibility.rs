//! Foreground/background signal.
//!
//! Platforms with a notion of visibility (a browser tab, a mobile app moving
//! to the foreground, a laptop waking up) feed it to the manager. Becoming
//! visible is treated as a hint that the network is likely back.

use serde::{Deserialize, Serialize};

/// Visibility of the host surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// In the foreground.
    Visible,
    /// In the background.
    Hidden,
}

impl Visibility {
    /// Returns true for [`Visibility::Visible`].
    #[must_use]
    pub const fn is_visible(self) -> bool {
        matches!(self, Self::Visible)
    }
}
