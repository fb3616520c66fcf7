use serde::{Deserialize, Serialize};

use crate::format::SENTINEL;

/// Mode reported by the controller when no transmission is active.
pub const IDLE_MODE: &str = "idle";

/// Latest known repeater state. Every field starts as the `-` sentinel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub mode: String,
    pub rssi: String,
    pub text: String,
    pub swr: String,
    pub temp: String,
    pub hum: String,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            mode: SENTINEL.to_string(),
            rssi: SENTINEL.to_string(),
            text: SENTINEL.to_string(),
            swr: SENTINEL.to_string(),
            temp: SENTINEL.to_string(),
            hum: SENTINEL.to_string(),
        }
    }
}

/// Partial status update; `None` fields leave the snapshot untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusFragment {
    pub mode: Option<String>,
    pub rssi: Option<String>,
    pub text: Option<String>,
    pub swr: Option<String>,
    pub temp: Option<String>,
    pub hum: Option<String>,
}

impl StatusFragment {
    /// Mode change. Going idle also clears signal strength and talker alias.
    pub fn mode(mode: impl Into<String>) -> Self {
        let mode = mode.into();
        let clears = mode == IDLE_MODE;
        Self {
            mode: Some(mode),
            rssi: clears.then(|| SENTINEL.to_string()),
            text: clears.then(|| SENTINEL.to_string()),
            ..Default::default()
        }
    }

    pub fn is_idle(&self) -> bool {
        self.mode.as_deref() == Some(IDLE_MODE)
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
