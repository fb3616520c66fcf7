use dvdash_core::format::SENTINEL;
use dvdash_core::{StatusFragment, StatusSnapshot};

/// Folds incremental status fragments into one running snapshot.
#[derive(Debug, Default)]
pub struct StatusAggregator {
    snapshot: StatusSnapshot,
}

impl StatusAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a fragment and return the complete updated snapshot.
    pub fn update(&mut self, fragment: StatusFragment) -> StatusSnapshot {
        let idle = fragment.is_idle();
        let StatusFragment {
            mode,
            rssi,
            text,
            swr,
            temp,
            hum,
        } = fragment;

        let s = &mut self.snapshot;
        for (slot, value) in [
            (&mut s.mode, mode),
            (&mut s.rssi, rssi),
            (&mut s.text, text),
            (&mut s.swr, swr),
            (&mut s.temp, temp),
            (&mut s.hum, hum),
        ] {
            if let Some(value) = value {
                *slot = value;
            }
        }

        if idle {
            s.rssi = SENTINEL.to_string();
            s.text = SENTINEL.to_string();
        }

        self.snapshot.clone()
    }

    pub fn snapshot(&self) -> &StatusSnapshot {
        &self.snapshot
    }
}
