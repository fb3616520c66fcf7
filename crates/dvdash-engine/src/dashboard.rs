use std::num::NonZeroUsize;
use std::sync::Arc;

use dvdash_core::{
    normalize, normalize_sensor, Action, NormalizeError, Normalized, Packet, SensorKind,
    StatusFragment, StatusSnapshot,
};
use dvdash_telemetry::MetricsRecorder;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::event::DashboardEvent;
use crate::fanout::{Fanout, SubscriberId, Subscription};
use crate::history::HistoryBuffer;
use crate::sessions::SessionTracker;
use crate::status::StatusAggregator;

/// Tunables for the ingestion engine.
#[derive(Clone, Debug)]
pub struct DashboardConfig {
    /// Packets kept for backfill.
    pub history_capacity: NonZeroUsize,
    /// Per-subscriber delivery queue depth before disconnect.
    pub max_send_queue: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            history_capacity: NonZeroUsize::new(50).unwrap_or(NonZeroUsize::MIN),
            max_send_queue: 256,
        }
    }
}

/// State a newly connected client needs before live events.
#[derive(Clone, Debug)]
pub struct Backfill {
    pub history: Vec<Packet>,
    pub status: StatusSnapshot,
}

struct DashboardState {
    sessions: SessionTracker,
    status: StatusAggregator,
    history: HistoryBuffer,
}

/// Process-wide ingestion engine: normalization, call tracking, status,
/// history and live fanout behind a single entry point.
///
/// Every state change and the publish of its results happen under one lock,
/// and subscribing takes the same lock. A subscriber therefore sees each
/// emitted event exactly once: either in its backfill or live, never both.
pub struct Dashboard {
    state: Mutex<DashboardState>,
    fanout: Arc<Fanout>,
    metrics: Option<Arc<MetricsRecorder>>,
}

impl Dashboard {
    pub fn new(config: DashboardConfig, metrics: Option<Arc<MetricsRecorder>>) -> Self {
        Self {
            state: Mutex::new(DashboardState {
                sessions: SessionTracker::new(),
                status: StatusAggregator::new(),
                history: HistoryBuffer::new(config.history_capacity),
            }),
            fanout: Fanout::new(config.max_send_queue),
            metrics,
        }
    }

    /// Normalize one telemetry payload and fold it into state.
    /// Returns the events that were emitted, in emission order.
    pub fn ingest(&self, payload: &[u8]) -> Vec<DashboardEvent> {
        self.count("ingest.messages", &[]);
        match normalize(payload) {
            Ok(Normalized::Packet(packet)) => self.apply_packet(packet),
            Ok(Normalized::Status(fragment)) => self.apply_status(fragment),
            Err(e) => {
                self.reject(&e, payload);
                Vec::new()
            }
        }
    }

    /// Fold one auxiliary sensor reading into the status snapshot.
    pub fn ingest_sensor(&self, kind: SensorKind, payload: &[u8]) -> Vec<DashboardEvent> {
        let sensor = kind.to_string();
        self.count("ingest.messages", &[("sensor", sensor.as_str())]);
        match normalize_sensor(kind, payload) {
            Ok(fragment) => self.apply_status(fragment),
            Err(e) => {
                self.reject(&e, payload);
                Vec::new()
            }
        }
    }

    /// Run an already-normalized packet through the session tracker, then
    /// historize and publish everything it emits.
    pub fn apply_packet(&self, packet: Packet) -> Vec<DashboardEvent> {
        let action = packet.action;
        let channel = packet.channel;

        let mut state = self.state.lock();
        let emitted = state.sessions.on_packet(packet);

        let mut events = Vec::with_capacity(emitted.len());
        for packet in emitted {
            self.count("packets.emitted", &[("action", packet.action.as_str())]);
            state.history.append(packet.clone());
            let event = DashboardEvent::Packet(packet);
            self.publish(&event);
            events.push(event);
        }

        match action {
            Action::Start if events.len() > 1 => {
                self.count_n("sessions.synthesized", &[("reason", "forced")], events.len() as u64 - 1);
            }
            Action::End if events.is_empty() => {
                self.count("ingest.unmatched_end", &[("channel", channel.as_str())]);
            }
            _ => {}
        }
        if let Some(metrics) = &self.metrics {
            metrics.gauge_set("sessions.open", &[], state.sessions.len() as f64);
        }
        events
    }

    /// Merge a status fragment and publish the full snapshot.
    pub fn apply_status(&self, fragment: StatusFragment) -> Vec<DashboardEvent> {
        let mut state = self.state.lock();
        let snapshot = state.status.update(fragment);
        let event = DashboardEvent::Status(snapshot);
        self.publish(&event);
        vec![event]
    }

    /// Backfill history, oldest first.
    pub fn history(&self) -> Vec<Packet> {
        self.state.lock().history.snapshot()
    }

    pub fn history_len(&self) -> usize {
        self.state.lock().history.len()
    }

    pub fn latest_status(&self) -> StatusSnapshot {
        self.state.lock().status.snapshot().clone()
    }

    /// Calls currently considered in progress.
    pub fn open_sessions(&self) -> Vec<Packet> {
        self.state.lock().sessions.open_sessions().to_vec()
    }

    /// Live events only, starting with the next emitted event.
    pub fn subscribe(&self) -> Subscription {
        let _state = self.state.lock();
        self.fanout.subscribe()
    }

    /// Live events plus the history and status as of the moment of
    /// subscribing, taken atomically with registration.
    pub fn subscribe_with_backfill(&self) -> (Subscription, Backfill) {
        let state = self.state.lock();
        let subscription = self.fanout.subscribe();
        let backfill = Backfill {
            history: state.history.snapshot(),
            status: state.status.snapshot().clone(),
        };
        (subscription, backfill)
    }

    pub fn unsubscribe(&self, id: &SubscriberId) -> bool {
        self.fanout.unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.fanout.count()
    }

    pub fn metrics(&self) -> Option<&Arc<MetricsRecorder>> {
        self.metrics.as_ref()
    }

    fn publish(&self, event: &DashboardEvent) {
        let report = self.fanout.publish(event);
        if report.disconnected > 0 {
            self.count_n("fanout.disconnected", &[], report.disconnected as u64);
        }
    }

    fn reject(&self, error: &NormalizeError, payload: &[u8]) {
        self.count("ingest.dropped", &[("reason", error.error_kind())]);
        match error {
            NormalizeError::Empty => debug!("Skipping empty payload"),
            _ => warn!(
                error = %error,
                payload = %String::from_utf8_lossy(payload),
                "Could not decode telemetry message"
            ),
        }
    }

    fn count(&self, name: &str, labels: &[(&str, &str)]) {
        self.count_n(name, labels, 1);
    }

    fn count_n(&self, name: &str, labels: &[(&str, &str)], n: u64) {
        if let Some(metrics) = &self.metrics {
            metrics.counter_inc(name, labels, n);
        }
    }
}
