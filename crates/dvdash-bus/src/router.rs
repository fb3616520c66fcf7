use dvdash_core::SensorKind;
use dvdash_engine::{Dashboard, DashboardEvent};

/// Where a publish on a given topic goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Telemetry,
    Sensor(SensorKind),
}

/// Maps topic names to ingestion routes. Matching is exact; a broker-side
/// wildcard subscription may deliver topics that route nowhere.
#[derive(Clone, Debug, Default)]
pub struct TopicRouter {
    telemetry: String,
    sensors: Vec<(String, SensorKind)>,
}

impl TopicRouter {
    pub fn new(telemetry: impl Into<String>) -> Self {
        Self {
            telemetry: telemetry.into(),
            sensors: Vec::new(),
        }
    }

    pub fn with_sensor(mut self, topic: Option<impl Into<String>>, kind: SensorKind) -> Self {
        if let Some(topic) = topic {
            self.sensors.push((topic.into(), kind));
        }
        self
    }

    pub fn route(&self, topic: &str) -> Option<Route> {
        if topic == self.telemetry {
            return Some(Route::Telemetry);
        }
        self.sensors
            .iter()
            .find(|(t, _)| t == topic)
            .map(|&(_, kind)| Route::Sensor(kind))
    }

    /// Hand a publish to the dashboard. Unrouted topics are ignored.
    pub fn dispatch(&self, dashboard: &Dashboard, topic: &str, payload: &[u8]) -> Vec<DashboardEvent> {
        match self.route(topic) {
            Some(Route::Telemetry) => dashboard.ingest(payload),
            Some(Route::Sensor(kind)) => dashboard.ingest_sensor(kind, payload),
            None => {
                tracing::trace!(topic, "Ignoring publish on unrouted topic");
                Vec::new()
            }
        }
    }

    pub fn sensor_topics(&self) -> impl Iterator<Item = &str> {
        self.sensors.iter().map(|(t, _)| t.as_str())
    }
}
