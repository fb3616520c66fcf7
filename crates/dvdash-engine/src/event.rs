use dvdash_core::{Packet, StatusSnapshot};
use serde::Serialize;

/// Everything pushed to live dashboard subscribers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum DashboardEvent {
    Packet(Packet),
    Status(StatusSnapshot),
}

impl DashboardEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Packet(_) => "packet",
            Self::Status(_) => "status",
        }
    }

    pub fn as_packet(&self) -> Option<&Packet> {
        match self {
            Self::Packet(p) => Some(p),
            Self::Status(_) => None,
        }
    }

    /// JSON of the payload alone, without the type envelope.
    pub fn payload_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Packet(p) => serde_json::to_string(p),
            Self::Status(s) => serde_json::to_string(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dvdash_core::ChannelType;

    #[test]
    fn envelope_serialization() {
        let event = DashboardEvent::Status(StatusSnapshot::default());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["data"]["mode"], "-");
    }

    #[test]
    fn payload_json_has_no_envelope() {
        let event = DashboardEvent::Packet(Packet::start(ChannelType::M17, false, "DL1ABC", "ALL"));
        let json: serde_json::Value = serde_json::from_str(&event.payload_json().unwrap()).unwrap();
        assert_eq!(json["typ"], "M17");
        assert!(json.get("type").is_none());
        assert_eq!(event.event_type(), "packet");
        assert!(event.as_packet().is_some());
    }
}
