use std::fmt;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::format::{self, SENTINEL};

/// Independently trackable call slot. DMR has two timeslots that may carry
/// calls at the same time; every other mode has a single shared channel.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum ChannelType {
    #[serde(rename = "YSF")]
    Ysf,
    #[serde(rename = "DMR TS1")]
    DmrSlot1,
    #[serde(rename = "DMR TS2")]
    DmrSlot2,
    #[serde(rename = "M17")]
    M17,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ysf => "YSF",
            Self::DmrSlot1 => "DMR TS1",
            Self::DmrSlot2 => "DMR TS2",
            Self::M17 => "M17",
        }
    }

    /// The other half of a slot pair, if this channel belongs to one.
    pub fn slot_partner(&self) -> Option<ChannelType> {
        match self {
            Self::DmrSlot1 => Some(Self::DmrSlot2),
            Self::DmrSlot2 => Some(Self::DmrSlot1),
            Self::Ysf | Self::M17 => None,
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Start,
    End,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
        }
    }
}

/// A rendered quality metric: either a formatted reading or the `-` sentinel.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metric(String);

impl Metric {
    pub fn unavailable() -> Self {
        Self(SENTINEL.to_string())
    }

    pub fn percent(value: Option<f64>) -> Self {
        Self(format::percent_or_sentinel(value))
    }

    pub fn dbm(value: Option<f64>) -> Self {
        Self(format::dbm_or_sentinel(value))
    }

    pub fn is_available(&self) -> bool {
        self.0 != SENTINEL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Loss, bit error rate and signal strength reported with an end of call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Quality {
    pub loss: Metric,
    pub ber: Metric,
    pub rssi: Metric,
}

impl Quality {
    pub fn unavailable() -> Self {
        Self {
            loss: Metric::unavailable(),
            ber: Metric::unavailable(),
            rssi: Metric::unavailable(),
        }
    }
}

/// Canonical call event as shipped to dashboard clients.
///
/// Packets are immutable records: closures are built as new packets from
/// the originating start via [`Packet::closed_at`] / [`Packet::closed_with`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    #[serde(rename = "typ")]
    pub channel: ChannelType,
    pub action: Action,
    pub external: bool,
    pub from: String,
    #[serde(rename = "fromName")]
    pub from_name: String,
    pub to: String,
    #[serde(rename = "toName")]
    pub to_name: String,
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loss: Option<Metric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ber: Option<Metric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rssi: Option<Metric>,
}

impl Packet {
    /// A start of transmission observed now.
    pub fn start(
        channel: ChannelType,
        external: bool,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        let from = from.into();
        let to = to.into();
        Self {
            channel,
            action: Action::Start,
            external,
            from_name: from.clone(),
            from,
            to_name: to.clone(),
            to,
            time: timestamp_now(),
            loss: None,
            ber: None,
            rssi: None,
        }
    }

    /// An end of transmission observed now. The bus does not repeat caller
    /// details on end, so those stay empty; only channel and quality matter.
    pub fn end(channel: ChannelType, quality: Quality) -> Self {
        Self {
            channel,
            action: Action::End,
            external: false,
            from: String::new(),
            from_name: String::new(),
            to: String::new(),
            to_name: String::new(),
            time: timestamp_now(),
            loss: Some(quality.loss),
            ber: Some(quality.ber),
            rssi: Some(quality.rssi),
        }
    }

    pub fn is_start(&self) -> bool {
        self.action == Action::Start
    }

    /// Quality carried by this packet, with absent metrics as sentinel.
    pub fn quality(&self) -> Quality {
        Quality {
            loss: self.loss.clone().unwrap_or_else(Metric::unavailable),
            ber: self.ber.clone().unwrap_or_else(Metric::unavailable),
            rssi: self.rssi.clone().unwrap_or_else(Metric::unavailable),
        }
    }

    /// Synthesized closure of this call at `time` with no quality readings.
    pub fn closed_at(&self, time: impl Into<String>) -> Self {
        self.closed_with(time, Quality::unavailable())
    }

    /// Closure of this call carrying the quality reported by a genuine end.
    pub fn closed_with(&self, time: impl Into<String>, quality: Quality) -> Self {
        Self {
            action: Action::End,
            time: time.into(),
            loss: Some(quality.loss),
            ber: Some(quality.ber),
            rssi: Some(quality.rssi),
            ..self.clone()
        }
    }
}

/// ISO-8601 UTC with millisecond precision, e.g. `2024-05-01T12:00:00.000Z`.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_packet_wire_shape() {
        let packet = Packet::start(ChannelType::Ysf, true, "DL1ABC", "DG-ID 1");
        let json = serde_json::to_value(&packet).unwrap();
        assert_eq!(json["typ"], "YSF");
        assert_eq!(json["action"], "start");
        assert_eq!(json["external"], true);
        assert_eq!(json["from"], "DL1ABC");
        assert_eq!(json["fromName"], "DL1ABC");
        assert_eq!(json["to"], "DG-ID 1");
        assert_eq!(json["toName"], "DG-ID 1");
        assert!(json["time"].as_str().unwrap().ends_with('Z'));
        assert!(json.get("loss").is_none());
        assert!(json.get("ber").is_none());
        assert!(json.get("rssi").is_none());
    }

    #[test]
    fn closure_keeps_identity_and_renders_sentinels() {
        let start = Packet::start(ChannelType::DmrSlot2, false, "2620001", "TG 262");
        let end = start.closed_at("2024-05-01T12:00:00.000Z");

        assert_eq!(end.action, Action::End);
        assert_eq!(end.channel, ChannelType::DmrSlot2);
        assert_eq!(end.from, "2620001");
        assert_eq!(end.to, "TG 262");
        assert_eq!(end.time, "2024-05-01T12:00:00.000Z");

        let json = serde_json::to_value(&end).unwrap();
        assert_eq!(json["loss"], "-");
        assert_eq!(json["ber"], "-");
        assert_eq!(json["rssi"], "-");

        // the start record itself is untouched
        assert_eq!(start.action, Action::Start);
        assert!(start.loss.is_none());
    }

    #[test]
    fn closed_with_copies_quality() {
        let start = Packet::start(ChannelType::M17, false, "DL1ABC", "ALL");
        let quality = Quality {
            loss: Metric::percent(Some(1.5)),
            ber: Metric::percent(None),
            rssi: Metric::dbm(Some(-94.0)),
        };
        let end = start.closed_with("t", quality);
        assert_eq!(end.loss.as_ref().unwrap().as_str(), "1.50%");
        assert!(!end.ber.as_ref().unwrap().is_available());
        assert_eq!(end.rssi.as_ref().unwrap().as_str(), "-94dBm");
    }

    #[test]
    fn slot_partners() {
        assert_eq!(ChannelType::DmrSlot1.slot_partner(), Some(ChannelType::DmrSlot2));
        assert_eq!(ChannelType::DmrSlot2.slot_partner(), Some(ChannelType::DmrSlot1));
        assert_eq!(ChannelType::Ysf.slot_partner(), None);
        assert_eq!(ChannelType::M17.slot_partner(), None);
    }

    #[test]
    fn channel_display_matches_wire() {
        for channel in [
            ChannelType::Ysf,
            ChannelType::DmrSlot1,
            ChannelType::DmrSlot2,
            ChannelType::M17,
        ] {
            let json = serde_json::to_string(&channel).unwrap();
            assert_eq!(json, format!("\"{channel}\""));
        }
    }
}
