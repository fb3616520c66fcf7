//! Protocol normalization: one raw MMDVM JSON message in, one canonical
//! [`Packet`] or [`StatusFragment`] out.
//!
//! The controller publishes each message as an object with a single
//! top-level key naming the protocol (`{"YSF": {...}}`, `{"DMR": {...}}`,
//! ...). That maps directly onto an externally tagged enum, so picking the
//! protocol is a serde concern and each variant gets its own mapping.

use std::fmt;

use serde::Deserialize;

use crate::errors::NormalizeError;
use crate::format::{self, SENTINEL};
use crate::packet::{ChannelType, Metric, Packet, Quality};
use crate::status::StatusFragment;

/// Source value the controller uses for traffic arriving from the network side.
const NETWORK_SOURCE: &str = "network";

/// Result of normalizing one bus message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Normalized {
    Packet(Packet),
    Status(StatusFragment),
}

/// A decoded telemetry message, tagged by its protocol key.
#[derive(Debug, Deserialize)]
pub enum RawMessage {
    #[serde(rename = "YSF")]
    Ysf(YsfFrame),
    #[serde(rename = "DMR")]
    Dmr(DmrFrame),
    #[serde(rename = "M17")]
    M17(M17Frame),
    #[serde(rename = "MMDVM")]
    Mode(ModeFrame),
    #[serde(rename = "RSSI")]
    Rssi(RssiFrame),
    #[serde(rename = "Text")]
    Text(TextFrame),
}

#[derive(Debug, Deserialize)]
pub struct YsfFrame {
    action: String,
    source: Option<String>,
    source_cs: Option<Scalar>,
    #[serde(rename = "dg-id")]
    dg_id: Option<Scalar>,
    #[serde(flatten)]
    quality: QualityFields,
}

#[derive(Debug, Deserialize)]
pub struct DmrFrame {
    action: String,
    slot: i64,
    source: Option<String>,
    source_id: Option<Scalar>,
    destination_type: Option<String>,
    destination_id: Option<Scalar>,
    #[serde(flatten)]
    quality: QualityFields,
}

#[derive(Debug, Deserialize)]
pub struct M17Frame {
    action: String,
    source: Option<String>,
    source_cs: Option<Scalar>,
    destination_cs: Option<Scalar>,
    #[serde(flatten)]
    quality: QualityFields,
}

#[derive(Debug, Deserialize)]
pub struct ModeFrame {
    mode: String,
}

#[derive(Debug, Deserialize)]
pub struct RssiFrame {
    value: f64,
    mode: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TextFrame {
    value: String,
}

/// End-of-call readings. Every field is optional on the wire.
#[derive(Debug, Default, Deserialize)]
struct QualityFields {
    loss: Option<f64>,
    ber: Option<f64>,
    rssi: Option<RssiStats>,
}

#[derive(Debug, Deserialize)]
struct RssiStats {
    ave: Option<f64>,
}

impl QualityFields {
    fn render(&self) -> Quality {
        Quality {
            loss: Metric::percent(self.loss),
            ber: Metric::percent(self.ber),
            rssi: Metric::dbm(self.rssi.as_ref().and_then(|r| r.ave)),
        }
    }
}

/// Identifier that may arrive as a number or a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

fn label(value: Option<&Scalar>) -> String {
    value.map_or_else(|| SENTINEL.to_string(), ToString::to_string)
}

fn is_network(source: Option<&str>) -> bool {
    source == Some(NETWORK_SOURCE)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FrameAction {
    Start,
    End,
}

impl FrameAction {
    fn parse(protocol: &'static str, action: &str) -> Result<Self, NormalizeError> {
        match action {
            "start" | "late_entry" => Ok(Self::Start),
            "end" | "lost" => Ok(Self::End),
            other => Err(NormalizeError::UnknownAction {
                protocol,
                action: other.to_string(),
            }),
        }
    }
}

impl RawMessage {
    pub fn normalize(self) -> Result<Normalized, NormalizeError> {
        match self {
            Self::Ysf(frame) => frame.normalize().map(Normalized::Packet),
            Self::Dmr(frame) => frame.normalize().map(Normalized::Packet),
            Self::M17(frame) => frame.normalize().map(Normalized::Packet),
            Self::Mode(frame) => Ok(Normalized::Status(StatusFragment::mode(frame.mode))),
            Self::Rssi(frame) => Ok(Normalized::Status(StatusFragment {
                rssi: Some(format::dbm(frame.value)),
                mode: frame.mode,
                ..Default::default()
            })),
            Self::Text(frame) => Ok(Normalized::Status(StatusFragment {
                text: Some(frame.value),
                ..Default::default()
            })),
        }
    }
}

impl YsfFrame {
    fn normalize(self) -> Result<Packet, NormalizeError> {
        Ok(match FrameAction::parse("YSF", &self.action)? {
            FrameAction::Start => Packet::start(
                ChannelType::Ysf,
                is_network(self.source.as_deref()),
                label(self.source_cs.as_ref()),
                format!("DG-ID {}", label(self.dg_id.as_ref())),
            ),
            FrameAction::End => Packet::end(ChannelType::Ysf, self.quality.render()),
        })
    }
}

impl DmrFrame {
    fn channel(&self) -> Result<ChannelType, NormalizeError> {
        match self.slot {
            1 => Ok(ChannelType::DmrSlot1),
            2 => Ok(ChannelType::DmrSlot2),
            other => Err(NormalizeError::UnknownSlot(other)),
        }
    }

    fn normalize(self) -> Result<Packet, NormalizeError> {
        let channel = self.channel()?;
        Ok(match FrameAction::parse("DMR", &self.action)? {
            FrameAction::Start => {
                let call_type = if self.destination_type.as_deref() == Some("group") {
                    "TG"
                } else {
                    "PC"
                };
                Packet::start(
                    channel,
                    is_network(self.source.as_deref()),
                    label(self.source_id.as_ref()),
                    format!("{call_type} {}", label(self.destination_id.as_ref())),
                )
            }
            FrameAction::End => Packet::end(channel, self.quality.render()),
        })
    }
}

impl M17Frame {
    fn normalize(self) -> Result<Packet, NormalizeError> {
        Ok(match FrameAction::parse("M17", &self.action)? {
            FrameAction::Start => Packet::start(
                ChannelType::M17,
                is_network(self.source.as_deref()),
                label(self.source_cs.as_ref()),
                label(self.destination_cs.as_ref()),
            ),
            FrameAction::End => Packet::end(ChannelType::M17, self.quality.render()),
        })
    }
}

/// Decode and normalize one payload from the telemetry topic.
pub fn normalize(payload: &[u8]) -> Result<Normalized, NormalizeError> {
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Err(NormalizeError::Empty);
    }
    let raw: RawMessage = serde_json::from_slice(payload)?;
    raw.normalize()
}

/// Auxiliary sensors published on their own topics as bare numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SensorKind {
    Temperature,
    Humidity,
    Swr,
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Swr => "swr",
        })
    }
}

/// Turn a sensor reading into a status fragment carrying only that field.
pub fn normalize_sensor(kind: SensorKind, payload: &[u8]) -> Result<StatusFragment, NormalizeError> {
    let text = String::from_utf8_lossy(payload);
    let text = text.trim().trim_matches('"');
    if text.is_empty() {
        return Err(NormalizeError::Empty);
    }
    let value: f64 = text
        .parse()
        .map_err(|_| NormalizeError::InvalidSensorValue {
            kind,
            value: text.to_string(),
        })?;

    let mut fragment = StatusFragment::default();
    match kind {
        SensorKind::Temperature => fragment.temp = Some(format!("{value:.1}°C")),
        SensorKind::Humidity => fragment.hum = Some(format!("{value:.0}%")),
        SensorKind::Swr => fragment.swr = Some(format!("{value:.2}")),
    }
    Ok(fragment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Action;

    fn packet(json: &str) -> Packet {
        match normalize(json.as_bytes()).unwrap() {
            Normalized::Packet(p) => p,
            other => panic!("expected packet, got {other:?}"),
        }
    }

    fn status(json: &str) -> StatusFragment {
        match normalize(json.as_bytes()).unwrap() {
            Normalized::Status(s) => s,
            other => panic!("expected status, got {other:?}"),
        }
    }

    #[test]
    fn ysf_network_start() {
        let p = packet(
            r#"{"YSF":{"timestamp":"2024-05-01 12:00:00.000","action":"start","source":"network","source_cs":"DL1ABC","dg-id":1}}"#,
        );
        assert_eq!(p.channel, ChannelType::Ysf);
        assert_eq!(p.action, Action::Start);
        assert!(p.external);
        assert_eq!(p.from, "DL1ABC");
        assert_eq!(p.from_name, "DL1ABC");
        assert_eq!(p.to, "DG-ID 1");
        assert_eq!(p.to_name, "DG-ID 1");
        assert!(p.loss.is_none());
    }

    #[test]
    fn ysf_rf_start_is_local() {
        let p = packet(r#"{"YSF":{"action":"start","source":"rf","source_cs":"DL1ABC","dg-id":0}}"#);
        assert!(!p.external);
    }

    #[test]
    fn ysf_end_reads_quality() {
        let p = packet(r#"{"YSF":{"action":"end","loss":12.345,"ber":0.5,"rssi":{"min":-90,"max":-98,"ave":-94}}}"#);
        assert_eq!(p.action, Action::End);
        assert_eq!(p.loss.unwrap().as_str(), "12.35%");
        assert_eq!(p.ber.unwrap().as_str(), "0.50%");
        assert_eq!(p.rssi.unwrap().as_str(), "-94dBm");
    }

    #[test]
    fn ysf_end_without_quality_uses_sentinels() {
        let p = packet(r#"{"YSF":{"action":"end"}}"#);
        assert_eq!(p.loss.unwrap().as_str(), "-");
        assert_eq!(p.ber.unwrap().as_str(), "-");
        assert_eq!(p.rssi.unwrap().as_str(), "-");
    }

    #[test]
    fn lost_collapses_to_end() {
        let p = packet(r#"{"YSF":{"action":"lost"}}"#);
        assert_eq!(p.action, Action::End);
    }

    #[test]
    fn dmr_group_call_on_slot_two() {
        let p = packet(
            r#"{"DMR":{"action":"start","slot":2,"source":"network","source_id":2620001,"destination_type":"group","destination_id":262}}"#,
        );
        assert_eq!(p.channel, ChannelType::DmrSlot2);
        assert!(p.external);
        assert_eq!(p.from, "2620001");
        assert_eq!(p.to, "TG 262");
        assert_eq!(p.to_name, "TG 262");
    }

    #[test]
    fn dmr_private_call_on_slot_one() {
        let p = packet(
            r#"{"DMR":{"action":"start","slot":1,"source":"rf","source_id":2620001,"destination_type":"individual","destination_id":2620002}}"#,
        );
        assert_eq!(p.channel, ChannelType::DmrSlot1);
        assert!(!p.external);
        assert_eq!(p.to, "PC 2620002");
    }

    #[test]
    fn dmr_late_entry_is_a_start() {
        let p = packet(
            r#"{"DMR":{"action":"late_entry","slot":1,"source":"network","source_id":1,"destination_type":"group","destination_id":9}}"#,
        );
        assert_eq!(p.action, Action::Start);
    }

    #[test]
    fn dmr_end_reads_quality_per_slot() {
        let p = packet(r#"{"DMR":{"action":"end","slot":1,"loss":2.0,"ber":1.234}}"#);
        assert_eq!(p.channel, ChannelType::DmrSlot1);
        assert_eq!(p.loss.unwrap().as_str(), "2.00%");
        assert_eq!(p.ber.unwrap().as_str(), "1.23%");
        assert_eq!(p.rssi.unwrap().as_str(), "-");
    }

    #[test]
    fn dmr_unknown_slot_is_rejected() {
        let err = normalize(br#"{"DMR":{"action":"start","slot":3}}"#).unwrap_err();
        assert!(matches!(err, NormalizeError::UnknownSlot(3)));
    }

    #[test]
    fn m17_start_and_end() {
        let p = packet(
            r#"{"M17":{"action":"start","source":"rf","source_cs":"DL1ABC","destination_cs":"ALL"}}"#,
        );
        assert_eq!(p.channel, ChannelType::M17);
        assert_eq!(p.from, "DL1ABC");
        assert_eq!(p.to, "ALL");

        let p = packet(r#"{"M17":{"action":"end","rssi":{"ave":-101.4}}}"#);
        assert_eq!(p.rssi.unwrap().as_str(), "-101dBm");
        assert_eq!(p.loss.unwrap().as_str(), "-");
    }

    #[test]
    fn missing_identifiers_render_as_sentinel() {
        let p = packet(r#"{"YSF":{"action":"start"}}"#);
        assert_eq!(p.from, "-");
        assert_eq!(p.to, "DG-ID -");
    }

    #[test]
    fn unknown_action_is_rejected() {
        let err = normalize(br#"{"M17":{"action":"rewind"}}"#).unwrap_err();
        assert!(matches!(
            err,
            NormalizeError::UnknownAction { protocol: "M17", .. }
        ));
    }

    #[test]
    fn mode_message_is_status() {
        let s = status(r#"{"MMDVM":{"mode":"YSF"}}"#);
        assert_eq!(s.mode.as_deref(), Some("YSF"));
        assert!(s.rssi.is_none());
    }

    #[test]
    fn idle_mode_clears_rssi_and_text() {
        let s = status(r#"{"MMDVM":{"mode":"idle"}}"#);
        assert_eq!(s.rssi.as_deref(), Some("-"));
        assert_eq!(s.text.as_deref(), Some("-"));
    }

    #[test]
    fn rssi_message_is_status() {
        let s = status(r#"{"RSSI":{"mode":"DMR","value":-94}}"#);
        assert_eq!(s.rssi.as_deref(), Some("-94dBm"));
        assert_eq!(s.mode.as_deref(), Some("DMR"));
        assert!(s.text.is_none());
    }

    #[test]
    fn text_message_is_status() {
        let s = status(r#"{"Text":{"value":"Hello from DL1ABC"}}"#);
        assert_eq!(s.text.as_deref(), Some("Hello from DL1ABC"));
        assert!(s.mode.is_none());
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert!(matches!(normalize(b"   ").unwrap_err(), NormalizeError::Empty));
        assert!(matches!(normalize(b"{not json").unwrap_err(), NormalizeError::Decode(_)));
        assert!(matches!(
            normalize(br#"{"P25":{"action":"start"}}"#).unwrap_err(),
            NormalizeError::Decode(_)
        ));
        assert!(matches!(
            normalize(br#"{"YSF":{"action":"end"},"M17":{"action":"end"}}"#).unwrap_err(),
            NormalizeError::Decode(_)
        ));
        assert!(matches!(normalize(b"[1,2]").unwrap_err(), NormalizeError::Decode(_)));
    }

    #[test]
    fn sensor_readings() {
        let f = normalize_sensor(SensorKind::Temperature, b" 21.46 ").unwrap();
        assert_eq!(f.temp.as_deref(), Some("21.5°C"));
        assert!(f.hum.is_none());

        let f = normalize_sensor(SensorKind::Humidity, b"\"54.2\"").unwrap();
        assert_eq!(f.hum.as_deref(), Some("54%"));

        let f = normalize_sensor(SensorKind::Swr, b"1.3").unwrap();
        assert_eq!(f.swr.as_deref(), Some("1.30"));
    }

    #[test]
    fn sensor_garbage_is_rejected() {
        let err = normalize_sensor(SensorKind::Humidity, b"damp").unwrap_err();
        assert!(matches!(err, NormalizeError::InvalidSensorValue { .. }));
        assert!(matches!(
            normalize_sensor(SensorKind::Swr, b"").unwrap_err(),
            NormalizeError::Empty
        ));
    }
}
