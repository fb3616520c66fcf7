use crate::normalize::SensorKind;

/// Reasons a raw bus payload could not be turned into a packet or status fragment.
/// None of these are fatal; callers log and drop the message.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("empty payload")]
    Empty,

    #[error("undecodable payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unknown {protocol} action: {action}")]
    UnknownAction {
        protocol: &'static str,
        action: String,
    },

    #[error("unknown DMR slot: {0}")]
    UnknownSlot(i64),

    #[error("invalid {kind} reading: {value}")]
    InvalidSensorValue { kind: SensorKind, value: String },
}

impl NormalizeError {
    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Decode(_) => "decode",
            Self::UnknownAction { .. } => "unknown_action",
            Self::UnknownSlot(_) => "unknown_slot",
            Self::InvalidSensorValue { .. } => "invalid_sensor_value",
        }
    }
}
