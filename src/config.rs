use std::net::IpAddr;
use std::num::NonZeroUsize;
use std::time::Duration;

use clap::Parser;
use dvdash_bus::{BusConfig, TopicRouter};
use dvdash_core::SensorKind;
use dvdash_engine::DashboardConfig;
use dvdash_server::ServerConfig;
use dvdash_telemetry::TelemetryConfig;
use tracing::Level;
use url::Url;

const DEFAULT_MQTT_PORT: u16 = 1883;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid MQTT_HOST {value:?}: {reason}")]
    MqttHost { value: String, reason: String },
    #[error("MQTT_TOPIC is required when MQTT_HOST is set")]
    MissingTopic,
    #[error("invalid client id {0:?}: must be non-empty and not start with a space")]
    ClientId(String),
    #[error("MAX_PACKET_HISTORY_LENGTH must be at least 1")]
    HistoryLength,
    #[error("SEND_QUEUE must be at least 1")]
    SendQueue,
    #[error("invalid LOG_LEVEL {0:?}")]
    LogLevel(String),
}

/// Command line, with every flag also readable from the environment
/// (and from a `.env` file loaded before parsing).
#[derive(Debug, Parser)]
#[command(name = "dvdash", version, about = "Live dashboard for MMDVM digital voice repeaters")]
pub struct Cli {
    /// Address the HTTP server binds to.
    #[arg(long, env = "BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Packets kept for clients connecting late.
    #[arg(long, env = "MAX_PACKET_HISTORY_LENGTH", default_value_t = 50)]
    pub max_packet_history_length: usize,

    /// Events queued per client before it is disconnected.
    #[arg(long, env = "SEND_QUEUE", default_value_t = 256)]
    pub send_queue: usize,

    /// Seconds between SSE keep-alive comments.
    #[arg(long, env = "KEEP_ALIVE", default_value_t = 15)]
    pub keep_alive: u64,

    /// Broker URL, e.g. mqtt://broker:1883. Without it no feed is consumed.
    #[arg(long, env = "MQTT_HOST")]
    pub mqtt_host: Option<String>,

    #[arg(long, env = "MQTT_CLIENT")]
    pub mqtt_client: Option<String>,

    #[arg(long, env = "MQTT_USER")]
    pub mqtt_user: Option<String>,

    #[arg(long, env = "MQTT_PASSWORD", hide_env_values = true)]
    pub mqtt_password: Option<String>,

    /// Topic carrying MMDVM JSON telemetry.
    #[arg(long, env = "MQTT_TOPIC")]
    pub mqtt_topic: Option<String>,

    /// Subscription filter for the telemetry feed. Defaults to MQTT_TOPIC.
    #[arg(long, env = "MQTT_MMDVM")]
    pub mqtt_mmdvm: Option<String>,

    #[arg(long, env = "MQTT_TEMP")]
    pub mqtt_temp: Option<String>,

    #[arg(long, env = "MQTT_HUM")]
    pub mqtt_hum: Option<String>,

    #[arg(long, env = "MQTT_SWR")]
    pub mqtt_swr: Option<String>,

    #[arg(long, env = "REPEATER_CALL_SIGN")]
    pub repeater_call_sign: Option<String>,

    /// Log level (trace, debug, info, warn, error). RUST_LOG wins when set.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, env = "JSON_LOGS", default_value_t = false)]
    pub json_logs: bool,
}

/// Validated settings for every component.
#[derive(Debug)]
pub struct Config {
    pub telemetry: TelemetryConfig,
    pub dashboard: DashboardConfig,
    pub server: ServerConfig,
    pub bus: Option<BusConfig>,
}

impl Cli {
    pub fn into_config(self) -> Result<Config, ConfigError> {
        let log_level: Level = self
            .log_level
            .parse()
            .map_err(|_| ConfigError::LogLevel(self.log_level.clone()))?;
        let history_capacity =
            NonZeroUsize::new(self.max_packet_history_length).ok_or(ConfigError::HistoryLength)?;
        if self.send_queue == 0 {
            return Err(ConfigError::SendQueue);
        }

        let bus = match &self.mqtt_host {
            Some(host) => Some(self.bus_config(host)?),
            None => None,
        };

        Ok(Config {
            telemetry: TelemetryConfig {
                log_level,
                json: self.json_logs,
                ..TelemetryConfig::default()
            },
            dashboard: DashboardConfig {
                history_capacity,
                max_send_queue: self.send_queue,
            },
            server: ServerConfig {
                bind: self.bind,
                port: self.port,
                keep_alive_secs: self.keep_alive,
                call_sign: self.repeater_call_sign.filter(|c| !c.trim().is_empty()),
            },
            bus,
        })
    }

    fn bus_config(&self, host: &str) -> Result<BusConfig, ConfigError> {
        let (host, port) = parse_broker(host)?;
        let topic = self
            .mqtt_topic
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingTopic)?;

        let client_id = self
            .mqtt_client
            .clone()
            .unwrap_or_else(|| format!("dvdash-{}", std::process::id()));
        if client_id.is_empty() || client_id.starts_with(' ') {
            return Err(ConfigError::ClientId(client_id));
        }

        let router = TopicRouter::new(topic.clone())
            .with_sensor(non_empty(&self.mqtt_temp), SensorKind::Temperature)
            .with_sensor(non_empty(&self.mqtt_hum), SensorKind::Humidity)
            .with_sensor(non_empty(&self.mqtt_swr), SensorKind::Swr);

        Ok(BusConfig {
            host,
            port,
            client_id,
            credentials: self
                .mqtt_user
                .clone()
                .map(|user| (user, self.mqtt_password.clone().unwrap_or_default())),
            subscribe_filter: non_empty(&self.mqtt_mmdvm).unwrap_or(topic),
            router,
            keep_alive: Duration::from_secs(30),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

/// Accepts `mqtt://host:port`, `tcp://host:port` or a bare `host[:port]`.
fn parse_broker(value: &str) -> Result<(String, u16), ConfigError> {
    let invalid = |reason: &str| ConfigError::MqttHost {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let with_scheme = if value.contains("://") {
        value.to_string()
    } else {
        format!("mqtt://{value}")
    };
    let url = Url::parse(&with_scheme).map_err(|e| invalid(&e.to_string()))?;

    match url.scheme() {
        "mqtt" | "tcp" => {}
        other => return Err(invalid(&format!("unsupported scheme {other:?}"))),
    }
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| invalid("missing host"))?;

    Ok((host.to_string(), url.port().unwrap_or(DEFAULT_MQTT_PORT)))
}
