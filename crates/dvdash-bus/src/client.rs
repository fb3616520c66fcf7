use std::sync::Arc;
use std::time::Duration;

use dvdash_engine::Dashboard;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};

use crate::router::TopicRouter;

/// Default reconnect delay after the first failure.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
/// Reconnect delays never exceed this.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// Broker connection settings.
#[derive(Clone, Debug)]
pub struct BusConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    /// Username and password, sent only when a username is configured.
    pub credentials: Option<(String, String)>,
    /// Filter passed to SUBSCRIBE for the telemetry feed.
    pub subscribe_filter: String,
    pub router: TopicRouter,
    pub keep_alive: Duration,
}

impl BusConfig {
    fn mqtt_options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(self.client_id.clone(), self.host.clone(), self.port);
        options.set_keep_alive(self.keep_alive);
        if let Some((username, password)) = &self.credentials {
            options.set_credentials(username.clone(), password.clone());
        }
        options
    }

    /// Every filter to subscribe on (re)connect.
    pub fn subscriptions(&self) -> Vec<String> {
        let mut filters = vec![self.subscribe_filter.clone()];
        for topic in self.router.sensor_topics() {
            if !filters.iter().any(|f| f == topic) {
                filters.push(topic.to_string());
            }
        }
        filters
    }
}

/// Exponential reconnect delay, `base * 2^attempt` capped at `max`.
#[derive(Clone, Debug)]
pub struct Backoff {
    attempt: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_DELAY_MS)
    }
}

impl Backoff {
    pub fn new(base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            attempt: 0,
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Delay before the next attempt. Advances the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let exponential = self.base_delay_ms.saturating_mul(1u64 << self.attempt.min(31));
        self.attempt = self.attempt.saturating_add(1);
        Duration::from_millis(exponential.min(self.max_delay_ms))
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// Drive the broker connection forever, feeding publishes into `dashboard`.
///
/// Connection errors are logged and retried with backoff. Connectivity
/// changes never touch dashboard state; calls open at disconnect stay open
/// until the feed closes them.
pub async fn run(config: BusConfig, dashboard: Arc<Dashboard>) {
    let (client, mut eventloop) = AsyncClient::new(config.mqtt_options(), 64);
    let subscriptions = config.subscriptions();
    let mut backoff = Backoff::default();

    tracing::info!(
        host = %config.host,
        port = config.port,
        client_id = %config.client_id,
        "Connecting to MQTT broker"
    );

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                backoff.reset();
                tracing::info!(host = %config.host, "Connected to MQTT broker");
                subscribe_all(&client, &subscriptions);
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                config.router.dispatch(&dashboard, &publish.topic, &publish.payload);
            }
            Ok(Event::Incoming(Packet::SubAck(ack))) => {
                tracing::debug!(pkid = ack.pkid, codes = ?ack.return_codes, "Subscription acknowledged");
            }
            Ok(_) => {}
            Err(e) => {
                let delay = backoff.next_delay();
                tracing::warn!(
                    error = %e,
                    attempt = backoff.attempt(),
                    retry_in_ms = delay.as_millis() as u64,
                    "MQTT connection error"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

fn subscribe_all(client: &AsyncClient, filters: &[String]) {
    for filter in filters {
        // the request queue is drained by the same loop that calls us,
        // so never await here
        match client.try_subscribe(filter.as_str(), QoS::AtMostOnce) {
            Ok(()) => tracing::info!(topic = %filter, "Subscribed"),
            Err(e) => tracing::error!(topic = %filter, error = %e, "Could not subscribe"),
        }
    }
}

/// Spawn [`run`] on the current runtime.
pub fn spawn(config: BusConfig, dashboard: Arc<Dashboard>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run(config, dashboard))
}
