use std::net::IpAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use dvdash_engine::Dashboard;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub keep_alive_secs: u64,
    /// Station identity reported by `/health`.
    pub call_sign: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::from([0, 0, 0, 0]),
            port: 3000,
            keep_alive_secs: 15,
            call_sign: None,
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub dashboard: Arc<Dashboard>,
    pub keep_alive_secs: u64,
    pub call_sign: Option<Arc<str>>,
}

impl AppState {
    pub fn new(dashboard: Arc<Dashboard>, config: &ServerConfig) -> Self {
        Self {
            dashboard,
            keep_alive_secs: config.keep_alive_secs,
            call_sign: config.call_sign.as_deref().map(Arc::from),
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/stream", get(handlers::stream))
        .route("/history", get(handlers::history))
        .route("/status", get(handlers::status))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind the listener and serve in the background.
pub async fn start(
    config: ServerConfig,
    dashboard: Arc<Dashboard>,
) -> Result<ServerHandle, std::io::Error> {
    let router = build_router(AppState::new(dashboard, &config));

    let listener = tokio::net::TcpListener::bind((config.bind, config.port)).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(bind = %local_addr.ip(), port = local_addr.port(), "Dashboard server started");

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "Dashboard server stopped");
        }
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        server,
    })
}

/// Handle returned by `start()`. Dropping it leaves the server running;
/// call [`ServerHandle::shutdown`] to stop it.
pub struct ServerHandle {
    pub port: u16,
    server: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    pub fn shutdown(self) {
        self.server.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;
    use std::time::Duration;

    use dvdash_engine::DashboardConfig;
    use dvdash_telemetry::MetricsRecorder;

    const YSF_START: &[u8] =
        br#"{"YSF":{"action":"start","source":"rf","source_cs":"DL1ABC","dg-id":0}}"#;
    const YSF_END: &[u8] =
        br#"{"YSF":{"action":"end","loss":0.5,"ber":1.234,"rssi":{"ave":-47.4}}}"#;

    fn dashboard() -> Arc<Dashboard> {
        Arc::new(Dashboard::new(
            DashboardConfig {
                history_capacity: NonZeroUsize::new(10).unwrap(),
                max_send_queue: 64,
            },
            Some(Arc::new(MetricsRecorder::new())),
        ))
    }

    async fn start_test_server(dashboard: Arc<Dashboard>) -> ServerHandle {
        let config = ServerConfig {
            bind: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            keep_alive_secs: 15,
            call_sign: Some("DB0XYZ".into()),
        };
        start(config, dashboard).await.unwrap()
    }

    /// Read SSE chunks until `needle` shows up, returning everything read.
    async fn read_until(resp: &mut reqwest::Response, needle: &str) -> String {
        let mut body = String::new();
        tokio::time::timeout(Duration::from_secs(5), async {
            while !body.contains(needle) {
                let chunk = resp.chunk().await.unwrap().expect("stream ended");
                body.push_str(&String::from_utf8_lossy(&chunk));
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {needle:?}, got {body:?}"));
        body
    }

    #[tokio::test]
    async fn health_endpoint() {
        let dash = dashboard();
        dash.ingest(YSF_START);
        let handle = start_test_server(Arc::clone(&dash)).await;

        let url = format!("http://127.0.0.1:{}/health", handle.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["callSign"], "DB0XYZ");
        assert_eq!(body["openSessions"], 1);
        assert_eq!(body["historyLen"], 1);
        assert_eq!(body["subscribers"], 0);
        assert!(body["metrics"].as_array().is_some_and(|m| !m.is_empty()));
    }

    #[tokio::test]
    async fn history_and_status_endpoints() {
        let dash = dashboard();
        dash.ingest(YSF_START);
        dash.ingest(YSF_END);
        dash.ingest(br#"{"MMDVM":{"mode":"YSF"}}"#);
        let handle = start_test_server(Arc::clone(&dash)).await;
        let base = format!("http://127.0.0.1:{}", handle.port);

        let history: serde_json::Value = reqwest::get(format!("{base}/history"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let history = history.as_array().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["action"], "start");
        assert_eq!(history[0]["from"], "DL1ABC");
        assert_eq!(history[1]["action"], "end");
        assert_eq!(history[1]["loss"], "0.50%");
        assert_eq!(history[1]["rssi"], "-47dBm");

        let status: serde_json::Value = reqwest::get(format!("{base}/status"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["mode"], "YSF");
        assert_eq!(status["temp"], "-");
    }

    #[tokio::test]
    async fn stream_sends_status_then_live_packets() {
        let dash = dashboard();
        let handle = start_test_server(Arc::clone(&dash)).await;

        let url = format!("http://127.0.0.1:{}/stream", handle.port);
        let mut resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 200);
        let content_type = resp.headers()["content-type"].to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/event-stream"));

        let first = read_until(&mut resp, "\n\n").await;
        assert!(first.contains("event: status"));

        // registration happens before the handler returns
        assert_eq!(dash.subscriber_count(), 1);
        dash.ingest(YSF_START);

        let live = read_until(&mut resp, "DL1ABC").await;
        assert!(live.contains(r#""action":"start""#));
        assert!(!live.contains("event: status"));
    }

    #[tokio::test]
    async fn stream_backfills_history_on_request() {
        let dash = dashboard();
        dash.ingest(YSF_START);
        dash.ingest(YSF_END);
        let handle = start_test_server(Arc::clone(&dash)).await;

        let url = format!("http://127.0.0.1:{}/stream?backfill=true", handle.port);
        let mut resp = reqwest::get(&url).await.unwrap();

        let body = read_until(&mut resp, r#""action":"end""#).await;
        let status_at = body.find("event: status").unwrap();
        let start_at = body.find(r#""action":"start""#).unwrap();
        assert!(status_at < start_at);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let handle = start_test_server(dashboard()).await;
        let url = format!("http://127.0.0.1:{}/ws", handle.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 404);
    }
}
