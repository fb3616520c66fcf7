mod config;

use std::sync::Arc;

use clap::Parser;
use dvdash_engine::Dashboard;
use dvdash_telemetry::init_telemetry;

use crate::config::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Cli::parse().into_config()?;

    let telemetry = init_telemetry(config.telemetry);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting dvdash");

    let dashboard = Arc::new(Dashboard::new(config.dashboard, Some(telemetry.metrics())));

    let server = dvdash_server::start(config.server, Arc::clone(&dashboard)).await?;
    tracing::info!(port = server.port, "Dashboard ready");

    let bus = match config.bus {
        Some(bus) => Some(dvdash_bus::spawn(bus, Arc::clone(&dashboard))),
        None => {
            tracing::warn!("MQTT_HOST not set, no telemetry will be received");
            None
        }
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    if let Some(bus) = bus {
        bus.abort();
    }
    server.shutdown();
    Ok(())
}
