use anyhow::{ensure, Context, Result};
use clap::Parser;
use log::{error, info, warn};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use p1_exporter::config::Config;
use p1_exporter::http;
use p1_exporter::mqtt::MqttPublisher;
use p1_exporter::protocol::P1Connection;
use p1_exporter::state::MeterState;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = Config::parse();
    info!("Starting p1-exporter {}", env!("CARGO_PKG_VERSION"));
    ensure!(
        config.web_telemetry_path.starts_with('/'),
        "Telemetry path must start with '/': {}",
        config.web_telemetry_path
    );

    let conn = P1Connection::open(
        &config.p1_usb_device,
        config.p1_baudrate,
        Duration::from_millis(config.p1_timeout),
    )?;

    let publisher = config
        .mqtt_host
        .as_deref()
        .map(|host| MqttPublisher::start(&config, host))
        .transpose()?;

    let meter = Arc::new(MeterState::new());

    {
        let meter = Arc::clone(&meter);
        thread::Builder::new()
            .name("p1-ingest".into())
            .spawn(move || ingest(conn, &meter, publisher.as_ref()))
            .context("Failed to spawn ingestion thread")?;
    }

    let router = http::build_router(meter, &config.web_telemetry_path);
    http::serve(&config.web_listen_address, router).await
}

/// Read telegrams forever, folding each one into the meter state.
fn ingest(mut conn: P1Connection, meter: &MeterState, publisher: Option<&MqttPublisher>) {
    loop {
        let telegram = match conn.read() {
            Ok(telegram) => telegram,
            Err(e) => {
                error!("Failed to read meter: {:#}", e);
                // Avoid spinning on a dead port
                thread::sleep(Duration::from_secs(1));
                continue;
            }
        };

        if let Err(e) = meter.apply(&telegram) {
            error!("Failed to apply telegram from {}: {:#}", telegram.header, anyhow::Error::new(e));
            continue;
        }

        if let Some(publisher) = publisher {
            if let Err(e) = publisher.publish(&meter.snapshot()) {
                warn!("Failed to publish: {:#}", e);
            }
        }
    }
}
