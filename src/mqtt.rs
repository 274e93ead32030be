//! Mirrors the meter state to an MQTT broker as JSON.

use anyhow::{Context, Result};
use log::{info, warn};
use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS};
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::state::Snapshot;

/// Publishes queued ahead of the broker connection before new ones are dropped.
const REQUEST_CAPACITY: usize = 10;
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

pub fn snapshot_payload(snapshot: &Snapshot) -> Result<String> {
    serde_json::to_string(snapshot).context("Failed to serialize snapshot to JSON")
}

/// One broker connection for the life of the process. The connection is
/// driven on its own thread; `publish` only enqueues and never waits on the
/// network.
pub struct MqttPublisher {
    client: Client,
    topic: String,
}

impl MqttPublisher {
    pub fn start(config: &Config, host: &str) -> Result<Self> {
        let mut opts = MqttOptions::new(&config.mqtt_client_id, host, config.mqtt_port);
        opts.set_keep_alive(Duration::from_secs(60));

        let (client, connection) = Client::new(opts, REQUEST_CAPACITY);
        let broker = format!("{}:{}", host, config.mqtt_port);
        thread::Builder::new()
            .name("p1-mqtt".into())
            .spawn(move || drive(connection, &broker))
            .context("Failed to spawn MQTT thread")?;

        Ok(Self::new(client, &config.mqtt_topic))
    }

    fn new(client: Client, topic: &str) -> Self {
        Self {
            client,
            topic: topic.to_string(),
        }
    }

    /// QoS 0. Fails instead of blocking when the request queue is full.
    pub fn publish(&self, snapshot: &Snapshot) -> Result<()> {
        let payload = snapshot_payload(snapshot)?;
        self.client
            .try_publish(&self.topic, QoS::AtMostOnce, false, payload)
            .with_context(|| format!("Failed to queue MQTT publish to {}", self.topic))
    }
}

// rumqttc reconnects on the next poll after an error
fn drive(mut connection: Connection, broker: &str) {
    for event in connection.iter() {
        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("Connected to MQTT broker {}", broker);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("MQTT connection to {} failed: {}", broker, e);
                thread::sleep(RECONNECT_DELAY);
            }
        }
    }
}
