use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "p1-exporter",
    version,
    about = "Prometheus exporter for DSMR smart meters read via the P1 port"
)]
pub struct Config {
    /// Address on which to expose metrics and web interface
    #[arg(long, env = "P1_EXPORTER_WEB_LISTEN_ADDRESS", default_value = "0.0.0.0:9786")]
    pub web_listen_address: String,

    /// Path under which to expose metrics
    #[arg(long, env = "P1_EXPORTER_WEB_TELEMETRY_PATH", default_value = "/metrics")]
    pub web_telemetry_path: String,

    /// Path to the smart meter's serial device
    #[arg(long, env = "P1_EXPORTER_P1_USB_DEVICE", default_value = "/dev/ttyUSB0")]
    pub p1_usb_device: String,

    /// Baud rate of the smart meter's serial connection
    #[arg(long, env = "P1_EXPORTER_P1_BAUDRATE", default_value_t = 115_200)]
    pub p1_baudrate: u32,

    /// Smart meter read timeout in milliseconds
    #[arg(long, env = "P1_EXPORTER_P1_TIMEOUT", default_value_t = 500)]
    pub p1_timeout: u64,

    /// MQTT broker hostname (if omitted, nothing is published)
    #[arg(long, env = "P1_EXPORTER_MQTT_HOST")]
    pub mqtt_host: Option<String>,

    /// MQTT broker port
    #[arg(long, env = "P1_EXPORTER_MQTT_PORT", default_value_t = 1883)]
    pub mqtt_port: u16,

    /// MQTT client ID
    #[arg(long, env = "P1_EXPORTER_MQTT_CLIENT_ID", default_value = "p1-exporter")]
    pub mqtt_client_id: String,

    /// MQTT topic to publish the meter state to
    #[arg(long, env = "P1_EXPORTER_MQTT_TOPIC", default_value = "tele/p1")]
    pub mqtt_topic: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::parse_from(["p1-exporter"]);
        assert_eq!(config.web_listen_address, "0.0.0.0:9786");
        assert_eq!(config.web_telemetry_path, "/metrics");
        assert_eq!(config.p1_usb_device, "/dev/ttyUSB0");
        assert_eq!(config.p1_baudrate, 115_200);
        assert_eq!(config.p1_timeout, 500);
        assert!(config.mqtt_host.is_none());
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::parse_from([
            "p1-exporter",
            "--p1-usb-device",
            "/dev/ttyAMA0",
            "--p1-baudrate",
            "9600",
            "--mqtt-host",
            "broker.local",
        ]);
        assert_eq!(config.p1_usb_device, "/dev/ttyAMA0");
        assert_eq!(config.p1_baudrate, 9600);
        assert_eq!(config.mqtt_host.as_deref(), Some("broker.local"));
    }

    #[test]
    fn command_is_well_formed() {
        use clap::CommandFactory;
        Config::command().debug_assert();
    }
}
