//! Renders a [`Snapshot`] in the Prometheus text exposition format.

use chrono::{DateTime, TimeDelta, Utc};

use crate::state::Snapshot;

pub const NAMESPACE: &str = "p1";
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Maximum age of the reconciled timestamp for the meter to count as up.
const UP_TIMEOUT_SECS: i64 = 60;

#[derive(Clone, Copy)]
enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    fn as_str(self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

/// Whether the snapshot's timestamp is recent enough to be trusted.
pub fn is_up(snapshot: &Snapshot, now: DateTime<Utc>) -> bool {
    snapshot
        .timestamp
        .is_some_and(|ts| now - ts <= TimeDelta::seconds(UP_TIMEOUT_SECS))
}

/// Render every metric family. Stale values are still emitted; only `up`
/// reflects the staleness.
pub fn render(s: &Snapshot, now: DateTime<Utc>) -> String {
    let mut out = Exposition::default();
    let ts = s.timestamp;
    let eid = s.equipment_identifier.as_str();
    let gas_eid = s.gas_equipment_identifier.as_str();

    out.family(
        "up",
        MetricType::Gauge,
        "Whether collecting smart meter metrics was successful.",
    );
    out.sample("up", &[], if is_up(s, now) { 1.0 } else { 0.0 }, ts);

    out.family(
        "version",
        MetricType::Counter,
        "Version information for the P1 output.",
    );
    out.sample("version", &[], s.version as f64, ts);

    out.family(
        "electricity_power_delivered",
        MetricType::Gauge,
        "Electricity being delivered to the premises.",
    );
    out.sample(
        "electricity_power_delivered",
        &[("equipment_id", eid)],
        s.electric_power_delivered.0,
        ts,
    );

    out.family(
        "electricity_delivered_total",
        MetricType::Counter,
        "Total electricity delivered to the premises.",
    );
    for (tariff, energy) in &s.total_electricity_delivered {
        out.sample(
            "electricity_delivered_total",
            &[("equipment_id", eid), ("tariff", tariff.to_string().as_str())],
            energy.0,
            ts,
        );
    }

    out.family(
        "electricity_power_injected",
        MetricType::Gauge,
        "Electricity being injected by the premises.",
    );
    out.sample(
        "electricity_power_injected",
        &[("equipment_id", eid)],
        s.electric_power_injected.0,
        ts,
    );

    out.family(
        "electricity_injected_total",
        MetricType::Counter,
        "Total electricity injected by the premises.",
    );
    for (tariff, energy) in &s.total_electricity_injected {
        out.sample(
            "electricity_injected_total",
            &[("equipment_id", eid), ("tariff", tariff.to_string().as_str())],
            energy.0,
            ts,
        );
    }

    out.family(
        "electricity_current",
        MetricType::Gauge,
        "Instantaneous current measured by the smart meter.",
    );
    for (phase, current) in &s.electric_current {
        out.sample(
            "electricity_current",
            &[("equipment_id", eid), ("phase", phase.label())],
            current.0,
            ts,
        );
    }

    out.family(
        "electricity_voltage",
        MetricType::Gauge,
        "Instantaneous voltage measured by the smart meter.",
    );
    for (phase, voltage) in &s.voltage {
        out.sample(
            "electricity_voltage",
            &[("equipment_id", eid), ("phase", phase.label())],
            voltage.0,
            ts,
        );
    }

    out.family(
        "electricity_tariff_indicator",
        MetricType::Gauge,
        "Electricity tariff that is currently active.",
    );
    out.sample(
        "electricity_tariff_indicator",
        &[("equipment_id", eid)],
        s.electricity_tariff_indicator as f64,
        ts,
    );

    out.family(
        "electricity_breaker_state",
        MetricType::Gauge,
        "State of the smart meter's breaker.",
    );
    out.sample(
        "electricity_breaker_state",
        &[("equipment_id", eid)],
        f64::from(s.breaker_state.code()),
        ts,
    );

    out.family(
        "electricity_limiter_threshold",
        MetricType::Gauge,
        "Threshold for the electricity limiter.",
    );
    out.sample(
        "electricity_limiter_threshold",
        &[("equipment_id", eid)],
        s.electricity_limiter_threshold.0,
        ts,
    );

    out.family(
        "electricity_fuse_threshold",
        MetricType::Gauge,
        "Threshold for the smart meter's fuse.",
    );
    for (phase, current) in &s.fuse_threshold {
        out.sample(
            "electricity_fuse_threshold",
            &[("equipment_id", eid), ("phase", phase.label())],
            current.0,
            ts,
        );
    }

    out.family(
        "gas_delivered_total",
        MetricType::Counter,
        "Total gas volume delivered to the premises.",
    );
    out.sample(
        "gas_delivered_total",
        &[("equipment_id", gas_eid)],
        s.total_gas_delivered.0,
        s.total_gas_delivered_timestamp,
    );

    out.family(
        "gas_valve_state",
        MetricType::Gauge,
        "State of the gas valve.",
    );
    out.sample(
        "gas_valve_state",
        &[("equipment_id", gas_eid)],
        f64::from(s.gas_valve_state.code()),
        ts,
    );

    out.finish()
}

#[derive(Default)]
struct Exposition {
    output: String,
}

impl Exposition {
    fn family(&mut self, name: &str, kind: MetricType, help: &str) {
        self.output
            .push_str(&format!("# HELP {}_{} {}\n", NAMESPACE, name, help));
        self.output
            .push_str(&format!("# TYPE {}_{} {}\n", NAMESPACE, name, kind.as_str()));
    }

    fn sample(
        &mut self,
        name: &str,
        labels: &[(&str, &str)],
        value: f64,
        timestamp: Option<DateTime<Utc>>,
    ) {
        self.output.push_str(&format!("{}_{}", NAMESPACE, name));
        if !labels.is_empty() {
            let labels_str = labels
                .iter()
                .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
                .collect::<Vec<_>>()
                .join(",");
            self.output.push_str(&format!("{{{}}}", labels_str));
        }
        self.output.push_str(&format!(" {}", value));
        if let Some(ts) = timestamp {
            self.output.push_str(&format!(" {}", ts.timestamp_millis()));
        }
        self.output.push('\n');
    }

    fn finish(self) -> String {
        self.output
    }
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::Phase;
    use crate::units::{Energy, Voltage, Volume};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 6, 15, 10, 30, 0).unwrap()
    }

    fn sample_snapshot() -> Snapshot {
        let mut s = Snapshot {
            timestamp: Some(now()),
            equipment_identifier: "E0001".into(),
            gas_equipment_identifier: "G0001".into(),
            version: 50,
            total_gas_delivered: Volume(12.5),
            total_gas_delivered_timestamp: Some(now() - TimeDelta::minutes(5)),
            ..Default::default()
        };
        s.total_electricity_delivered.insert(1, Energy(1500.0));
        s.voltage.insert(Phase::L1, Voltage(230.1));
        s
    }

    #[test]
    fn up_within_window() {
        let s = sample_snapshot();
        assert!(is_up(&s, now() + TimeDelta::seconds(59)));
        assert!(is_up(&s, now() + TimeDelta::seconds(60)));
        assert!(!is_up(&s, now() + TimeDelta::seconds(61)));
        assert!(!is_up(&Snapshot::default(), now()));
    }

    #[test]
    fn renders_samples_with_timestamps() {
        let out = render(&sample_snapshot(), now());
        let ms = now().timestamp_millis();
        assert!(out.contains("# TYPE p1_up gauge\n"));
        assert!(out.contains(&format!("p1_up 1 {}\n", ms)));
        assert!(out.contains(&format!("p1_version 50 {}\n", ms)));
        assert!(out.contains(&format!(
            "p1_electricity_delivered_total{{equipment_id=\"E0001\",tariff=\"1\"}} 1500 {}\n",
            ms
        )));
        assert!(out.contains(&format!(
            "p1_electricity_voltage{{equipment_id=\"E0001\",phase=\"l1\"}} 230.1 {}\n",
            ms
        )));
    }

    #[test]
    fn gas_volume_carries_its_own_timestamp() {
        let out = render(&sample_snapshot(), now());
        let gas_ms = (now() - TimeDelta::minutes(5)).timestamp_millis();
        assert!(out.contains(&format!(
            "p1_gas_delivered_total{{equipment_id=\"G0001\"}} 12.5 {}\n",
            gas_ms
        )));
    }

    #[test]
    fn unseen_keys_are_omitted() {
        let out = render(&sample_snapshot(), now());
        assert!(!out.contains("tariff=\"2\""));
        assert!(!out.contains("phase=\"l2\""));
        assert!(!out.contains("p1_electricity_injected_total{"));
        assert!(out.contains("# TYPE p1_electricity_injected_total counter\n"));
    }

    #[test]
    fn stale_snapshot_is_down_but_still_reported() {
        let out = render(&sample_snapshot(), now() + TimeDelta::minutes(2));
        assert!(out.contains("p1_up 0 "));
        assert!(out.contains("p1_version 50 "));
    }

    #[test]
    fn empty_snapshot_has_no_timestamps() {
        let out = render(&Snapshot::default(), now());
        assert!(out.contains("p1_up 0\n"));
        assert!(out.contains("p1_electricity_power_delivered{equipment_id=\"\"} 0\n"));
    }

    #[test]
    fn label_values_are_escaped() {
        assert_eq!(escape_label("a\"b\\c\nd"), "a\\\"b\\\\c\\nd");
    }
}
