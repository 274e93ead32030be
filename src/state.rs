use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use log::debug;
use parking_lot::RwLock;
use serde::Serialize;

use crate::error::{DecodeError, RecordError};
use crate::telegram::{Field, Obis, Phase, Telegram};
use crate::units::{
    parse_electric_current, parse_energy, parse_power, parse_voltage, parse_volume,
    ElectricCurrent, Energy, Power, Voltage, Volume,
};
use crate::values::{
    parse_breaker_state, parse_gas_valve_state, parse_integer, parse_tariff_indicator,
    parse_timestamp, BreakerState, GasValveState,
};

/// Latest known state of the meter. Per-tariff and per-phase maps only
/// contain keys the meter has actually reported.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    /// Meter clock corrected by the smoothed skew.
    pub timestamp: Option<DateTime<Utc>>,
    /// How far the meter clock lags the host clock, averaged.
    #[serde(skip)]
    pub timestamp_correction: Option<TimeDelta>,
    pub version: i64,
    pub equipment_identifier: String,
    pub gas_equipment_identifier: String,
    pub electric_power_delivered: Power,
    pub total_electricity_delivered: BTreeMap<u32, Energy>,
    pub electric_power_injected: Power,
    pub total_electricity_injected: BTreeMap<u32, Energy>,
    pub electric_current: BTreeMap<Phase, ElectricCurrent>,
    pub voltage: BTreeMap<Phase, Voltage>,
    pub electricity_tariff_indicator: i64,
    pub breaker_state: BreakerState,
    pub electricity_limiter_threshold: Power,
    pub fuse_threshold: BTreeMap<Phase, ElectricCurrent>,
    pub total_gas_delivered_timestamp: Option<DateTime<Utc>>,
    pub total_gas_delivered: Volume,
    pub gas_valve_state: GasValveState,
}

impl Snapshot {
    fn apply_field(&mut self, field: &Field, now: DateTime<Utc>) -> Result<(), DecodeError> {
        match &field.obis {
            Obis::VersionInformation => {
                self.version = parse_integer(field.value(0)?)?;
            }
            Obis::DateTimestamp => {
                let reported = parse_timestamp(field.value(0)?)?;
                self.timestamp = Some(self.reconcile(reported, now));
            }
            Obis::EquipmentIdentifier => {
                self.equipment_identifier = field.value(0)?.value.clone();
            }
            Obis::GasEquipmentIdentifier => {
                self.gas_equipment_identifier = field.value(0)?.value.clone();
            }
            Obis::ElectricityDeliveredTariff(tariff) => {
                let v = parse_energy(field.value(0)?)?;
                self.total_electricity_delivered.insert(*tariff, v);
            }
            Obis::ElectricityGeneratedTariff(tariff) => {
                let v = parse_energy(field.value(0)?)?;
                self.total_electricity_injected.insert(*tariff, v);
            }
            Obis::ElectricityTariffIndicator => {
                self.electricity_tariff_indicator = parse_tariff_indicator(field.value(0)?)?;
            }
            Obis::ElectricityDelivered => {
                self.electric_power_delivered = parse_power(field.value(0)?)?;
            }
            Obis::ElectricityGenerated => {
                self.electric_power_injected = parse_power(field.value(0)?)?;
            }
            Obis::InstantaneousVoltage(phase) => {
                let v = parse_voltage(field.value(0)?)?;
                self.voltage.insert(*phase, v);
            }
            Obis::InstantaneousCurrent(phase) => {
                let v = parse_electric_current(field.value(0)?)?;
                self.electric_current.insert(*phase, v);
            }
            Obis::GasDelivered => {
                let reported = parse_timestamp(field.value(0)?)?;
                self.total_gas_delivered_timestamp = Some(self.corrected(reported));
                self.total_gas_delivered = parse_volume(field.value(1)?)?;
            }
            Obis::BreakerState => {
                self.breaker_state = parse_breaker_state(field.value(0)?)?;
            }
            Obis::LimiterThreshold => {
                self.electricity_limiter_threshold = parse_power(field.value(0)?)?;
            }
            Obis::FuseThreshold(phase) => {
                let v = parse_electric_current(field.value(0)?)?;
                self.fuse_threshold.insert(*phase, v);
            }
            Obis::GasValveState => {
                self.gas_valve_state = parse_gas_valve_state(field.value(0)?)?;
            }
            Obis::Other(code) => {
                debug!("Ignoring OBIS code: {}", code);
            }
        }

        Ok(())
    }

    /// Fold the skew of a freshly reported meter time into the running
    /// correction (factor 0.5) and return the corrected time.
    fn reconcile(&mut self, reported: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
        let skew = now - reported;
        let correction = match self.timestamp_correction {
            Some(previous) => (previous + skew) / 2,
            None => skew,
        };
        self.timestamp_correction = Some(correction);
        reported + correction
    }

    /// Shift a meter time by the current correction without updating it.
    fn corrected(&self, reported: DateTime<Utc>) -> DateTime<Utc> {
        match self.timestamp_correction {
            Some(correction) => reported + correction,
            None => reported,
        }
    }
}

/// The single shared meter state: one writer applying telegrams, any number
/// of readers copying values out.
#[derive(Debug, Default)]
pub struct MeterState {
    inner: RwLock<Snapshot>,
}

impl MeterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a telegram, stamping the skew against the host clock.
    pub fn apply(&self, telegram: &Telegram) -> Result<(), RecordError> {
        self.apply_at(telegram, Utc::now())
    }

    /// Apply a telegram as if received at `now`. The write lock is held for
    /// the whole telegram. On the first field that fails to decode the rest
    /// of the telegram is skipped; fields before it stay applied.
    pub fn apply_at(&self, telegram: &Telegram, now: DateTime<Utc>) -> Result<(), RecordError> {
        let mut snapshot = self.inner.write();
        for field in &telegram.fields {
            snapshot
                .apply_field(field, now)
                .map_err(|source| RecordError {
                    obis: field.obis.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// A consistent copy of every value.
    pub fn snapshot(&self) -> Snapshot {
        self.inner.read().clone()
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.inner.read().timestamp
    }

    pub fn version(&self) -> i64 {
        self.inner.read().version
    }

    pub fn equipment_identifier(&self) -> String {
        self.inner.read().equipment_identifier.clone()
    }

    pub fn gas_equipment_identifier(&self) -> String {
        self.inner.read().gas_equipment_identifier.clone()
    }

    pub fn electric_power_delivered(&self) -> Power {
        self.inner.read().electric_power_delivered
    }

    pub fn total_electricity_delivered(&self) -> BTreeMap<u32, Energy> {
        self.inner.read().total_electricity_delivered.clone()
    }

    pub fn electric_power_injected(&self) -> Power {
        self.inner.read().electric_power_injected
    }

    pub fn total_electricity_injected(&self) -> BTreeMap<u32, Energy> {
        self.inner.read().total_electricity_injected.clone()
    }

    pub fn electric_current(&self) -> BTreeMap<Phase, ElectricCurrent> {
        self.inner.read().electric_current.clone()
    }

    pub fn voltage(&self) -> BTreeMap<Phase, Voltage> {
        self.inner.read().voltage.clone()
    }

    pub fn electricity_tariff_indicator(&self) -> i64 {
        self.inner.read().electricity_tariff_indicator
    }

    pub fn breaker_state(&self) -> BreakerState {
        self.inner.read().breaker_state
    }

    pub fn electricity_limiter_threshold(&self) -> Power {
        self.inner.read().electricity_limiter_threshold
    }

    pub fn fuse_threshold(&self) -> BTreeMap<Phase, ElectricCurrent> {
        self.inner.read().fuse_threshold.clone()
    }

    pub fn total_gas_delivered_timestamp(&self) -> Option<DateTime<Utc>> {
        self.inner.read().total_gas_delivered_timestamp
    }

    pub fn total_gas_delivered(&self) -> Volume {
        self.inner.read().total_gas_delivered
    }

    pub fn gas_valve_state(&self) -> GasValveState {
        self.inner.read().gas_valve_state
    }
}
