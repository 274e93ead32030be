//! The decoded telegram: OBIS-coded fields carrying `(value*unit)` groups.

use std::fmt;

use serde::Serialize;

use crate::error::DecodeError;

/// A parenthesised value such as `(000123.456*kWh)`, split at the `*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawValue {
    pub value: String,
    pub unit: String,
}

impl RawValue {
    pub fn parse(text: &str) -> Self {
        match text.split_once('*') {
            Some((value, unit)) => Self {
                value: value.to_string(),
                unit: unit.to_string(),
            },
            None => Self {
                value: text.to_string(),
                unit: String::new(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    L1,
    L2,
    L3,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::L1 => "l1",
            Phase::L2 => "l2",
            Phase::L3 => "l3",
        }
    }
}

/// The OBIS codes this exporter tracks. Anything else is kept as `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Obis {
    VersionInformation,
    DateTimestamp,
    EquipmentIdentifier,
    GasEquipmentIdentifier,
    ElectricityDeliveredTariff(u32),
    ElectricityGeneratedTariff(u32),
    ElectricityTariffIndicator,
    ElectricityDelivered,
    ElectricityGenerated,
    InstantaneousVoltage(Phase),
    InstantaneousCurrent(Phase),
    GasDelivered,
    BreakerState,
    LimiterThreshold,
    FuseThreshold(Phase),
    GasValveState,
    Other(String),
}

impl Obis {
    pub fn from_code(code: &str) -> Self {
        // "1-0:1.8.1*255" and "1-0:1.8.1" name the same object
        let code = code.split('*').next().unwrap_or(code).trim();

        match code {
            "1-3:0.2.8" | "0-0:96.1.4" => Obis::VersionInformation,
            "0-0:1.0.0" => Obis::DateTimestamp,
            "0-0:96.1.1" => Obis::EquipmentIdentifier,
            "0-1:96.1.0" | "0-1:96.1.1" => Obis::GasEquipmentIdentifier,
            "1-0:1.8.1" => Obis::ElectricityDeliveredTariff(1),
            "1-0:1.8.2" => Obis::ElectricityDeliveredTariff(2),
            "1-0:2.8.1" => Obis::ElectricityGeneratedTariff(1),
            "1-0:2.8.2" => Obis::ElectricityGeneratedTariff(2),
            "0-0:96.14.0" => Obis::ElectricityTariffIndicator,
            "1-0:1.7.0" => Obis::ElectricityDelivered,
            "1-0:2.7.0" => Obis::ElectricityGenerated,
            "1-0:32.7.0" => Obis::InstantaneousVoltage(Phase::L1),
            "1-0:52.7.0" => Obis::InstantaneousVoltage(Phase::L2),
            "1-0:72.7.0" => Obis::InstantaneousVoltage(Phase::L3),
            "1-0:31.7.0" => Obis::InstantaneousCurrent(Phase::L1),
            "1-0:51.7.0" => Obis::InstantaneousCurrent(Phase::L2),
            "1-0:71.7.0" => Obis::InstantaneousCurrent(Phase::L3),
            "0-1:24.2.1" | "0-1:24.2.3" => Obis::GasDelivered,
            "0-0:96.3.10" => Obis::BreakerState,
            "0-0:17.0.0" => Obis::LimiterThreshold,
            "1-0:31.4.0" => Obis::FuseThreshold(Phase::L1),
            "0-1:24.4.0" => Obis::GasValveState,
            other => Obis::Other(other.to_string()),
        }
    }

    /// Canonical OBIS reduced identifier.
    pub fn code(&self) -> &str {
        match self {
            Obis::VersionInformation => "1-3:0.2.8",
            Obis::DateTimestamp => "0-0:1.0.0",
            Obis::EquipmentIdentifier => "0-0:96.1.1",
            Obis::GasEquipmentIdentifier => "0-1:96.1.0",
            Obis::ElectricityDeliveredTariff(1) => "1-0:1.8.1",
            Obis::ElectricityDeliveredTariff(_) => "1-0:1.8.2",
            Obis::ElectricityGeneratedTariff(1) => "1-0:2.8.1",
            Obis::ElectricityGeneratedTariff(_) => "1-0:2.8.2",
            Obis::ElectricityTariffIndicator => "0-0:96.14.0",
            Obis::ElectricityDelivered => "1-0:1.7.0",
            Obis::ElectricityGenerated => "1-0:2.7.0",
            Obis::InstantaneousVoltage(Phase::L1) => "1-0:32.7.0",
            Obis::InstantaneousVoltage(Phase::L2) => "1-0:52.7.0",
            Obis::InstantaneousVoltage(Phase::L3) => "1-0:72.7.0",
            Obis::InstantaneousCurrent(Phase::L1) => "1-0:31.7.0",
            Obis::InstantaneousCurrent(Phase::L2) => "1-0:51.7.0",
            Obis::InstantaneousCurrent(Phase::L3) => "1-0:71.7.0",
            Obis::GasDelivered => "0-1:24.2.1",
            Obis::BreakerState => "0-0:96.3.10",
            Obis::LimiterThreshold => "0-0:17.0.0",
            Obis::FuseThreshold(Phase::L1) => "1-0:31.4.0",
            Obis::FuseThreshold(Phase::L2) => "1-0:51.4.0",
            Obis::FuseThreshold(Phase::L3) => "1-0:71.4.0",
            Obis::GasValveState => "0-1:24.4.0",
            Obis::Other(code) => code.as_str(),
        }
    }
}

impl fmt::Display for Obis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub obis: Obis,
    pub values: Vec<RawValue>,
}

impl Field {
    pub fn value(&self, index: usize) -> Result<&RawValue, DecodeError> {
        self.values
            .get(index)
            .ok_or(DecodeError::MissingValue { index })
    }
}

/// One complete transmission from the meter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Telegram {
    /// Identification line without the leading `/`.
    pub header: String,
    pub fields: Vec<Field>,
}

/// Parse a data line like `0-1:24.2.1(101209112500W)(12785.123*m3)`.
/// Returns `None` for lines without a code or a value group.
pub fn parse_field(line: &str) -> Option<Field> {
    let open = line.find('(')?;
    let code = line[..open].trim();
    if code.is_empty() {
        return None;
    }

    let mut values = Vec::new();
    let mut rest = &line[open..];
    while let Some(group) = rest.strip_prefix('(') {
        let close = group.find(')')?;
        values.push(RawValue::parse(&group[..close]));
        rest = group[close + 1..].trim_start();
    }

    Some(Field {
        obis: Obis::from_code(code),
        values,
    })
}
