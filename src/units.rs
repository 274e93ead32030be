//! Unit-checked scalar quantities. Kilo-scaled source values are stored in
//! base units (W, Wh).

use serde::Serialize;

use crate::error::{DecodeError, NumberError};
use crate::telegram::RawValue;

/// Electric current in amperes.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize)]
pub struct ElectricCurrent(pub f64);

/// Power in watts.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize)]
pub struct Power(pub f64);

/// Energy in watt-hours.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize)]
pub struct Energy(pub f64);

/// Voltage in volts.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize)]
pub struct Voltage(pub f64);

/// Volume in cubic metres.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize)]
pub struct Volume(pub f64);

fn magnitude(raw: &RawValue, unit: &'static str) -> Result<f64, DecodeError> {
    if raw.unit != unit {
        return Err(DecodeError::UnknownUnit {
            expected: unit,
            found: raw.unit.clone(),
        });
    }

    let malformed = |source: NumberError| DecodeError::MalformedNumber {
        value: raw.value.clone(),
        source,
    };

    let v: f64 = raw
        .value
        .trim()
        .parse()
        .map_err(|e: std::num::ParseFloatError| malformed(e.into()))?;
    // inf and NaN parse, but have no place in a meter reading
    if !v.is_finite() {
        return Err(malformed(NumberError::NotFinite));
    }
    Ok(v)
}

pub fn parse_electric_current(raw: &RawValue) -> Result<ElectricCurrent, DecodeError> {
    magnitude(raw, "A").map(ElectricCurrent)
}

pub fn parse_power(raw: &RawValue) -> Result<Power, DecodeError> {
    magnitude(raw, "kW").map(|kw| Power(kw * 1000.0))
}

pub fn parse_energy(raw: &RawValue) -> Result<Energy, DecodeError> {
    magnitude(raw, "kWh").map(|kwh| Energy(kwh * 1000.0))
}

pub fn parse_voltage(raw: &RawValue) -> Result<Voltage, DecodeError> {
    magnitude(raw, "V").map(Voltage)
}

pub fn parse_volume(raw: &RawValue) -> Result<Volume, DecodeError> {
    magnitude(raw, "m3").map(Volume)
}
