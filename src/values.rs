use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::Serialize;

use crate::error::{DecodeError, NumberError};
use crate::telegram::RawValue;

/// Offset of the "S" (CEST) season flag.
const SUMMER_OFFSET_SECS: i32 = 2 * 3600;
/// Offset of the "W" (CET) season flag.
const WINTER_OFFSET_SECS: i32 = 3600;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    #[default]
    Disconnected = 0,
    Connected = 1,
    ReadyForReconnection = 2,
}

impl BreakerState {
    pub fn code(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GasValveState {
    #[default]
    Disconnected = 0,
    Connected = 1,
    ReadyForReconnection = 2,
}

impl GasValveState {
    pub fn code(self) -> u8 {
        self as u8
    }
}

pub fn parse_integer(raw: &RawValue) -> Result<i64, DecodeError> {
    raw.value
        .trim()
        .parse()
        .map_err(|e: std::num::ParseIntError| DecodeError::MalformedNumber {
            value: raw.value.clone(),
            source: NumberError::from(e),
        })
}

pub fn parse_breaker_state(raw: &RawValue) -> Result<BreakerState, DecodeError> {
    match parse_integer(raw)? {
        0 => Ok(BreakerState::Disconnected),
        1 => Ok(BreakerState::Connected),
        2 => Ok(BreakerState::ReadyForReconnection),
        value => Err(DecodeError::UnknownState {
            kind: "breaker state",
            value,
        }),
    }
}

pub fn parse_gas_valve_state(raw: &RawValue) -> Result<GasValveState, DecodeError> {
    match parse_integer(raw)? {
        0 => Ok(GasValveState::Disconnected),
        1 => Ok(GasValveState::Connected),
        2 => Ok(GasValveState::ReadyForReconnection),
        value => Err(DecodeError::UnknownState {
            kind: "gas valve state",
            value,
        }),
    }
}

pub fn parse_tariff_indicator(raw: &RawValue) -> Result<i64, DecodeError> {
    parse_integer(raw)
}

/// Parse a `YYMMDDhhmmssX` timestamp where `X` is the season flag: `S` for
/// summer time (UTC+2) or `W` for winter time (UTC+1). Years are 2000-based.
pub fn parse_timestamp(raw: &RawValue) -> Result<DateTime<Utc>, DecodeError> {
    let value = raw.value.trim();
    let Some(season) = value.chars().last() else {
        return Err(DecodeError::InvalidSeason(String::new()));
    };

    let offset = match season {
        'S' => FixedOffset::east_opt(SUMMER_OFFSET_SECS),
        'W' => FixedOffset::east_opt(WINTER_OFFSET_SECS),
        other => return Err(DecodeError::InvalidSeason(other.to_string())),
    }
    .ok_or_else(|| invalid_timestamp(value, None))?;

    let digits = &value[..value.len() - season.len_utf8()];
    if digits.len() != 12 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid_timestamp(value, None));
    }

    let local = NaiveDateTime::parse_from_str(&format!("20{digits}"), "%Y%m%d%H%M%S")
        .map_err(|e| invalid_timestamp(value, Some(e)))?;

    local
        .and_local_timezone(offset)
        .single()
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| invalid_timestamp(value, None))
}

fn invalid_timestamp(value: &str, source: Option<chrono::ParseError>) -> DecodeError {
    DecodeError::InvalidTimestamp {
        value: value.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn raw(value: &str) -> RawValue {
        RawValue {
            value: value.to_string(),
            unit: String::new(),
        }
    }

    #[test]
    fn breaker_states() {
        assert_eq!(parse_breaker_state(&raw("0")).unwrap(), BreakerState::Disconnected);
        assert_eq!(parse_breaker_state(&raw("1")).unwrap(), BreakerState::Connected);
        assert_eq!(
            parse_breaker_state(&raw("2")).unwrap(),
            BreakerState::ReadyForReconnection
        );
        assert!(matches!(
            parse_breaker_state(&raw("3")),
            Err(DecodeError::UnknownState { value: 3, .. })
        ));
        assert!(matches!(
            parse_breaker_state(&raw("on")),
            Err(DecodeError::MalformedNumber {
                source: NumberError::Int(_),
                ..
            })
        ));
    }

    #[test]
    fn gas_valve_states() {
        assert_eq!(parse_gas_valve_state(&raw("1")).unwrap(), GasValveState::Connected);
        assert_eq!(parse_gas_valve_state(&raw("2")).unwrap().code(), 2);
        assert!(matches!(
            parse_gas_valve_state(&raw("-1")),
            Err(DecodeError::UnknownState { value: -1, .. })
        ));
    }

    #[test]
    fn tariff_indicator_has_no_range() {
        assert_eq!(parse_tariff_indicator(&raw("0002")).unwrap(), 2);
        assert_eq!(parse_tariff_indicator(&raw("17")).unwrap(), 17);
        assert!(parse_tariff_indicator(&raw("2.5")).is_err());
    }

    #[test]
    fn summer_timestamp() {
        let t = parse_timestamp(&raw("230615123000S")).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2023, 6, 15, 10, 30, 0).unwrap());
    }

    #[test]
    fn winter_timestamp_is_one_hour_later() {
        let summer = parse_timestamp(&raw("230615123000S")).unwrap();
        let winter = parse_timestamp(&raw("230615123000W")).unwrap();
        assert_eq!(winter, Utc.with_ymd_and_hms(2023, 6, 15, 11, 30, 0).unwrap());
        assert_eq!((winter - summer).num_hours(), 1);
    }

    #[test]
    fn two_digit_years_are_2000_based() {
        let t = parse_timestamp(&raw("991231235959W")).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2099, 12, 31, 22, 59, 59).unwrap());
    }

    #[test]
    fn unknown_season_is_rejected() {
        assert!(matches!(
            parse_timestamp(&raw("230615123000X")),
            Err(DecodeError::InvalidSeason(s)) if s == "X"
        ));
        assert!(matches!(
            parse_timestamp(&raw("")),
            Err(DecodeError::InvalidSeason(_))
        ));
    }

    #[test]
    fn malformed_digits_are_rejected() {
        assert!(matches!(
            parse_timestamp(&raw("2306151230S")),
            Err(DecodeError::InvalidTimestamp { .. })
        ));
        assert!(matches!(
            parse_timestamp(&raw("23061512300aS")),
            Err(DecodeError::InvalidTimestamp { .. })
        ));
        assert!(matches!(
            parse_timestamp(&raw("231315123000W")),
            Err(DecodeError::InvalidTimestamp { source: Some(_), .. })
        ));
    }
}
