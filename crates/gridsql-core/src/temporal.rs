//! Temporal literal grammar shared by every dialect.
//!
//! Operators type dates and timestamps free-form into the grid. All engines
//! accept the same input forms; each dialect's converter only decides how the
//! parsed instant is handed to the driver.

use crate::{GridsqlError, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};
use regex::Regex;
use std::sync::LazyLock;

/// Which input form produced a [`TemporalLiteral`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalKind {
    /// `YYYY-MM-DD HH:MM:SS[.frac] ±HH:MM`
    TimestampTz,
    /// `YYYY-MM-DD HH:MM:SS[.frac]`
    Timestamp,
    /// `YYYY-MM-DD`
    Date,
    /// `HH:MM:SS[.frac] ±HH:MM`
    TimeTz,
    /// `HH:MM:SS[.frac]`
    Time,
    /// `YYYY-MM-DDTHH:MM:SSZ`
    Rfc3339Utc,
}

/// A parsed temporal literal: one canonical instant plus the form it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalLiteral {
    pub instant: DateTime<FixedOffset>,
    pub kind: TemporalKind,
}

impl TemporalLiteral {
    /// Time of day with as many fractional digits as needed
    pub fn time_of_day(&self) -> String {
        self.instant.format("%H:%M:%S%.f").to_string()
    }

    /// Whether the literal carried an explicit offset
    pub fn has_offset(&self) -> bool {
        matches!(
            self.kind,
            TemporalKind::TimestampTz | TemporalKind::TimeTz | TemporalKind::Rfc3339Utc
        )
    }
}

static TIMESTAMP_TZ: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{4}-\d\d-\d\d \d\d:\d\d:\d\d(?:\.\d+)?)\s*([-+]?)(\d\d?):(\d\d)\s*$")
        .expect("valid timestamp-with-offset regex")
});

static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{4}-\d\d-\d\d \d\d:\d\d:\d\d(?:\.\d+)?)\s*$")
        .expect("valid timestamp regex")
});

static DATE_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d{4}-\d\d-\d\d)\s*$").expect("valid date regex"));

static TIME_TZ: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:\d{4}-\d\d-\d\d )?(\d\d:\d\d:\d\d(?:\.\d+)?) ([-+])(\d\d):(\d\d)\s*$")
        .expect("valid time-with-offset regex")
});

static TIME_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:\d{4}-\d\d-\d\d )?(\d\d:\d\d:\d\d(?:\.\d+)?)\s*$")
        .expect("valid time regex")
});

static RFC3339_UTC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{4}-\d\d-\d\dT\d\d:\d\d:\d\d)Z\s*$").expect("valid RFC 3339 regex")
});

const DATETIME_LAYOUT: &str = "%Y-%m-%d %H:%M:%S%.f";
const TIME_LAYOUT: &str = "%H:%M:%S%.f";

/// Parse operator-entered text into a [`TemporalLiteral`].
///
/// Forms are tried in priority order and each must consume the whole trimmed
/// input. Fails with [`GridsqlError::NotTimeFormat`] when nothing matches or the
/// matched fields are out of range.
pub fn parse_any_datetime(text: &str) -> Result<TemporalLiteral> {
    let not_time = || GridsqlError::NotTimeFormat(text.to_string());

    if let Some(caps) = TIMESTAMP_TZ.captures(text) {
        let sign = if &caps[2] == "-" { "-" } else { "+" };
        // Reconstructed with the hour zero-padded, e.g. "+9:00" -> "+09:00"
        let hours: u32 = caps[3].parse().map_err(|_| not_time())?;
        let offset = format!("{}{:02}:{}", sign, hours, &caps[4]);
        let naive = NaiveDateTime::parse_from_str(&caps[1], DATETIME_LAYOUT).map_err(|_| not_time())?;
        let offset = parse_offset(&offset).ok_or_else(not_time)?;
        return localize(offset, naive, TemporalKind::TimestampTz).ok_or_else(not_time);
    }
    if let Some(caps) = TIMESTAMP.captures(text) {
        let naive = NaiveDateTime::parse_from_str(&caps[1], DATETIME_LAYOUT).map_err(|_| not_time())?;
        return localize(utc(), naive, TemporalKind::Timestamp).ok_or_else(not_time);
    }
    if let Some(caps) = DATE_ONLY.captures(text) {
        let date = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").map_err(|_| not_time())?;
        return localize(utc(), date.and_time(NaiveTime::MIN), TemporalKind::Date).ok_or_else(not_time);
    }
    if let Some(caps) = TIME_TZ.captures(text) {
        let time = NaiveTime::parse_from_str(&caps[1], TIME_LAYOUT).map_err(|_| not_time())?;
        let offset = parse_offset(&format!("{}{}:{}", &caps[2], &caps[3], &caps[4])).ok_or_else(not_time)?;
        return localize(offset, zero_date().and_time(time), TemporalKind::TimeTz).ok_or_else(not_time);
    }
    if let Some(caps) = TIME_ONLY.captures(text) {
        let time = NaiveTime::parse_from_str(&caps[1], TIME_LAYOUT).map_err(|_| not_time())?;
        return localize(utc(), zero_date().and_time(time), TemporalKind::Time).ok_or_else(not_time);
    }
    if let Some(caps) = RFC3339_UTC.captures(text) {
        let naive = NaiveDateTime::parse_from_str(&caps[1], "%Y-%m-%dT%H:%M:%S").map_err(|_| not_time())?;
        return localize(utc(), naive, TemporalKind::Rfc3339Utc).ok_or_else(not_time);
    }
    Err(not_time())
}

fn utc() -> FixedOffset {
    Utc.fix()
}

/// Date used for time-only literals
fn zero_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(0, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Parse `±HH:MM` into a fixed offset
fn parse_offset(text: &str) -> Option<FixedOffset> {
    let (sign, rest) = match text.as_bytes().first()? {
        b'-' => (-1, &text[1..]),
        b'+' => (1, &text[1..]),
        _ => (1, text),
    };
    let (hours, minutes) = rest.split_once(':')?;
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn localize(offset: FixedOffset, naive: NaiveDateTime, kind: TemporalKind) -> Option<TemporalLiteral> {
    let instant = offset.from_local_datetime(&naive).single()?;
    Some(TemporalLiteral { instant, kind })
}
