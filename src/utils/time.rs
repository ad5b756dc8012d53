//! Time utilities for catch-up timestamps and provider-local conversion

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::fmt::Display;

/// Minute-precision timestamp used in catch-up paths, e.g. `2025-01-15:14-30`
pub const CATCHUP_TIMESTAMP_FORMAT: &str = "%Y-%m-%d:%H-%M";

/// Civil time format used in Xtream EPG listings
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// XMLTV programme timestamp format
pub const XMLTV_FORMAT: &str = "%Y%m%d%H%M%S %z";

/// Parse a `YYYY-MM-DD:HH-MM` timestamp as a UTC instant.
///
/// Returns `None` for anything that is not a valid calendar minute.
pub fn parse_catchup_timestamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, CATCHUP_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn format_catchup_timestamp<T>(dt: &DateTime<T>) -> String
where
    T: TimeZone,
    T::Offset: Display,
{
    dt.format(CATCHUP_TIMESTAMP_FORMAT).to_string()
}

/// Convert a UTC instant to civil time in `tz`
pub fn utc_to_local(utc: DateTime<Utc>, tz: Tz) -> DateTime<Tz> {
    utc.with_timezone(&tz)
}

/// Convert a zoned civil time back to its UTC instant
pub fn local_to_utc(local: &DateTime<Tz>) -> DateTime<Utc> {
    local.with_timezone(&Utc)
}

/// Validate a timezone string and return the parsed timezone
pub fn validate_timezone(tz_str: &str) -> Result<Tz, String> {
    tz_str
        .trim()
        .parse::<Tz>()
        .map_err(|_| format!("Invalid timezone: '{tz_str}'"))
}

/// Format a UTC instant as provider-local `YYYY-MM-DD HH:MM:SS`
pub fn format_for_display(utc: DateTime<Utc>, tz: Tz) -> String {
    utc_to_local(utc, tz).format(DISPLAY_FORMAT).to_string()
}
