use crate::error::{CoreError, Result};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, Time};

pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

pub fn format_rfc3339(value: OffsetDateTime) -> String {
    value
        .format(&Rfc3339)
        .unwrap_or_else(|_| value.unix_timestamp().to_string())
}

/// Which end of a range a bare date stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    Start,
    End,
}

/// Parses a history filter bound.
///
/// Accepts RFC 3339 timestamps or `YYYY-MM-DD`. A bare date expands to the
/// first or last instant of that UTC day depending on `bound`.
pub fn parse_date_bound(value: &str, bound: DateBound) -> Result<OffsetDateTime> {
    let value = value.trim();
    if let Ok(ts) = OffsetDateTime::parse(value, &Rfc3339) {
        return Ok(ts);
    }

    let date = Date::parse(value, format_description!("[year]-[month]-[day]"))
        .map_err(|e| CoreError::invalid_date(format!("'{value}': {e}")))?;
    let time = match bound {
        DateBound::Start => Time::MIDNIGHT,
        DateBound::End => Time::from_hms_nano(23, 59, 59, 999_999_999)
            .map_err(|e| CoreError::invalid_date(e.to_string()))?,
    };
    Ok(date.with_time(time).assume_utc())
}
