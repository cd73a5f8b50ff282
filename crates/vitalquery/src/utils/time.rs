use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use time::format_description::BorrowedFormatItem;
use time::macros::{format_description, offset};
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

pub const KST: UtcOffset = offset!(+9);

const SQL_TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const SQL_DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
const NANOS_PER_MILLI: i128 = 1_000_000;

pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(KST)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: OffsetDateTime,
}

impl FixedClock {
    #[must_use]
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            now: now.to_offset(KST),
        }
    }

    /// Builds a clock pinned to `YYYY-MM-DD HH:MM:SS` interpreted in KST.
    pub fn at_kst(raw: &str) -> Result<Self> {
        let local = parse_sql_timestamp(raw)?;
        Ok(Self::new(local.assume_offset(KST)))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.now
    }
}

pub fn parse_sql_timestamp(raw: &str) -> Result<PrimitiveDateTime> {
    PrimitiveDateTime::parse(raw.trim(), SQL_TIMESTAMP_FORMAT)
        .with_context(|| format!("unsupported timestamp format: {raw}"))
}

#[must_use]
pub fn format_sql_timestamp(value: PrimitiveDateTime) -> String {
    value.format(SQL_TIMESTAMP_FORMAT).unwrap_or_else(|_| {
        format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            value.year(),
            u8::from(value.month()),
            value.day(),
            value.hour(),
            value.minute(),
            value.second()
        )
    })
}

#[must_use]
pub fn format_sql_date(value: Date) -> String {
    value.format(SQL_DATE_FORMAT).unwrap_or_else(|_| {
        format!(
            "{:04}-{:02}-{:02}",
            value.year(),
            u8::from(value.month()),
            value.day()
        )
    })
}

#[must_use]
pub fn unix_timestamp_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

#[must_use]
pub fn format_unix_ms(timestamp_unix_ms: u64) -> String {
    let nanos = i128::from(timestamp_unix_ms)
        .checked_mul(NANOS_PER_MILLI)
        .unwrap_or(i128::MAX);
    let dt = OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
        .to_offset(UtcOffset::UTC);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        dt.year(),
        u8::from(dt.month()),
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second(),
        dt.millisecond()
    )
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::{
        Clock, FixedClock, format_sql_date, format_sql_timestamp, format_unix_ms,
        parse_sql_timestamp,
    };

    #[test]
    fn sql_timestamps_round_trip() {
        let parsed = parse_sql_timestamp("2025-08-18 16:35:00").expect("timestamp should parse");
        assert_eq!(parsed, datetime!(2025-08-18 16:35:00));
        assert_eq!(format_sql_timestamp(parsed), "2025-08-18 16:35:00");
        assert_eq!(format_sql_date(parsed.date()), "2025-08-18");
    }

    #[test]
    fn rejects_iso_t_separator() {
        let err = parse_sql_timestamp("2025-08-18T16:35:00").expect_err("T separator should fail");
        assert!(err.to_string().contains("unsupported timestamp format"));
    }

    #[test]
    fn fixed_clock_reports_kst_wall_time() {
        let clock = FixedClock::at_kst("2025-08-18 00:30:00").expect("clock should build");
        let now = clock.now();
        assert_eq!(now.offset().whole_hours(), 9);
        assert_eq!(now.date(), datetime!(2025-08-18 00:00:00).date());
        assert_eq!(now.hour(), 0);
    }

    #[test]
    fn formats_unix_millis_as_utc() {
        assert_eq!(format_unix_ms(1_770_274_803_042), "2026-02-05T07:00:03.042Z");
    }
}
