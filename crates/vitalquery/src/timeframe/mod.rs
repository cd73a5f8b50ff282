use std::fmt::{Display, Formatter};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use time::{Date, Duration, Month, OffsetDateTime, PrimitiveDateTime, Time};

use crate::utils::time::{KST, format_sql_date, format_sql_timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComparisonOperator {
    #[serde(rename = ">=")]
    AtLeast,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<=")]
    AtMost,
    #[serde(rename = "<")]
    LessThan,
}

impl ComparisonOperator {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::AtLeast => ">=",
            Self::GreaterThan => ">",
            Self::AtMost => "<=",
            Self::LessThan => "<",
        }
    }

    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "이후" | "부터" | "이상" => Some(Self::AtLeast),
            "초과" => Some(Self::GreaterThan),
            "이전" | "까지" | "이하" => Some(Self::AtMost),
            "미만" => Some(Self::LessThan),
            _ => None,
        }
    }
}

impl Display for ComparisonOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeOfDayFilter {
    pub operator: ComparisonOperator,
    pub hour: u8,
    pub minute: u8,
}

impl TimeOfDayFilter {
    /// `HH:MM:SS` as compared against `strftime('%H:%M:%S', e.timestamp)`.
    #[must_use]
    pub fn clock_text(&self) -> String {
        format!("{:02}:{:02}:00", self.hour, self.minute)
    }

    #[must_use]
    pub fn as_pair(&self) -> (&'static str, String) {
        (self.operator.as_sql(), self.clock_text())
    }
}

/// Half-open `[from, to)` interval in KST wall time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: PrimitiveDateTime,
    pub to: PrimitiveDateTime,
}

impl TimeWindow {
    #[must_use]
    pub fn single_day(date: Date) -> Self {
        let from = PrimitiveDateTime::new(date, Time::MIDNIGHT);
        Self {
            from,
            to: from + Duration::days(1),
        }
    }

    #[must_use]
    pub fn from_text(&self) -> String {
        format_sql_timestamp(self.from)
    }

    #[must_use]
    pub fn to_text(&self) -> String {
        format_sql_timestamp(self.to)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowSource {
    #[default]
    None,
    Week,
    Day,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedTimeContext {
    pub date: Option<Date>,
    pub window: Option<TimeWindow>,
    pub window_source: WindowSource,
    pub time_of_day: Option<TimeOfDayFilter>,
}

impl ResolvedTimeContext {
    /// Runs every extractor against `question`. A resolved date yields a
    /// one-day window unless a named week was also found.
    #[must_use]
    pub fn resolve(question: &str, now: OffsetDateTime) -> Self {
        let date = extract_date(question, now);
        let week = resolve_week_window(question, now);
        let (window, window_source) = match (week, date) {
            (Some(week), _) => (Some(week), WindowSource::Week),
            (None, Some(date)) => (Some(TimeWindow::single_day(date)), WindowSource::Day),
            (None, None) => (None, WindowSource::None),
        };

        Self {
            date,
            window,
            window_source,
            time_of_day: extract_time_filter(question),
        }
    }

    #[must_use]
    pub fn has_time_intent(&self) -> bool {
        self.date.is_some() || self.window.is_some() || self.time_of_day.is_some()
    }

    #[must_use]
    pub fn date_text(&self) -> String {
        self.date.map(format_sql_date).unwrap_or_default()
    }

    #[must_use]
    pub fn window_texts(&self) -> (String, String) {
        self.window
            .map(|window| (window.from_text(), window.to_text()))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn time_of_day_texts(&self) -> (String, String) {
        self.time_of_day
            .map(|filter| {
                let (op, value) = filter.as_pair();
                (op.to_string(), value)
            })
            .unwrap_or_default()
    }
}

/// Extracts a single calendar date. Relative words win over numeric forms.
#[must_use]
pub fn extract_date(question: &str, now: OffsetDateTime) -> Option<Date> {
    let text = question.trim();
    let today = now.to_offset(KST).date();

    let relative_days = if text.contains("오늘") {
        Some(0)
    } else if text.contains("그저께") || text.contains("그제") {
        Some(-2)
    } else if text.contains("어제") {
        Some(-1)
    } else if text.contains("모레") {
        Some(2)
    } else if text.contains("내일") {
        Some(1)
    } else {
        None
    };
    if let Some(days) = relative_days {
        return today.checked_add(Duration::days(days));
    }

    if let Some(captures) = days_ago_regex().captures(text) {
        let days = captures[1].parse::<i64>().ok()?;
        return today.checked_sub(Duration::days(days));
    }
    if let Some(captures) = days_later_regex().captures(text) {
        let days = captures[1].parse::<i64>().ok()?;
        return today.checked_add(Duration::days(days));
    }

    if let Some(captures) = month_day_regex().captures(text) {
        let month = captures[1].parse::<u8>().ok()?;
        let day = captures[2].parse::<u8>().ok()?;
        let month = Month::try_from(month).ok()?;
        return Date::from_calendar_date(today.year(), month, day).ok();
    }

    for captures in bare_day_regex().captures_iter(text) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        let preceded_by_month = text[..whole.start()].trim_end().ends_with('월');
        if preceded_by_month {
            continue;
        }
        let day = captures[1].parse::<u8>().ok()?;
        return Date::from_calendar_date(today.year(), today.month(), day).ok();
    }

    None
}

/// Resolves 이번 주 / 지난 주 (저번 주) / 다음 주 to a Monday-based week.
#[must_use]
pub fn resolve_week_window(question: &str, now: OffsetDateTime) -> Option<TimeWindow> {
    let text = question.trim();
    let offset_weeks = week_patterns()
        .iter()
        .find(|(pattern, _)| pattern.is_match(text))
        .map(|(_, offset)| *offset)?;

    let today = now.to_offset(KST).date();
    let monday = today - Duration::days(i64::from(today.weekday().number_days_from_monday()));
    let start = PrimitiveDateTime::new(monday, Time::MIDNIGHT) + Duration::weeks(offset_weeks);
    Some(TimeWindow {
        from: start,
        to: start + Duration::days(7),
    })
}

#[must_use]
pub fn extract_time_filter(question: &str) -> Option<TimeOfDayFilter> {
    let captures = time_filter_regex().captures(question)?;
    let operator = ComparisonOperator::from_keyword(captures.get(2)?.as_str())?;
    let (hour, minute) = extract_clock(captures.get(1)?.as_str())?;
    Some(TimeOfDayFilter {
        operator,
        hour,
        minute,
    })
}

/// Parses the first `[period] N시 [M분]` phrase into a clamped 24-hour clock.
#[must_use]
pub fn extract_clock(phrase: &str) -> Option<(u8, u8)> {
    let captures = time_phrase_regex().captures(phrase)?;
    let period = captures.get(1).map(|label| label.as_str());
    let hour = captures[2].parse::<u32>().ok()?;
    let minute = captures
        .get(3)
        .and_then(|value| value.as_str().parse::<u32>().ok())
        .unwrap_or(0);

    let hour = to_24h(hour, period).min(23);
    let minute = minute.min(59);
    Some((u8::try_from(hour).ok()?, u8::try_from(minute).ok()?))
}

#[must_use]
pub fn to_24h(hour: u32, period: Option<&str>) -> u32 {
    match period {
        Some("오전" | "새벽") if hour == 12 => 0,
        Some("오후" | "저녁" | "밤") if hour < 12 => hour + 12,
        _ => hour,
    }
}

fn days_ago_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"([0-9]+)\s*일\s*전").expect("days-ago regex should compile"))
}

fn days_later_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"([0-9]+)\s*일\s*후").expect("days-later regex should compile")
    })
}

fn month_day_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"([0-9]{1,2})\s*월\s*([0-9]{1,2})\s*일").expect("month-day regex should compile")
    })
}

fn bare_day_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"([0-9]{1,2})\s*일").expect("bare day regex should compile"))
}

fn week_patterns() -> &'static [(Regex, i64)] {
    static PATTERNS: OnceLock<Vec<(Regex, i64)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"이번\s*주", 0),
            (r"(?:지난|저번)\s*주", -1),
            (r"다음\s*주", 1),
        ]
        .into_iter()
        .map(|(pattern, offset)| {
            (
                Regex::new(pattern).expect("week window regex should compile"),
                offset,
            )
        })
        .collect()
    })
}

fn time_phrase_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(오전|오후|저녁|밤|새벽)?\s*([0-9]{1,2})\s*시(?:\s*([0-9]{1,2})\s*분)?")
            .expect("time phrase regex should compile")
    })
}

fn time_filter_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(
            r"((?:오전|오후|저녁|밤|새벽)?\s*[0-9]{1,2}\s*시(?:\s*[0-9]{1,2}\s*분)?)\s*(이후|이전|부터|까지|이상|이하|초과|미만)",
        )
        .expect("time filter regex should compile")
    })
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;
    use time::macros::{date, datetime};

    use super::{extract_clock, extract_date, to_24h};
    use crate::utils::time::KST;

    fn monday_morning() -> OffsetDateTime {
        datetime!(2025-08-18 10:00:00).assume_offset(KST)
    }

    #[test]
    fn relative_day_words_resolve_against_now() {
        let now = monday_morning();
        assert_eq!(extract_date("오늘 스트레스", now), Some(date!(2025-08-18)));
        assert_eq!(extract_date("그저께 HRV", now), Some(date!(2025-08-16)));
        assert_eq!(extract_date("내일모레 일정", now), Some(date!(2025-08-20)));
    }

    #[test]
    fn bare_day_uses_current_month() {
        let now = monday_morning();
        assert_eq!(extract_date("3일 스트레스", now), Some(date!(2025-08-03)));
        assert_eq!(extract_date("스트레스 알려줘", now), None);
    }

    #[test]
    fn impossible_calendar_dates_yield_none() {
        assert_eq!(extract_date("2월 30일 스트레스", monday_morning()), None);
    }

    #[test]
    fn period_labels_adjust_twelve_hour_values() {
        assert_eq!(to_24h(12, Some("오전")), 0);
        assert_eq!(to_24h(12, Some("오후")), 12);
        assert_eq!(to_24h(3, Some("새벽")), 3);
        assert_eq!(to_24h(21, None), 21);
        assert_eq!(extract_clock("저녁 7시 30분"), Some((19, 30)));
        assert_eq!(extract_clock("30시 75분"), Some((23, 59)));
    }
}
