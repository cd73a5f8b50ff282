use time::OffsetDateTime;
use time::macros::{date, datetime};
use vitalquery::timeframe::{
    ResolvedTimeContext, WindowSource, extract_date, extract_time_filter, resolve_week_window,
};

/// Monday morning in KST.
fn now() -> OffsetDateTime {
    datetime!(2025-08-18 10:00 +9)
}

#[test]
fn yesterday_resolves_to_previous_calendar_day() {
    assert_eq!(extract_date("어제 스트레스", now()), Some(date!(2025-08-17)));
    assert_eq!(extract_date("3일 전 HRV", now()), Some(date!(2025-08-15)));
    assert_eq!(extract_date("8월 3일 기록", now()), Some(date!(2025-08-03)));
}

#[test]
fn kst_date_is_used_even_when_utc_is_a_day_behind() {
    let early_kst = datetime!(2025-08-17 16:30 UTC);
    assert_eq!(extract_date("오늘", early_kst), Some(date!(2025-08-18)));
}

#[test]
fn this_week_is_a_monday_based_half_open_window() {
    let window = resolve_week_window("이번주 평균 HRV", now()).expect("week should resolve");
    assert_eq!(window.from_text(), "2025-08-18 00:00:00");
    assert_eq!(window.to_text(), "2025-08-25 00:00:00");

    let last = resolve_week_window("지난 주 스트레스", now()).expect("last week should resolve");
    assert_eq!(last.from_text(), "2025-08-11 00:00:00");
    assert_eq!(last.to_text(), "2025-08-18 00:00:00");
}

#[test]
fn night_nine_after_becomes_at_least_twenty_one() {
    let filter = extract_time_filter("밤 9시 이후 움직임").expect("filter should resolve");
    assert_eq!(filter.as_pair(), (">=", "21:00:00".to_string()));

    let before = extract_time_filter("오전 10시 30분 이전").expect("filter should resolve");
    assert_eq!(before.as_pair(), ("<=", "10:30:00".to_string()));
}

#[test]
fn resolved_context_prefers_week_over_day_window() {
    let context = ResolvedTimeContext::resolve("이번주 어제 스트레스", now());
    assert_eq!(context.window_source, WindowSource::Week);
    assert_eq!(context.date_text(), "2025-08-17");
    assert_eq!(
        context.window_texts(),
        (
            "2025-08-18 00:00:00".to_string(),
            "2025-08-25 00:00:00".to_string()
        )
    );
}

#[test]
fn question_without_time_words_has_no_time_intent() {
    let context = ResolvedTimeContext::resolve("박주연의 평균 HRV", now());
    assert!(!context.has_time_intent());
    assert_eq!(context.window_texts(), (String::new(), String::new()));
    assert_eq!(context.time_of_day_texts(), (String::new(), String::new()));
}

#[test]
fn time_of_day_texts_match_the_filter_pair() {
    let context = ResolvedTimeContext::resolve("어제 밤 9시 이후 움직임", now());
    let filter = context.time_of_day.expect("filter should resolve");
    let (op, value) = filter.as_pair();
    assert_eq!(context.time_of_day_texts(), (op.to_string(), value));
    assert_eq!(
        context.time_of_day_texts(),
        (">=".to_string(), "21:00:00".to_string())
    );
}
