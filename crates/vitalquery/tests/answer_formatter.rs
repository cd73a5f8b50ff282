use vitalquery::format::{EMPTY_ANSWER, format_answer, format_rows};
use vitalquery::intent::Direction;
use vitalquery::models::rows::{Cell, Row, ToolPayload, parse_tool_result};

fn text(value: &str) -> Cell {
    Cell::Text(value.to_string())
}

fn reading(stamp: &str, value: i64) -> Row {
    vec![text(stamp), Cell::Integer(value)]
}

#[test]
fn single_extreme_reading_is_rendered_to_the_minute() {
    let rows = vec![reading("2025-08-17 16:35:12", 99)];
    insta::assert_snapshot!(
        format_rows(&rows, Some(Direction::Max)),
        @"Answer: 2025-08-17 16:35 (지수 99)"
    );
}

#[test]
fn tied_extremes_are_listed_as_bullets() {
    let rows = vec![
        reading("2025-08-17 16:35:12", 99),
        reading("2025-08-18 09:10:00", 99),
        reading("2025-08-18 11:00:00", 40),
    ];
    insta::assert_snapshot!(format_rows(&rows, Some(Direction::Max)), @r"
    Answer:
    - 2025-08-17 16:35 (지수 99)
    - 2025-08-18 09:10 (지수 99)
    ");
}

#[test]
fn minimum_direction_picks_the_lowest_reading() {
    let rows = vec![
        vec![text("2025-08-17 08:00:00"), Cell::Real(42.5)],
        vec![text("2025-08-17 09:00:00"), Cell::Real(31.24)],
    ];
    insta::assert_snapshot!(
        format_rows(&rows, Some(Direction::Min)),
        @"Answer: 2025-08-17 09:00 (지수 31.2)"
    );
}

#[test]
fn two_person_averages_compare_highest_first() {
    let rows = vec![
        vec![text("박해름"), Cell::Real(72.46)],
        vec![text("박주연"), Cell::Real(80.26)],
    ];
    insta::assert_snapshot!(
        format_rows(&rows, None),
        @"Answer: 박주연 (평균 80.3) > 박해름 (평균 72.5)"
    );
}

#[test]
fn equal_averages_render_as_equality() {
    let rows = vec![
        vec![text("박주연"), Cell::Real(80.0)],
        vec![text("박해름"), Cell::Integer(80)],
    ];
    insta::assert_snapshot!(format_rows(&rows, None), @"Answer: 박주연 = 박해름 (평균 80)");
}

#[test]
fn extra_people_follow_the_top_pair() {
    let rows = vec![
        vec![text("김하늘"), Cell::Real(55.0)],
        vec![text("박주연"), Cell::Real(80.0)],
        vec![text("박해름"), Cell::Real(70.0)],
    ];
    insta::assert_snapshot!(format_rows(&rows, None), @r"
    Answer: 박주연 (평균 80) > 박해름 (평균 70)
    - 김하늘 (평균 55)
    ");
}

#[test]
fn timestamp_only_rows_are_deduplicated_per_minute() {
    let rows = vec![
        vec![text("2025-08-18 07:01:10")],
        vec![text("2025-08-18 07:01:55")],
        vec![text("2025-08-18 07:05:00")],
    ];
    insta::assert_snapshot!(format_rows(&rows, None), @r"
    Answer:
    - 2025-08-18 07:01
    - 2025-08-18 07:05
    ");
}

#[test]
fn long_lists_are_capped_with_a_remainder_line() {
    let rows = (0..12)
        .map(|index| vec![Cell::Integer(index)])
        .collect::<Vec<_>>();
    let answer = format_rows(&rows, None);
    assert!(answer.starts_with("Answer:\n- 0\n- 1\n"));
    assert!(answer.contains("- 9\n"));
    assert!(!answer.contains("- 10"));
    assert!(answer.ends_with("(+2개 더)"));
}

#[test]
fn scalar_results_and_nulls() {
    insta::assert_snapshot!(format_rows(&[vec![Cell::Real(3.0)]], None), @"Answer: 3");
    assert_eq!(format_rows(&[vec![Cell::Null]], None), EMPTY_ANSWER);
    insta::assert_snapshot!(
        format_rows(&[vec![Cell::Null], vec![text("outdoor")]], None),
        @r"
    Answer:
    - 없음
    - outdoor
    "
    );
}

#[test]
fn empty_results_have_a_fixed_answer() {
    let payload = parse_tool_result("[]").expect("empty array is a payload");
    assert_eq!(format_answer(&payload, None), EMPTY_ANSWER);
    assert_eq!(
        format_answer(&ToolPayload::Text("   ".to_string()), None),
        EMPTY_ANSWER
    );
}

#[test]
fn text_payloads_pass_through() {
    assert_eq!(
        format_answer(&ToolPayload::Text("3 rows".to_string()), None),
        "Answer: 3 rows"
    );
}
