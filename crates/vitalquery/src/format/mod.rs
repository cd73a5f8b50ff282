use std::cmp::Ordering;
use std::collections::HashSet;

use crate::intent::Direction;
use crate::models::rows::{Cell, Row, ToolPayload};

pub const EMPTY_ANSWER: &str = "Answer: 결과가 비어 있습니다.";

const MAX_LISTED: usize = 10;
const MAX_EXTRA_PEOPLE: usize = 8;

/// Renders an executed query result as a deterministic `Answer:` line.
#[must_use]
pub fn format_answer(payload: &ToolPayload, direction: Option<Direction>) -> String {
    match payload {
        ToolPayload::Text(text) if text.trim().is_empty() => EMPTY_ANSWER.to_string(),
        ToolPayload::Text(text) => format!("Answer: {}", text.trim()),
        ToolPayload::Rows(rows) => format_rows(rows, direction),
    }
}

#[must_use]
pub fn format_rows(rows: &[Row], direction: Option<Direction>) -> String {
    let Some(first) = rows.first() else {
        return EMPTY_ANSWER.to_string();
    };

    match first.as_slice() {
        [stamp, value, ..] if stamp.is_timestamp() && value.is_number() => {
            format_extreme_readings(rows, direction)
        }
        [Cell::Text(_), value, ..] if value.is_number() => format_named_averages(rows),
        [stamp] if stamp.is_timestamp() => format_timestamps(rows),
        _ => format_first_column(rows),
    }
}

/// `99.0` → `99`, `80.26` → `80.3`.
#[must_use]
pub fn fmt_num(value: f64) -> String {
    let rendered = format!("{value:.1}");
    let trimmed = rendered.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `YYYY-MM-DD HH:MM:SS` → `YYYY-MM-DD HH:MM`; other text is returned as-is.
#[must_use]
pub fn to_min_ts(stamp: &str) -> &str {
    stamp.get(..16).unwrap_or(stamp)
}

fn fmt_cell(cell: &Cell) -> String {
    match cell {
        Cell::Null => "없음".to_string(),
        Cell::Integer(_) | Cell::Real(_) => cell.as_f64().map(fmt_num).unwrap_or_default(),
        Cell::Text(text) => text.clone(),
    }
}

fn format_extreme_readings(rows: &[Row], direction: Option<Direction>) -> String {
    let readings = rows
        .iter()
        .filter_map(|row| match row.as_slice() {
            [Cell::Text(stamp), value, ..] if value.is_number() && row[0].is_timestamp() => {
                value.as_f64().map(|value| (stamp.as_str(), value))
            }
            _ => None,
        })
        .collect::<Vec<_>>();

    let values = readings.iter().map(|(_, value)| *value);
    let target = match direction {
        Some(Direction::Min) => values.fold(None, |best: Option<f64>, value| {
            Some(best.map_or(value, |best| best.min(value)))
        }),
        _ => values.fold(None, |best: Option<f64>, value| {
            Some(best.map_or(value, |best| best.max(value)))
        }),
    };
    let Some(target) = target else {
        return EMPTY_ANSWER.to_string();
    };

    let ties = readings
        .iter()
        .filter(|(_, value)| *value == target)
        .collect::<Vec<_>>();
    if let [(stamp, value)] = ties.as_slice() {
        return format!("Answer: {} (지수 {})", to_min_ts(stamp), fmt_num(*value));
    }

    let bullets = ties
        .iter()
        .take(MAX_LISTED)
        .map(|(stamp, value)| format!("- {} (지수 {})", to_min_ts(stamp), fmt_num(*value)))
        .collect::<Vec<_>>();
    format!(
        "Answer:\n{}{}",
        bullets.join("\n"),
        more_suffix(ties.len(), MAX_LISTED)
    )
}

fn format_named_averages(rows: &[Row]) -> String {
    let mut pairs = rows
        .iter()
        .filter_map(|row| match row.as_slice() {
            [Cell::Text(name), value, ..] => value.as_f64().map(|value| (name.as_str(), value)),
            _ => None,
        })
        .collect::<Vec<_>>();
    pairs.sort_by(|left, right| right.1.partial_cmp(&left.1).unwrap_or(Ordering::Equal));

    let summary = match pairs.as_slice() {
        [] => return EMPTY_ANSWER.to_string(),
        [(name, value)] => return format!("Answer: {name} (평균 {})", fmt_num(*value)),
        [(top_name, top_value), (second_name, second_value), ..] => {
            if top_value == second_value {
                format!("{top_name} = {second_name} (평균 {})", fmt_num(*top_value))
            } else {
                format!(
                    "{top_name} (평균 {}) > {second_name} (평균 {})",
                    fmt_num(*top_value),
                    fmt_num(*second_value)
                )
            }
        }
    };

    if pairs.len() <= 2 {
        return format!("Answer: {summary}");
    }
    let extra = pairs
        .iter()
        .skip(2)
        .take(MAX_EXTRA_PEOPLE)
        .map(|(name, value)| format!("- {name} (평균 {})", fmt_num(*value)))
        .collect::<Vec<_>>();
    format!(
        "Answer: {summary}\n{}{}",
        extra.join("\n"),
        more_suffix(pairs.len(), 2 + MAX_EXTRA_PEOPLE)
    )
}

fn format_timestamps(rows: &[Row]) -> String {
    let mut seen = HashSet::new();
    let minutes = rows
        .iter()
        .filter_map(|row| match row.as_slice() {
            [Cell::Text(stamp)] if row[0].is_timestamp() => Some(to_min_ts(stamp)),
            _ => None,
        })
        .filter(|minute| seen.insert(*minute))
        .collect::<Vec<_>>();
    if minutes.is_empty() {
        return EMPTY_ANSWER.to_string();
    }

    let bullets = minutes
        .iter()
        .take(MAX_LISTED)
        .map(|minute| format!("- {minute}"))
        .collect::<Vec<_>>();
    format!(
        "Answer:\n{}{}",
        bullets.join("\n"),
        more_suffix(minutes.len(), MAX_LISTED)
    )
}

fn format_first_column(rows: &[Row]) -> String {
    let values = rows
        .iter()
        .map(|row| row.first().cloned().unwrap_or(Cell::Null))
        .collect::<Vec<_>>();

    if let [value] = values.as_slice() {
        if value.is_blank() {
            return EMPTY_ANSWER.to_string();
        }
        return format!("Answer: {}", fmt_cell(value));
    }

    let bullets = values
        .iter()
        .take(MAX_LISTED)
        .map(|value| format!("- {}", fmt_cell(value)))
        .collect::<Vec<_>>();
    format!(
        "Answer:\n{}{}",
        bullets.join("\n"),
        more_suffix(values.len(), MAX_LISTED)
    )
}

fn more_suffix(total: usize, shown_limit: usize) -> String {
    if total > shown_limit {
        format!("\n(+{}개 더)", total - shown_limit)
    } else {
        String::new()
    }
}
