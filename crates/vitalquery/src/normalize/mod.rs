mod clauses;

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use time::OffsetDateTime;

use crate::guard::strip_trailing_semicolons;
use crate::intent::{Direction, asks_when, detect_extreme_direction};
use crate::router::Metric;
use crate::timeframe::ResolvedTimeContext;

use clauses::{
    aggregate_call_regex, group_by_regex, order_by_aggregate_regex, order_by_regex,
    replace_select_list, select_list, split_top_level_commas, tail_clause_start,
};

const NON_NULL_TIMESTAMP: &str = "e.timestamp IS NOT NULL";
const NON_BLANK_TIMESTAMP: &str = "e.timestamp <> ''";

/// Question-derived flags the rewrites depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NormalizationInput {
    pub metric: Metric,
    pub direction: Option<Direction>,
    pub wants_when: bool,
    pub has_time_intent: bool,
}

impl NormalizationInput {
    #[must_use]
    pub fn from_question(question: &str, metric: Metric, now: OffsetDateTime) -> Self {
        Self {
            metric,
            direction: detect_extreme_direction(question),
            wants_when: asks_when(question),
            has_time_intent: ResolvedTimeContext::resolve(question, now).has_time_intent(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rewrite {
    TimeLiterals,
    HalfOpenBetween,
    UnwantedTimeFilters,
    NonNullGuards,
    NonGroupedColumns,
    GroupByForAggregateOrder,
    GroupCompare,
    ExtremeSelect,
    ExtremeOrder,
}

impl Rewrite {
    pub const PIPELINE: [Rewrite; 9] = [
        Rewrite::TimeLiterals,
        Rewrite::HalfOpenBetween,
        Rewrite::UnwantedTimeFilters,
        Rewrite::NonNullGuards,
        Rewrite::NonGroupedColumns,
        Rewrite::GroupByForAggregateOrder,
        Rewrite::GroupCompare,
        Rewrite::ExtremeSelect,
        Rewrite::ExtremeOrder,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TimeLiterals => "time_literals",
            Self::HalfOpenBetween => "half_open_between",
            Self::UnwantedTimeFilters => "unwanted_time_filters",
            Self::NonNullGuards => "non_null_guards",
            Self::NonGroupedColumns => "non_grouped_columns",
            Self::GroupByForAggregateOrder => "group_by_for_aggregate_order",
            Self::GroupCompare => "group_compare",
            Self::ExtremeSelect => "extreme_select",
            Self::ExtremeOrder => "extreme_order",
        }
    }

    #[must_use]
    pub fn apply(self, sql: &str, input: &NormalizationInput) -> String {
        match self {
            Self::TimeLiterals => normalize_time_literals(sql),
            Self::HalfOpenBetween => normalize_between(sql),
            Self::UnwantedTimeFilters => strip_unwanted_time_filters(sql, input.has_time_intent),
            Self::NonNullGuards => inject_non_null_guards(sql),
            Self::NonGroupedColumns => strip_non_grouped_columns(sql),
            Self::GroupByForAggregateOrder => ensure_group_by_for_aggregate_order(sql),
            Self::GroupCompare => expand_group_compare(sql, input.metric),
            Self::ExtremeSelect => ensure_metric_in_select_for_extremes(
                sql,
                input.metric,
                input.wants_when,
                input.direction.is_some(),
            ),
            Self::ExtremeOrder => ensure_order_for_extremes(sql, input.metric, input.direction),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedSql {
    pub sql: String,
    pub applied: Vec<Rewrite>,
}

/// Runs every rewrite in pipeline order after stripping trailing semicolons.
#[must_use]
pub fn normalize_sql(sql: &str, input: &NormalizationInput) -> NormalizedSql {
    let mut current = strip_trailing_semicolons(sql).to_string();
    let mut applied = Vec::new();
    for rewrite in Rewrite::PIPELINE {
        let next = rewrite.apply(&current, input);
        if next != current {
            applied.push(rewrite);
            current = next;
        }
    }
    NormalizedSql {
        sql: current,
        applied,
    }
}

/// `e.timestamp >= '21'` compares a clock value against a full timestamp;
/// rewrite it as a time-of-day comparison.
#[must_use]
pub fn normalize_time_literals(sql: &str) -> String {
    time_literal_regex()
        .replace_all(sql, |captures: &regex::Captures<'_>| {
            let clock_part = |index: usize| {
                captures
                    .get(index)
                    .and_then(|value| value.as_str().parse::<u32>().ok())
                    .unwrap_or(0)
            };
            format!(
                "strftime('%H:%M:%S', e.timestamp) {} '{:02}:{:02}:{:02}'",
                &captures[1],
                clock_part(2),
                clock_part(3),
                clock_part(4)
            )
        })
        .into_owned()
}

#[must_use]
pub fn normalize_between(sql: &str) -> String {
    between_regex()
        .replace_all(sql, "$column >= '$from' AND $column < '$to'")
        .into_owned()
}

/// Drops timestamp and time-of-day filters the model added on its own when
/// the question carries no date, window or time-of-day intent.
#[must_use]
pub fn strip_unwanted_time_filters(sql: &str, has_time_intent: bool) -> String {
    if has_time_intent {
        return sql.to_string();
    }

    let mut current = sql.to_string();
    loop {
        let previous = current.clone();
        current = and_time_filter_regex().replace_all(&current, "").into_owned();
        current = where_time_filter_and_regex()
            .replace_all(&current, "WHERE ")
            .into_owned();
        current = where_time_filter_regex()
            .replace_all(&current, "WHERE ")
            .into_owned();
        current = where_and_regex().replace_all(&current, "WHERE ").into_owned();
        current = double_and_regex().replace_all(&current, " AND ").into_owned();
        current = dangling_where_regex()
            .replace_all(&current, " $clause")
            .into_owned();
        current = trailing_where_regex().replace_all(&current, "").into_owned();
        if current == previous {
            break;
        }
    }
    current.trim().to_string()
}

/// Adds whichever of the two timestamp guards is missing, into the existing
/// WHERE or a new WHERE ahead of GROUP BY / HAVING / ORDER BY / LIMIT.
#[must_use]
pub fn inject_non_null_guards(sql: &str) -> String {
    if !reads_event_table_regex().is_match(sql) {
        return sql.to_string();
    }

    let mut missing = Vec::new();
    if !non_null_regex().is_match(sql) {
        missing.push(NON_NULL_TIMESTAMP);
    }
    if !non_blank_regex().is_match(sql) {
        missing.push(NON_BLANK_TIMESTAMP);
    }
    if missing.is_empty() {
        return sql.to_string();
    }
    let guard = missing.join(" AND ");

    let split_at = tail_clause_start(sql).unwrap_or(sql.len());
    let (head, tail) = sql.split_at(split_at);
    let head = head.trim_end();
    let head = match where_regex().find(head) {
        Some(found) => format!(
            "{}WHERE {guard} AND {}",
            &head[..found.start()],
            head[found.end()..].trim_start()
        ),
        None => format!("{head} WHERE {guard}"),
    };

    let tail = tail.trim();
    if tail.is_empty() {
        head
    } else {
        format!("{head} {tail}")
    }
}

/// With an aggregate in the SELECT list and no GROUP BY, bare columns are
/// dropped. The group-compare shape (ORDER BY an aggregate with `u.name`
/// selected) is left for the GROUP BY inference.
#[must_use]
pub fn strip_non_grouped_columns(sql: &str) -> String {
    if group_by_regex().is_match(sql) {
        return sql.to_string();
    }
    let Some(range) = select_list(sql) else {
        return sql.to_string();
    };
    let list = &sql[range];
    if !aggregate_call_regex().is_match(list) {
        return sql.to_string();
    }
    if order_by_aggregate_regex().is_match(sql) && user_name_regex().is_match(list) {
        return sql.to_string();
    }

    let items = split_top_level_commas(list);
    let aggregates = items
        .iter()
        .filter(|item| aggregate_call_regex().is_match(item))
        .copied()
        .collect::<Vec<_>>();
    if aggregates.len() == items.len() {
        return sql.to_string();
    }
    replace_select_list(sql, &aggregates.join(", "))
}

#[must_use]
pub fn ensure_group_by_for_aggregate_order(sql: &str) -> String {
    if group_by_regex().is_match(sql) || !order_by_aggregate_regex().is_match(sql) {
        return sql.to_string();
    }
    let selects_name = select_list(sql).is_some_and(|range| user_name_regex().is_match(&sql[range]));
    if !selects_name {
        return sql.to_string();
    }
    order_by_regex()
        .replacen(sql, 1, "GROUP BY u.name ORDER BY")
        .into_owned()
}

/// Per-person average comparison: fixed SELECT list and no LIMIT.
#[must_use]
pub fn expand_group_compare(sql: &str, metric: Metric) -> String {
    if !group_by_name_regex().is_match(sql) || !order_by_average_regex().is_match(sql) {
        return sql.to_string();
    }
    let expanded = replace_select_list(
        sql,
        &format!("u.name, ROUND(AVG(e.{}), 1) AS avg_val", metric.column()),
    );
    trailing_limit_regex()
        .replace(&expanded, "")
        .trim()
        .to_string()
}

#[must_use]
pub fn ensure_metric_in_select_for_extremes(
    sql: &str,
    metric: Metric,
    wants_when: bool,
    is_extreme: bool,
) -> String {
    if !is_extreme || aggregate_call_regex().is_match(sql) || group_by_regex().is_match(sql) {
        return sql.to_string();
    }
    let list = if wants_when {
        format!("e.timestamp, e.{}", metric.column())
    } else {
        format!("e.{}", metric.column())
    };
    replace_select_list(sql, &list)
}

/// Adds `ORDER BY e.<metric> {DESC|ASC}, e.timestamp DESC` when no ORDER BY
/// exists, ahead of an existing LIMIT or followed by `LIMIT 1`.
#[must_use]
pub fn ensure_order_for_extremes(sql: &str, metric: Metric, direction: Option<Direction>) -> String {
    let Some(direction) = direction else {
        return sql.to_string();
    };
    if order_by_regex().is_match(sql)
        || aggregate_call_regex().is_match(sql)
        || group_by_regex().is_match(sql)
    {
        return sql.to_string();
    }

    let order = format!(
        "ORDER BY e.{} {}, e.timestamp DESC",
        metric.column(),
        direction.order_keyword()
    );
    let trimmed = sql.trim();
    match limit_regex().find(trimmed) {
        Some(found) => format!(
            "{} {order} {}",
            trimmed[..found.start()].trim_end(),
            &trimmed[found.start()..]
        ),
        None => format!("{trimmed} {order} LIMIT 1"),
    }
}

macro_rules! cached_regex {
    ($name:ident, $pattern:expr, $label:literal) => {
        fn $name() -> &'static Regex {
            static REGEX: OnceLock<Regex> = OnceLock::new();
            REGEX.get_or_init(|| Regex::new($pattern).expect(concat!($label, " regex should compile")))
        }
    };
}

const TIME_FILTER: &str = concat!(
    r"(?:e\.timestamp\s+BETWEEN\s+'[^']+'\s+AND\s+'[^']+'",
    r"|e\.timestamp\s*(?:>=|>|<=|<)\s*'[^']+'",
    r"|strftime\('%H:%M:%S'\s*,\s*e\.timestamp\)\s*(?:=|>=|>|<=|<)\s*'[^']+')"
);

cached_regex!(
    time_literal_regex,
    r"(?i)\be\.timestamp\s*(>=|>|<=|<)\s*'([0-9]{1,2})(?::([0-9]{2}))?(?::([0-9]{2}))?'",
    "time literal"
);
cached_regex!(
    between_regex,
    r"(?i)(?P<column>\be\.timestamp)\s+BETWEEN\s+'(?P<from>[^']+)'\s+AND\s+'(?P<to>[^']+)'",
    "between"
);
cached_regex!(
    and_time_filter_regex,
    &format!(r"(?i)\s+AND\s+{TIME_FILTER}"),
    "and time filter"
);
cached_regex!(
    where_time_filter_and_regex,
    &format!(r"(?i)\bWHERE\s+{TIME_FILTER}\s+AND\s+"),
    "where time filter and"
);
cached_regex!(
    where_time_filter_regex,
    &format!(r"(?i)\bWHERE\s+{TIME_FILTER}"),
    "where time filter"
);
cached_regex!(where_and_regex, r"(?i)\bWHERE\s+AND\s+", "where and");
cached_regex!(double_and_regex, r"(?i)\s+AND\s+AND\s+", "double and");
cached_regex!(
    dangling_where_regex,
    r"(?i)\s+WHERE\s+(?P<clause>GROUP\s+BY|HAVING|ORDER\s+BY|LIMIT)\b",
    "dangling where"
);
cached_regex!(trailing_where_regex, r"(?i)\s+WHERE\s*$", "trailing where");
cached_regex!(
    reads_event_table_regex,
    r"(?i)\b(?:FROM|JOIN)\s+event\b",
    "event table"
);
cached_regex!(non_null_regex, r"(?i)\be\.timestamp\s+IS\s+NOT\s+NULL\b", "non-null");
cached_regex!(non_blank_regex, r"(?i)\be\.timestamp\s*<>\s*''", "non-blank");
cached_regex!(where_regex, r"(?i)\bWHERE\b\s*", "where");
cached_regex!(user_name_regex, r"(?i)\bu\.name\b", "user name");
cached_regex!(group_by_name_regex, r"(?i)\bGROUP\s+BY\s+u\.name\b", "group by name");
cached_regex!(order_by_average_regex, r"(?i)\bORDER\s+BY\s+AVG\s*\(", "order by average");
cached_regex!(trailing_limit_regex, r"(?i)\s+LIMIT\s+[0-9]+\s*;?\s*$", "trailing limit");
cached_regex!(limit_regex, r"(?i)\bLIMIT\b", "limit");
