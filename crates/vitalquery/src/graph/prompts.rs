use crate::router::Metric;
use crate::timeframe::ResolvedTimeContext;

/// Generation halts on any of these so the model cannot echo schema text,
/// role labels or fences after the query.
pub const GENERATION_STOP: [&str; 9] = [
    "\n\n",
    "/*",
    "SCHEMA (STRICT):",
    "CREATE TABLE",
    "System:",
    "Human:",
    "AI:",
    "Tool:",
    "```",
];

pub const TABLE_SELECTION_SYSTEM: &str = "You are an expert at choosing relevant tables. Given a user question and a list of available tables, decide which tables are relevant. Exclude internal SQLite tables like 'sqlite_sequence'. Return only a comma-separated list of table names with NO extra words.";

pub const QUERY_CHECK_SYSTEM: &str = r#"You are a careful SQLite expert.
Review the given SQL query for common mistakes:
- NOT IN with NULLs
- UNION vs UNION ALL
- BETWEEN used for exclusive ranges
- Type mismatches
- Proper quoting of identifiers
- Wrong function arg counts
- Casting issues
- Wrong join columns

If mistakes exist, rewrite the query; otherwise, return it as-is.

Return ONLY valid JSON, no code fences, no extra text, with schema:
{"sql": "<final_sql_to_execute>"}"#;

pub const CHECK_PLACEHOLDER: &str = "<final_sql_to_execute>";

const QUERY_GENERATION_TEMPLATE: &str = r#"You are a SQL expert.

YOU MUST follow these constraints strictly:
- Use ONLY tables/columns explicitly listed in the SCHEMA (STRICT) message below.
- NEVER invent tables or columns. If something is missing, output: Error: Missing data
- Always fully-qualify columns with aliases: event AS e, users AS u.
- To filter by a user name, JOIN users u ON u.id = e.protectee_id and filter u.name = '<name>'.
- e.timestamp is a TEXT datetime ('YYYY-MM-DD HH:MM:SS').

Decide the SQL SHAPE from the user's wording (YOU choose the right form):
- "평균/average" → use AVG({metric})
- "가장 높/최대/최고" → ORDER BY {metric} DESC, then e.timestamp DESC, LIMIT 1
- "가장 낮/최소" → ORDER BY {metric} ASC, then e.timestamp DESC, LIMIT 1
- "개수/횟수" → COUNT(*)
- "최근/가장 최근/마지막 시각" → ORDER BY e.timestamp DESC, LIMIT 1
- If the user asks explicitly for the time/when ("시간/시각/언제"), include e.timestamp in the SELECT; otherwise only select what is necessary for the answer.
- If the query ranks by the TARGET METRIC (e.g., highest/lowest) AND the user asks "when/언제/날짜/시각", SELECT **both** e.timestamp AND {metric}.
- NEVER select non-aggregated columns together with aggregates unless you also provide a proper GROUP BY. Prefer removing non-aggregated columns when not needed.

If a resolved week/day time window is provided, you MUST add BOTH filters:
- AND e.timestamp >= '{from}' (if provided and not empty)
- AND e.timestamp <  '{to}'   (if provided and not empty)

If a resolved time-of-day filter is provided, compare using strftime:
- AND strftime('%H:%M:%S', e.timestamp) {time_op} '{time_value}'

- Exclude NULL or blank timestamps: add "AND e.timestamp IS NOT NULL AND e.timestamp <> ''".
- Prefer returning a single, valid SQLite SELECT (no backticks, no commentary). No DDL/DML statements."#;

#[must_use]
pub fn query_generation_system(metric: Metric, time: &ResolvedTimeContext) -> String {
    let (from, to) = time.window_texts();
    let (time_op, time_value) = time.time_of_day_texts();
    QUERY_GENERATION_TEMPLATE
        .replace("{metric}", &metric.qualified_column())
        .replace("{from}", &from)
        .replace("{to}", &to)
        .replace("{time_op}", &time_op)
        .replace("{time_value}", &time_value)
}

#[must_use]
pub fn query_generation_user(
    question: &str,
    schema_facts: &str,
    time: &ResolvedTimeContext,
    previous_failure: Option<&str>,
) -> String {
    let (from, to) = time.window_texts();
    let (time_op, time_value) = time.time_of_day_texts();
    let mut prompt = format!(
        "User question:\n{question}\n\n{}\n\n\
         Resolved date (if any): {}\n\
         Resolved time window (if any): from {from} to {to}\n\
         Resolved time-of-day filter (if any): op={time_op}, value={time_value}\n",
        schema_facts.trim_end(),
        time.date_text(),
    );
    if let Some(failure) = previous_failure {
        prompt.push_str(&format!(
            "Previous attempt was rejected: {failure}\nFix the query accordingly.\n"
        ));
    }
    prompt.push_str("Return ONLY one valid SQLite SELECT (no commentary).");
    prompt
}

#[must_use]
pub fn table_selection_user(question: &str, tables: &[String]) -> String {
    format!(
        "Question: {question}\nAvailable tables: {}",
        tables.join(", ")
    )
}

#[must_use]
pub fn query_check_user(sql: &str) -> String {
    format!("SQL to check:\n{sql}")
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::{query_generation_system, query_generation_user};
    use crate::router::Metric;
    use crate::timeframe::ResolvedTimeContext;

    #[test]
    fn generation_prompt_carries_resolved_window_and_metric() {
        let time = ResolvedTimeContext::resolve("어제 밤 9시 이후", datetime!(2025-08-18 10:00 +9));
        let system = query_generation_system(Metric::Stress, &time);
        assert!(system.contains("ORDER BY e.stress DESC"));
        assert!(system.contains("e.timestamp >= '2025-08-17 00:00:00'"));
        assert!(system.contains("e.timestamp) >= '21:00:00'"));

        let user = query_generation_user("q", "SCHEMA (STRICT):", &time, Some("Error: Wrong metric."));
        assert!(user.contains("Resolved date (if any): 2025-08-17"));
        assert!(user.contains("Previous attempt was rejected: Error: Wrong metric."));
    }
}
