pub mod extract;
pub mod read_only;
pub mod schema;

use std::sync::OnceLock;

use regex::Regex;

pub use extract::extract_sql;
pub use read_only::{ReadOnlyViolation, validate_read_only_sql};
pub use schema::{AliasPolicy, GuardReport, SchemaGuard, SchemaViolation};

/// True when `text` opens with SELECT, WITH, PRAGMA or EXPLAIN.
#[must_use]
pub fn starts_with_sql(text: &str) -> bool {
    sql_head_regex().is_match(text)
}

/// True for formatter-style output that is really a query (`Answer: SELECT ...`).
#[must_use]
pub fn is_answer_sql(text: &str) -> bool {
    answer_sql_regex().is_match(text)
}

/// Keywords refused after normalization even if the guard let them through.
#[must_use]
pub fn dangerous_keyword(sql: &str) -> Option<String> {
    dangerous_keyword_regex()
        .find(sql)
        .map(|found| found.as_str().to_ascii_uppercase())
}

#[must_use]
pub fn strip_trailing_semicolons(raw_sql: &str) -> &str {
    let mut candidate = raw_sql.trim();
    while let Some(stripped) = candidate.strip_suffix(';') {
        candidate = stripped.trim_end();
    }
    candidate
}

pub(crate) fn sql_head_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?is)^\s*(select|with|pragma|explain)\b").expect("sql head regex should compile")
    })
}

fn answer_sql_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?is)^\s*answer:\s*(select|with|pragma|explain)\b")
            .expect("answer sql regex should compile")
    })
}

fn dangerous_keyword_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?i)\b(drop|alter|truncate|attach|detach)\b")
            .expect("dangerous keyword regex should compile")
    })
}
