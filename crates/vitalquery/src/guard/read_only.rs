use std::fmt::{Display, Formatter};

use serde::Serialize;

use super::strip_trailing_semicolons;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ReadOnlyViolation {
    EmptyStatement,
    MultiStatement,
    MutatingStatement { detected_keyword: String },
    UnsupportedStatement { leading_keyword: String },
}

impl Display for ReadOnlyViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyStatement => f.write_str("SQL query is empty"),
            Self::MultiStatement => {
                f.write_str("Multi-statement SQL is not allowed; submit exactly one statement")
            }
            Self::MutatingStatement { detected_keyword } => {
                write!(f, "Mutating SQL keyword `{detected_keyword}` is not allowed")
            }
            Self::UnsupportedStatement { leading_keyword } => write!(
                f,
                "Only SELECT, WITH ... SELECT, and EXPLAIN ... SELECT statements are allowed (got `{leading_keyword}`)"
            ),
        }
    }
}

impl std::error::Error for ReadOnlyViolation {}

/// Executor-side check: one read-only statement, no mutating keyword anywhere.
pub fn validate_read_only_sql(raw_sql: &str) -> Result<(), ReadOnlyViolation> {
    let candidate = strip_trailing_semicolons(raw_sql);
    if candidate.is_empty() {
        return Err(ReadOnlyViolation::EmptyStatement);
    }
    if candidate.contains(';') {
        return Err(ReadOnlyViolation::MultiStatement);
    }

    let normalized = candidate.to_ascii_lowercase();
    if let Some(detected_keyword) = first_mutating_keyword(&normalized) {
        return Err(ReadOnlyViolation::MutatingStatement { detected_keyword });
    }

    let allowed = normalized.starts_with("select")
        || normalized.starts_with("with")
        || normalized.starts_with("explain select")
        || normalized.starts_with("explain query plan select");
    if !allowed {
        return Err(ReadOnlyViolation::UnsupportedStatement {
            leading_keyword: leading_keyword(&normalized),
        });
    }

    Ok(())
}

// `replace` is absent: REPLACE() is a string function in generated filters.
fn first_mutating_keyword(normalized_sql: &str) -> Option<String> {
    const MUTATING_KEYWORDS: &[&str] = &[
        "insert", "update", "delete", "create", "alter", "drop", "truncate", "attach", "detach",
        "pragma", "vacuum", "reindex", "begin", "commit", "rollback",
    ];

    sql_tokens(normalized_sql).find_map(|token| {
        MUTATING_KEYWORDS
            .contains(&token)
            .then_some(token.to_string())
    })
}

fn leading_keyword(normalized_sql: &str) -> String {
    sql_tokens(normalized_sql)
        .next()
        .unwrap_or("unknown")
        .to_string()
}

fn sql_tokens(normalized_sql: &str) -> impl Iterator<Item = &str> {
    normalized_sql
        .split(|ch: char| !ch.is_ascii_alphanumeric() && ch != '_')
        .filter(|token| !token.is_empty())
}
