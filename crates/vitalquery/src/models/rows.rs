use std::fmt::{Display, Formatter};
use std::sync::OnceLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

pub type Row = Vec<Cell>;

impl Cell {
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(value) => Some(*value as f64),
            Self::Real(value) => Some(*value),
            Self::Null | Self::Text(_) => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_number(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Real(_))
    }

    /// True for `YYYY-MM-DD HH:MM:SS` text, the storage format of `event.timestamp`.
    #[must_use]
    pub fn is_timestamp(&self) -> bool {
        self.as_text().is_some_and(is_sql_timestamp)
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(value) => value.trim().is_empty(),
            Self::Integer(_) | Self::Real(_) => false,
        }
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

#[must_use]
pub fn is_sql_timestamp(value: &str) -> bool {
    sql_timestamp_regex().is_match(value)
}

fn sql_timestamp_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}\s+[0-9]{2}:[0-9]{2}:[0-9]{2}$")
            .expect("sql timestamp regex should compile")
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolPayload {
    Rows(Vec<Row>),
    Text(String),
}

/// Splits a `db_query_tool` message into an execution failure (the raw `Error:`
/// text) or its payload. Non-JSON payloads are passed through as text.
pub fn parse_tool_result(content: &str) -> Result<ToolPayload, String> {
    let text = content.trim();
    if text
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("error:"))
    {
        return Err(text.to_string());
    }

    match serde_json::from_str::<Vec<Row>>(text) {
        Ok(rows) => Ok(ToolPayload::Rows(rows)),
        Err(_) => Ok(ToolPayload::Text(text.to_string())),
    }
}

#[must_use]
pub fn encode_rows(rows: &[Row]) -> String {
    serde_json::to_string(rows)
        .unwrap_or_else(|error| format!("Error: failed to encode query rows: {error}"))
}
