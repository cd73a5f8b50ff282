use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::sync::OnceLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::models::schema::SchemaDescriptor;

/// How `qualifier.column` references with an unknown qualifier and an unknown
/// column are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AliasPolicy {
    #[default]
    Warn,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct GuardReport {
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaViolation {
    pub reason: String,
    pub unknown_references: Vec<String>,
}

impl Display for SchemaViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.reason)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SchemaGuard {
    schema: &'static SchemaDescriptor,
    alias_policy: AliasPolicy,
}

impl Default for SchemaGuard {
    fn default() -> Self {
        Self::new(SchemaDescriptor::protectee(), AliasPolicy::default())
    }
}

impl SchemaGuard {
    #[must_use]
    pub fn new(schema: &'static SchemaDescriptor, alias_policy: AliasPolicy) -> Self {
        Self {
            schema,
            alias_policy,
        }
    }

    #[must_use]
    pub fn schema(&self) -> &'static SchemaDescriptor {
        self.schema
    }

    pub fn validate(&self, sql: &str) -> Result<GuardReport, SchemaViolation> {
        if let Some(found) = mutating_statement_regex().find(sql) {
            return Err(SchemaViolation {
                reason: format!(
                    "DDL/DML not allowed ({})",
                    found.as_str().to_ascii_uppercase()
                ),
                unknown_references: Vec::new(),
            });
        }

        let mut unknown = BTreeSet::new();
        let mut possible_aliases = BTreeSet::new();
        for captures in qualified_column_regex().captures_iter(sql) {
            let qualifier = &captures[1];
            let column = &captures[2];
            match self.schema.resolve_qualifier(qualifier) {
                Some(table) if !table.has_column(column) => {
                    unknown.insert(format!("{qualifier}.{column}"));
                }
                Some(_) => {}
                None if self.schema.any_table_has_column(column) => {}
                None => {
                    possible_aliases.insert(format!("{qualifier}.{column} (alias?)"));
                }
            }
        }

        let mut report = GuardReport::default();
        match self.alias_policy {
            AliasPolicy::Warn => report.warnings.extend(possible_aliases),
            AliasPolicy::Reject => unknown.extend(possible_aliases),
        }

        if unknown.is_empty() {
            return Ok(report);
        }
        let unknown_references = unknown.into_iter().collect::<Vec<_>>();
        Err(SchemaViolation {
            reason: format!(
                "Unknown columns/tables: {}",
                unknown_references.join(", ")
            ),
            unknown_references,
        })
    }

    /// Retry hint appended to guard failures.
    #[must_use]
    pub fn repair_hint(&self) -> String {
        format!(
            "Use only tables/columns from {}. Join rule: {}. Use aliases e (event) and u (users).",
            self.schema.column_summary(),
            crate::models::schema::JOIN_RULE
        )
    }
}

fn mutating_statement_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?i)\b(create|insert|update|delete|drop|alter|truncate|attach|detach)\b")
            .expect("mutating statement regex should compile")
    })
}

fn qualified_column_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_]*)\b")
            .expect("qualified column regex should compile")
    })
}
