use anyhow::{Error, Result};
use clap::Args;
use serde_json::json;

use super::{CommandContext, EXIT_REJECTED};
use crate::guard::{SchemaGuard, extract_sql, validate_read_only_sql};
use crate::models::{CommandEnvelope, EnvelopeFailure, SchemaDescriptor};

#[derive(Debug, Clone, Args)]
pub struct ValidateArgs {
    #[arg(value_name = "SQL")]
    pub sql: String,
}

pub fn run(args: &ValidateArgs, context: &CommandContext) -> Result<()> {
    let guard = SchemaGuard::new(SchemaDescriptor::protectee(), context.config.agent.alias_policy);
    let envelope = verdict(&guard, &args.sql);
    if envelope.ok {
        println!("{}", serde_json::to_string_pretty(&envelope)?);
        Ok(())
    } else {
        Err(Error::new(EnvelopeFailure::new(envelope, EXIT_REJECTED)))
    }
}

/// Extracts the statement, then applies the schema guard and the executor's
/// read-only rules.
#[must_use]
pub fn verdict(guard: &SchemaGuard, raw: &str) -> CommandEnvelope {
    let sql = extract_sql(raw);
    if sql.is_empty() {
        return CommandEnvelope::error("validate", "no_sql", "No valid SQL to check");
    }

    let report = match guard.validate(&sql) {
        Ok(report) => report,
        Err(violation) => {
            return CommandEnvelope::error("validate", "schema_violation", violation.to_string())
                .with_error_details(json!({
                    "sql": sql,
                    "unknown_references": violation.unknown_references,
                    "hint": guard.repair_hint(),
                }));
        }
    };
    if let Err(violation) = validate_read_only_sql(&sql) {
        return CommandEnvelope::error("validate", "read_only_violation", violation.to_string())
            .with_error_details(json!({ "sql": sql }));
    }

    CommandEnvelope::ok("validate", json!({ "verdict": "ok", "sql": sql }))
        .with_warnings(report.warnings)
}

#[cfg(test)]
mod tests {
    use super::verdict;
    use crate::guard::SchemaGuard;

    #[test]
    fn unknown_column_is_rejected_with_details() {
        let envelope = verdict(&SchemaGuard::default(), "SELECT e.mood FROM event e");
        assert!(!envelope.ok);
        let error = envelope.error.expect("rejection should carry an error");
        assert_eq!(error.code, "schema_violation");
        assert!(error.message.contains("e.mood"));
    }

    #[test]
    fn multi_statement_is_rejected_after_guard() {
        let envelope = verdict(
            &SchemaGuard::default(),
            "SELECT e.stress FROM event e; SELECT u.name FROM users u",
        );
        let error = envelope.error.expect("multi statement should be rejected");
        assert_eq!(error.code, "read_only_violation");
    }

    #[test]
    fn valid_query_passes() {
        let envelope = verdict(
            &SchemaGuard::default(),
            "```sql\nSELECT MAX(e.stress) FROM event e\n```",
        );
        assert!(envelope.ok);
        assert_eq!(
            envelope.data.expect("ok verdict has data")["sql"],
            "SELECT MAX(e.stress) FROM event e"
        );
    }
}
