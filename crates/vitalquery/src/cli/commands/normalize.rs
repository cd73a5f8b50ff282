use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::CommandContext;
use crate::guard::extract_sql;
use crate::models::CommandEnvelope;
use crate::normalize::{NormalizationInput, normalize_sql};
use crate::router::Metric;
use crate::utils::time::{Clock, SystemClock};

#[derive(Debug, Clone, Args)]
pub struct NormalizeArgs {
    #[arg(value_name = "SQL")]
    pub sql: String,

    #[arg(long, value_name = "METRIC")]
    pub metric: Metric,

    /// Question the intent flags are derived from.
    #[arg(long, value_name = "QUESTION")]
    pub question: Option<String>,
}

pub fn run(args: &NormalizeArgs, _context: &CommandContext) -> Result<()> {
    let envelope = normalize_envelope(args, &SystemClock);
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

#[must_use]
pub fn normalize_envelope(args: &NormalizeArgs, clock: &dyn Clock) -> CommandEnvelope {
    let question = args.question.as_deref().unwrap_or_default();
    let input = NormalizationInput::from_question(question, args.metric, clock.now());
    let candidate = extract_sql(&args.sql);
    let source = if candidate.is_empty() {
        args.sql.trim().to_string()
    } else {
        candidate
    };
    let normalized = normalize_sql(&source, &input);

    CommandEnvelope::ok(
        "normalize",
        json!({
            "input": source,
            "sql": normalized.sql,
            "applied": normalized.applied,
        }),
    )
    .with_meta("flags", json!(input))
}
