use anyhow::{Context, Result};
use clap::Args;

use super::CommandContext;
use crate::graph::schema_facts::SCHEMA_STRICT_TEXT;
use crate::models::transcript_json_schema;
use crate::sqlite::{SqlDatabase, SqliteDatabase};

#[derive(Debug, Clone, Args)]
pub struct SchemaArgs {
    /// Print DDL and sample rows from the configured database.
    #[arg(long, default_value_t = false)]
    pub introspect: bool,

    #[arg(long, default_value_t = false, conflicts_with = "introspect")]
    pub transcript_schema: bool,
}

pub fn run(args: &SchemaArgs, context: &CommandContext) -> Result<()> {
    if args.transcript_schema {
        println!("{}", serde_json::to_string_pretty(&transcript_json_schema())?);
        return Ok(());
    }
    if !args.introspect {
        print!("{SCHEMA_STRICT_TEXT}");
        return Ok(());
    }

    let database_path = context.database_path()?;
    let database =
        SqliteDatabase::open_read_only(&database_path, context.config.database.row_cap)?;
    let tables = database.list_tables()?;
    let info = database
        .table_info(&tables)
        .with_context(|| format!("failed to describe {}", database_path.display()))?;
    println!("{info}");
    Ok(())
}
