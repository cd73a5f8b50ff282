use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use super::commands::{
    ask::AskArgs, normalize::NormalizeArgs, schema::SchemaArgs, validate::ValidateArgs,
};

#[derive(Debug, Parser)]
#[command(
    name = "vitalquery",
    version,
    about = "Guarded natural-language questions over protectee vital signs"
)]
pub struct Cli {
    #[command(flatten)]
    pub runtime: RuntimeArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct RuntimeArgs {
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Answer one question through the guarded agent.
    Ask(AskArgs),
    /// Check one SQL statement against the schema whitelist.
    Validate(ValidateArgs),
    /// Run the rewrite pipeline on one SQL statement.
    Normalize(NormalizeArgs),
    /// Print schema facts, live DDL or the transcript JSON schema.
    Schema(SchemaArgs),
}

impl Command {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ask(_) => "ask",
            Self::Validate(_) => "validate",
            Self::Normalize(_) => "normalize",
            Self::Schema(_) => "schema",
        }
    }
}
