pub mod ask;
pub mod normalize;
pub mod schema;
pub mod validate;

use std::path::PathBuf;

use anyhow::Result;

use crate::config::{AppConfig, RuntimePaths};

/// Exit code for answers the guard or validator refused.
pub const EXIT_REJECTED: i32 = 2;
/// Exit code for a turn that ran out of steps.
pub const EXIT_RECURSION_LIMIT: i32 = 3;

/// Resolved configuration shared by every subcommand.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config: AppConfig,
    pub paths: RuntimePaths,
}

impl CommandContext {
    pub fn database_path(&self) -> Result<PathBuf> {
        self.paths.resolve(&self.config.database.path)
    }
}
