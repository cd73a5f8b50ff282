#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod graph;
pub mod guard;
pub mod intent;
pub mod llm;
pub mod models;
pub mod narrate;
pub mod normalize;
pub mod router;
pub mod sqlite;
pub mod timeframe;
pub mod utils;

pub use cli::app::{Cli, Command};
pub use error::AgentError;
pub use graph::{ConversationState, SqlAgent};
