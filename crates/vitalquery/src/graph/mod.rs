pub mod nodes;
pub mod prompts;
pub mod routing;
pub mod schema_facts;
pub mod state;
pub mod workflow;

pub use nodes::{LIST_TABLES_TOOL, QUERY_TOOL, SCHEMA_TOOL};
pub use routing::{NodeId, Signal, Transition, next};
pub use state::{ConversationError, ConversationState, NO_ANSWER, extract_final_answer};
pub use workflow::{DEFAULT_RECURSION_LIMIT, SqlAgent};
