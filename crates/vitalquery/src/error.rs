use thiserror::Error;

use crate::graph::state::ConversationError;

/// Fatal outcomes of one agent turn. Recoverable problems never surface here;
/// they travel through the conversation as `Error:` messages.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(
        "Recursion limit of {limit} reached without hitting a stop condition (next node: {node})"
    )]
    RecursionLimit { limit: usize, node: &'static str },

    #[error("language model call failed in `{node}`: {message}")]
    LanguageModel { node: &'static str, message: String },

    #[error("database introspection failed in `{node}`: {message}")]
    Introspection { node: &'static str, message: String },

    #[error(transparent)]
    Conversation(#[from] ConversationError),

    #[error("no question was given")]
    MissingQuestion,
}

impl AgentError {
    pub(crate) fn language_model(node: &'static str, error: &anyhow::Error) -> Self {
        Self::LanguageModel {
            node,
            message: format!("{error:#}"),
        }
    }

    pub(crate) fn introspection(node: &'static str, error: &anyhow::Error) -> Self {
        Self::Introspection {
            node,
            message: format!("{error:#}"),
        }
    }

    #[must_use]
    pub fn is_recursion_limit(&self) -> bool {
        matches!(self, Self::RecursionLimit { .. })
    }
}
