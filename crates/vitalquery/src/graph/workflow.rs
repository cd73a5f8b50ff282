use std::sync::Arc;

use tracing::{info, warn};

use super::nodes::Turn;
use super::routing::{NodeId, Signal, Transition, next};
use super::state::ConversationState;
use crate::error::AgentError;
use crate::guard::SchemaGuard;
use crate::llm::LanguageModel;
use crate::sqlite::SqlDatabase;
use crate::utils::time::{Clock, SystemClock};

pub const DEFAULT_RECURSION_LIMIT: usize = 30;

/// One NL-to-SQL agent. Handles are shared and immutable, so a single agent
/// can serve concurrent turns.
#[derive(Clone)]
pub struct SqlAgent {
    model: Arc<dyn LanguageModel>,
    database: Arc<dyn SqlDatabase>,
    clock: Arc<dyn Clock>,
    guard: SchemaGuard,
}

impl std::fmt::Debug for SqlAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlAgent")
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}

impl SqlAgent {
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>, database: Arc<dyn SqlDatabase>) -> Self {
        Self {
            model,
            database,
            clock: Arc::new(SystemClock),
            guard: SchemaGuard::default(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_guard(mut self, guard: SchemaGuard) -> Self {
        self.guard = guard;
        self
    }

    #[must_use]
    pub fn model(&self) -> &dyn LanguageModel {
        self.model.as_ref()
    }

    #[must_use]
    pub fn database(&self) -> &dyn SqlDatabase {
        self.database.as_ref()
    }

    /// Runs one turn to completion. Every node execution counts as one step;
    /// running out of steps before the graph ends is fatal.
    pub fn run(
        &self,
        question: &str,
        recursion_limit: usize,
    ) -> Result<ConversationState, AgentError> {
        if question.trim().is_empty() {
            return Err(AgentError::MissingQuestion);
        }
        let mut state = ConversationState::new(question)?;
        let mut turn = Turn::new(
            self.model.as_ref(),
            self.database.as_ref(),
            &self.guard,
            question,
            self.clock.now(),
        );

        let mut node = NodeId::ENTRY;
        loop {
            if state.steps() >= recursion_limit {
                warn!(limit = recursion_limit, node = %node, "ask: recursion limit reached");
                return Err(AgentError::RecursionLimit {
                    limit: recursion_limit,
                    node: node.as_str(),
                });
            }
            state.record_step();
            info!(node = %node, step = state.steps(), "ask: stage {node} step={}", state.steps());

            for message in turn.run_node(node, &state)? {
                state.push(message)?;
            }

            let signal = Signal::classify(state.last());
            if signal == Signal::Failure {
                let detail = state.last().map_or("", |message| message.trimmed_content());
                warn!(node = %node, failure = %detail, "ask: recoverable failure");
            }
            match next(node, signal) {
                Transition::Goto(following) => node = following,
                Transition::End => {
                    info!(steps = state.steps(), "ask: finished");
                    return Ok(state);
                }
            }
        }
    }
}
