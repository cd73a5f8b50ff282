use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::guard::{is_answer_sql, starts_with_sql};
use crate::models::message::{ANSWER_MARKER, FAILURE_MARKER, FINAL_MARKER, Message};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeId {
    DiscoverTables,
    SelectRelevantTables,
    FetchSchema,
    InjectSchemaFacts,
    GenerateQuery,
    CheckQuery,
    ExecuteQuery,
    FormatAnswer,
    Narrate,
}

impl NodeId {
    pub const ENTRY: NodeId = NodeId::DiscoverTables;

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DiscoverTables => "discover_tables",
            Self::SelectRelevantTables => "select_relevant_tables",
            Self::FetchSchema => "fetch_schema",
            Self::InjectSchemaFacts => "inject_schema_facts",
            Self::GenerateQuery => "generate_query",
            Self::CheckQuery => "check_query",
            Self::ExecuteQuery => "execute_query",
            Self::FormatAnswer => "format_answer",
            Self::Narrate => "narrate",
        }
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of the last message, as seen by the conditional edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    ToolInvocation,
    SqlCandidate,
    Answer,
    Failure,
    Final,
    Other,
}

impl Signal {
    #[must_use]
    pub fn classify(message: Option<&Message>) -> Self {
        let Some(message) = message else {
            return Self::Other;
        };
        if message.is_tool_invocation() {
            return Self::ToolInvocation;
        }
        let content = message.trimmed_content();
        if is_answer_sql(content) || starts_with_sql(content) {
            Self::SqlCandidate
        } else if content.starts_with(ANSWER_MARKER) {
            Self::Answer
        } else if content.starts_with(FAILURE_MARKER) {
            Self::Failure
        } else if content.starts_with(FINAL_MARKER) {
            Self::Final
        } else {
            Self::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Goto(NodeId),
    End,
}

/// The full edge table of the agent graph.
#[must_use]
pub const fn next(node: NodeId, signal: Signal) -> Transition {
    use NodeId as N;
    use Transition::{End, Goto};

    match (node, signal) {
        (N::DiscoverTables, _) => Goto(N::SelectRelevantTables),
        (N::SelectRelevantTables, _) => Goto(N::FetchSchema),
        (N::FetchSchema, _) => Goto(N::InjectSchemaFacts),
        (N::InjectSchemaFacts, _) => Goto(N::GenerateQuery),

        (N::GenerateQuery, Signal::SqlCandidate) => Goto(N::CheckQuery),
        (N::GenerateQuery, Signal::Answer) => End,
        (N::GenerateQuery, Signal::Failure) => Goto(N::GenerateQuery),
        (N::GenerateQuery, _) => Goto(N::CheckQuery),

        (N::CheckQuery, Signal::ToolInvocation) => Goto(N::ExecuteQuery),
        (N::CheckQuery, _) => Goto(N::GenerateQuery),

        (N::ExecuteQuery, _) => Goto(N::FormatAnswer),

        (N::FormatAnswer, Signal::Failure) => Goto(N::GenerateQuery),
        (N::FormatAnswer, Signal::Answer) => Goto(N::Narrate),
        (N::FormatAnswer, _) => End,

        (N::Narrate, _) => End,
    }
}
