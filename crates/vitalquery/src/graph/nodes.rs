use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use super::prompts::{
    CHECK_PLACEHOLDER, GENERATION_STOP, QUERY_CHECK_SYSTEM, TABLE_SELECTION_SYSTEM,
    query_check_user, query_generation_system, query_generation_user, table_selection_user,
};
use super::routing::NodeId;
use super::schema_facts::{SCHEMA_FACTS_HEADER, SCHEMA_STRICT_TEXT};
use super::state::ConversationState;
use crate::error::AgentError;
use crate::format::format_answer;
use crate::guard::{SchemaGuard, dangerous_keyword, extract_sql, starts_with_sql};
use crate::intent::{Direction, asks_when, detect_extreme_direction};
use crate::llm::{ChatPrompt, LanguageModel, PromptPurpose, parse_json_reply};
use crate::models::message::{ANSWER_MARKER, FAILURE_MARKER, Message, ToolCall};
use crate::models::rows::{ToolPayload, parse_tool_result};
use crate::models::schema::{EVENT_TABLE, USERS_TABLE};
use crate::narrate::{NarrationInput, narrate};
use crate::normalize::{NormalizationInput, normalize_sql};
use crate::router::{Metric, RoutedMetric, route_metric};
use crate::sqlite::{QueryOutcome, SqlDatabase};
use crate::timeframe::ResolvedTimeContext;

pub const LIST_TABLES_TOOL: &str = "sql_db_list_tables";
pub const SCHEMA_TOOL: &str = "sql_db_schema";
pub const QUERY_TOOL: &str = "db_query_tool";

const NO_SQL_TO_CHECK: &str = "No valid SQL to check";

/// Words that always need the measurement table.
const EVENT_KEYWORDS: [&str; 10] = [
    "stress",
    "스트레스",
    "시간",
    "timestamp",
    "hrv",
    "ppg",
    "움직임",
    "위험",
    "흔들림",
    "넘어짐",
];

/// Question-derived facts computed once per turn and shared by every node.
pub(crate) struct Turn<'a> {
    model: &'a dyn LanguageModel,
    database: &'a dyn SqlDatabase,
    guard: &'a SchemaGuard,
    question: String,
    time: ResolvedTimeContext,
    direction: Option<Direction>,
    wants_when: bool,
    metric: Option<RoutedMetric>,
    issued_calls: usize,
}

impl<'a> Turn<'a> {
    pub(crate) fn new(
        model: &'a dyn LanguageModel,
        database: &'a dyn SqlDatabase,
        guard: &'a SchemaGuard,
        question: &str,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            model,
            database,
            guard,
            question: question.trim().to_string(),
            time: ResolvedTimeContext::resolve(question, now),
            direction: detect_extreme_direction(question),
            wants_when: asks_when(question),
            metric: None,
            issued_calls: 0,
        }
    }

    pub(crate) fn run_node(
        &mut self,
        node: NodeId,
        state: &ConversationState,
    ) -> Result<Vec<Message>, AgentError> {
        match node {
            NodeId::DiscoverTables => self.discover_tables(),
            NodeId::SelectRelevantTables => self.select_relevant_tables(state),
            NodeId::FetchSchema => self.fetch_schema(state),
            NodeId::InjectSchemaFacts => Ok(vec![Message::assistant(SCHEMA_STRICT_TEXT)]),
            NodeId::GenerateQuery => self.generate_query(state).map(|message| vec![message]),
            NodeId::CheckQuery => self.check_query(state).map(|message| vec![message]),
            NodeId::ExecuteQuery => Ok(vec![self.execute_query(state)]),
            NodeId::FormatAnswer => Ok(vec![self.format_answer(state)]),
            NodeId::Narrate => self.narrate(state).map(|message| vec![message]),
        }
    }

    fn next_call_id(&mut self, prefix: &str) -> String {
        self.issued_calls += 1;
        format!("{prefix}_{}", self.issued_calls)
    }

    fn complete(
        &self,
        node: NodeId,
        prompt: &ChatPrompt,
        stop: &[&str],
    ) -> Result<String, AgentError> {
        debug!(node = %node, purpose = %prompt.purpose, "ask: calling language model");
        self.model
            .complete(prompt, stop)
            .map_err(|error| AgentError::language_model(node.as_str(), &error))
    }

    fn routed_metric(&mut self, node: NodeId) -> Result<RoutedMetric, AgentError> {
        if let Some(routed) = self.metric {
            return Ok(routed);
        }
        let routed = route_metric(self.model, &self.question)
            .map_err(|error| AgentError::language_model(node.as_str(), &error))?;
        info!(metric = %routed.metric, source = ?routed.source, "ask: routed metric");
        self.metric = Some(routed);
        Ok(routed)
    }

    fn discover_tables(&mut self) -> Result<Vec<Message>, AgentError> {
        let call = ToolCall::new(LIST_TABLES_TOOL, json!({}), self.next_call_id("list_tables"));
        let tables = self
            .database
            .list_tables()
            .map_err(|error| AgentError::introspection(NodeId::DiscoverTables.as_str(), &error))?;
        let result = Message::tool_result(call.call_id.clone(), LIST_TABLES_TOOL, tables.join(", "));
        Ok(vec![Message::tool_invocation(call), result])
    }

    fn select_relevant_tables(
        &mut self,
        state: &ConversationState,
    ) -> Result<Vec<Message>, AgentError> {
        let available = state
            .last_tool_result(LIST_TABLES_TOOL)
            .map(|message| split_table_list(&message.content))
            .unwrap_or_default()
            .into_iter()
            .filter(|table| !table.eq_ignore_ascii_case("sqlite_sequence"))
            .collect::<Vec<_>>();

        let selected = if needs_event_tables(&self.question, &available) {
            vec![EVENT_TABLE.to_string(), USERS_TABLE.to_string()]
        } else {
            let prompt = ChatPrompt::new(
                PromptPurpose::TableSelection,
                TABLE_SELECTION_SYSTEM,
                table_selection_user(&self.question, &available),
            );
            let reply = self.complete(NodeId::SelectRelevantTables, &prompt, &[])?;
            select_known_tables(&reply, &available)
        };
        debug!(tables = ?selected, "ask: selected tables");

        let call = ToolCall::new(
            SCHEMA_TOOL,
            json!({ "table_names": selected.join(", ") }),
            self.next_call_id("get_schema"),
        );
        Ok(vec![Message::tool_invocation(call)])
    }

    fn fetch_schema(&self, state: &ConversationState) -> Result<Vec<Message>, AgentError> {
        let node = NodeId::FetchSchema.as_str();
        let call = state
            .last()
            .and_then(|message| message.tool_calls.first())
            .filter(|call| call.name == SCHEMA_TOOL)
            .ok_or_else(|| AgentError::Introspection {
                node,
                message: "no schema request to answer".to_string(),
            })?;
        let tables = split_table_list(call.string_argument("table_names").unwrap_or_default());
        let info = self
            .database
            .table_info(&tables)
            .map_err(|error| AgentError::introspection(node, &error))?;
        Ok(vec![Message::tool_result(
            call.call_id.clone(),
            SCHEMA_TOOL,
            info,
        )])
    }

    fn generate_query(&mut self, state: &ConversationState) -> Result<Message, AgentError> {
        let metric = self.routed_metric(NodeId::GenerateQuery)?.metric;
        let schema_facts = state
            .last_with_marker(SCHEMA_FACTS_HEADER)
            .map_or(SCHEMA_STRICT_TEXT, |message| message.content.as_str());
        let previous_failure = state
            .last()
            .filter(|message| message.starts_with_marker(FAILURE_MARKER))
            .map(Message::trimmed_content);

        let prompt = ChatPrompt::new(
            PromptPurpose::QueryGeneration,
            query_generation_system(metric, &self.time),
            query_generation_user(&self.question, schema_facts, &self.time, previous_failure),
        );
        let reply = self.complete(NodeId::GenerateQuery, &prompt, &GENERATION_STOP)?;
        let sql = extract_sql(&reply);
        if sql.is_empty() {
            return Ok(Message::failure(NO_SQL_TO_CHECK));
        }
        Ok(Message::assistant(sql))
    }

    fn check_query(&mut self, state: &ConversationState) -> Result<Message, AgentError> {
        let candidate = extract_sql(state.last().map_or("", Message::trimmed_content));
        if candidate.is_empty() || !starts_with_sql(&candidate) {
            return Ok(Message::failure(NO_SQL_TO_CHECK));
        }

        match self.guard.validate(&candidate) {
            Ok(report) => {
                for warning in &report.warnings {
                    warn!(%warning, "ask: schema guard warning");
                }
            }
            Err(violation) => {
                return Ok(Message::failure(format!(
                    "{violation}. {}",
                    self.guard.repair_hint()
                )));
            }
        }

        let metric = self.routed_metric(NodeId::CheckQuery)?.metric;
        if !references_metric(&candidate, metric) {
            return Ok(Message::failure(format!(
                "Wrong metric. Use {} for this question.",
                metric.qualified_column()
            )));
        }

        let checked = self.self_check(&candidate)?;
        let input = NormalizationInput {
            metric,
            direction: self.direction,
            wants_when: self.wants_when,
            has_time_intent: self.time.has_time_intent(),
        };
        let normalized = normalize_sql(&checked, &input);
        debug!(
            sql = %normalized.sql,
            applied = ?normalized.applied,
            "ask: normalized query"
        );

        if let Some(keyword) = dangerous_keyword(&normalized.sql) {
            warn!(%keyword, "ask: refused dangerous keyword");
            return Ok(Message::failure(format!(
                "Refusing to run potentially dangerous SQL: {}",
                normalized.sql
            )));
        }

        let call = ToolCall::new(
            QUERY_TOOL,
            json!({ "query": normalized.sql }),
            self.next_call_id("run_sql"),
        );
        Ok(Message::tool_invocation(call))
    }

    /// Asks the model to review the candidate. Anything that is not a usable
    /// query keeps the candidate unchanged.
    fn self_check(&self, candidate: &str) -> Result<String, AgentError> {
        #[derive(Deserialize)]
        struct CheckedSql {
            sql: String,
        }

        let prompt = ChatPrompt::new(
            PromptPurpose::QueryCheck,
            QUERY_CHECK_SYSTEM,
            query_check_user(&json!({ "sql": candidate }).to_string()),
        );
        let reply = self.complete(NodeId::CheckQuery, &prompt, &[])?;
        let checked = parse_json_reply::<CheckedSql>(&reply)
            .map(|checked| checked.sql.trim().to_string())
            .filter(|sql| {
                !sql.is_empty() && !sql.contains(CHECK_PLACEHOLDER) && starts_with_sql(sql)
            });
        match checked {
            Some(sql) => Ok(sql),
            None => {
                debug!("ask: self-check reply unusable, keeping candidate");
                Ok(candidate.to_string())
            }
        }
    }

    fn execute_query(&self, state: &ConversationState) -> Message {
        let Some(call) = state
            .last()
            .and_then(|message| message.tool_calls.first())
            .filter(|call| call.name == QUERY_TOOL)
        else {
            return Message::failure("No query to execute");
        };
        let query = call.string_argument("query").unwrap_or_default();
        let outcome = self.database.run_no_throw(query);
        if let QueryOutcome::Failed(message) = &outcome {
            warn!(%message, "ask: query execution failed");
        }
        Message::tool_result(call.call_id.clone(), QUERY_TOOL, outcome.into_tool_content())
    }

    fn format_answer(&self, state: &ConversationState) -> Message {
        let Some(result) = state.last_tool_result(QUERY_TOOL) else {
            return Message::failure("No query result to format");
        };
        match parse_tool_result(&result.content) {
            Ok(payload) => Message::assistant(format_answer(&payload, self.direction)),
            Err(error) if error.starts_with(FAILURE_MARKER) => Message::assistant(error),
            Err(error) => {
                Message::failure(error.get(FAILURE_MARKER.len()..).unwrap_or_default().trim())
            }
        }
    }

    fn narrate(&self, state: &ConversationState) -> Result<Message, AgentError> {
        let answer = state
            .last_with_marker(ANSWER_MARKER)
            .map(Message::trimmed_content);
        let rows = state
            .last_tool_result(QUERY_TOOL)
            .and_then(|message| match parse_tool_result(&message.content) {
                Ok(ToolPayload::Rows(rows)) => Some(rows),
                _ => None,
            });
        let input = NarrationInput {
            question: &self.question,
            answer,
            rows: rows.as_deref(),
        };
        debug!(
            node = %NodeId::Narrate,
            purpose = %PromptPurpose::Narration,
            "ask: calling language model"
        );
        let text = narrate(self.model, &input)
            .map_err(|error| AgentError::language_model(NodeId::Narrate.as_str(), &error))?;
        Ok(Message::assistant(text))
    }
}

fn split_table_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|table| !table.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn needs_event_tables(question: &str, available: &[String]) -> bool {
    let lowered = question.to_lowercase();
    EVENT_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
        && available.iter().any(|table| table == EVENT_TABLE)
        && available.iter().any(|table| table == USERS_TABLE)
}

/// Keeps the model's picks that exist, in order and without repeats. An
/// empty pick falls back to every available table.
#[must_use]
pub fn select_known_tables(reply: &str, available: &[String]) -> Vec<String> {
    let mut selected: Vec<String> = Vec::new();
    for table in split_table_list(reply) {
        if available.contains(&table) && !selected.contains(&table) {
            selected.push(table);
        }
    }
    if selected.is_empty() {
        available.to_vec()
    } else {
        selected
    }
}

/// Whether the query mentions `metric` as a bare or `e.`-qualified column.
#[must_use]
pub fn references_metric(sql: &str, metric: Metric) -> bool {
    static REGEXES: OnceLock<Vec<(Metric, Regex)>> = OnceLock::new();
    REGEXES
        .get_or_init(|| {
            Metric::ALL
                .into_iter()
                .map(|metric| {
                    let pattern = format!(r"(?i)\b(?:e\.)?{}\b", metric.column());
                    let regex = Regex::new(&pattern).expect("metric reference regex should compile");
                    (metric, regex)
                })
                .collect()
        })
        .iter()
        .find(|(candidate, _)| *candidate == metric)
        .is_some_and(|(_, regex)| regex.is_match(sql))
}
