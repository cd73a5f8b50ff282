use std::collections::HashSet;

use schemars::JsonSchema;
use serde::Serialize;
use thiserror::Error;

use crate::models::message::{ANSWER_MARKER, FINAL_MARKER, Message, Role};

pub const NO_ANSWER: &str = "응답 없음";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversationError {
    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("tool result is missing a call id")]
    MissingCallId,

    #[error("tool result references unknown call id `{call_id}`")]
    UnknownToolCall { call_id: String },
}

/// Append-only message log for one turn plus the number of node executions.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ConversationState {
    messages: Vec<Message>,
    steps: usize,

    #[serde(skip)]
    #[schemars(skip)]
    issued_call_ids: HashSet<String>,
}

impl ConversationState {
    pub fn new(question: &str) -> Result<Self, ConversationError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ConversationError::EmptyQuestion);
        }
        Ok(Self {
            messages: vec![Message::human(question)],
            steps: 0,
            issued_call_ids: HashSet::new(),
        })
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn steps(&self) -> usize {
        self.steps
    }

    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    #[must_use]
    pub fn question(&self) -> &str {
        self.messages
            .iter()
            .find(|message| message.role == Role::Human)
            .map_or("", |message| message.content.as_str())
    }

    pub(crate) fn record_step(&mut self) {
        self.steps += 1;
    }

    /// Appends a message. A tool result must answer a call issued earlier in
    /// this conversation.
    pub fn push(&mut self, message: Message) -> Result<(), ConversationError> {
        if message.role == Role::Tool {
            let call_id = message
                .tool_call_id
                .as_deref()
                .ok_or(ConversationError::MissingCallId)?;
            if !self.issued_call_ids.contains(call_id) {
                return Err(ConversationError::UnknownToolCall {
                    call_id: call_id.to_string(),
                });
            }
        }
        for call in &message.tool_calls {
            self.issued_call_ids.insert(call.call_id.clone());
        }
        self.messages.push(message);
        Ok(())
    }

    /// Most recent tool output produced by `tool_name`.
    #[must_use]
    pub fn last_tool_result(&self, tool_name: &str) -> Option<&Message> {
        self.messages.iter().rev().find(|message| {
            message.role == Role::Tool && message.tool_name.as_deref() == Some(tool_name)
        })
    }

    #[must_use]
    pub fn last_with_marker(&self, marker: &str) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.starts_with_marker(marker))
    }

    #[must_use]
    pub fn final_answer(&self) -> String {
        extract_final_answer(&self.messages)
    }
}

/// Text after the last `Final:` marker, else after the latest `Answer:`
/// marker, else a fixed placeholder.
#[must_use]
pub fn extract_final_answer(messages: &[Message]) -> String {
    let latest = |marker: &str| {
        messages
            .iter()
            .rev()
            .find(|message| message.starts_with_marker(marker))
            .map(|message| {
                message
                    .trimmed_content()
                    .trim_start_matches(marker)
                    .trim()
                    .to_string()
            })
    };
    latest(FINAL_MARKER)
        .or_else(|| latest(ANSWER_MARKER))
        .unwrap_or_else(|| NO_ANSWER.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ConversationError, ConversationState, NO_ANSWER, extract_final_answer};
    use crate::models::message::{Message, ToolCall};

    #[test]
    fn rejects_blank_question() {
        assert_eq!(
            ConversationState::new("   "),
            Err(ConversationError::EmptyQuestion)
        );
    }

    #[test]
    fn tool_results_must_answer_issued_calls() {
        let mut state = ConversationState::new("질문").expect("question should be accepted");
        let orphan = Message::tool_result("run_sql_9", "db_query_tool", "[]");
        assert_eq!(
            state.push(orphan.clone()),
            Err(ConversationError::UnknownToolCall {
                call_id: "run_sql_9".to_string()
            })
        );

        state
            .push(Message::tool_invocation(ToolCall::new(
                "db_query_tool",
                json!({"query": "SELECT 1"}),
                "run_sql_9",
            )))
            .expect("invocation should append");
        state.push(orphan).expect("answered call should append");
        assert_eq!(state.messages().len(), 3);
        assert!(state.last_tool_result("db_query_tool").is_some());
    }

    #[test]
    fn final_answer_prefers_final_then_answer() {
        let answer_only = vec![
            Message::human("q"),
            Message::assistant("Answer: 2025-08-17 16:35 (지수 99)"),
        ];
        assert_eq!(
            extract_final_answer(&answer_only),
            "2025-08-17 16:35 (지수 99)"
        );

        let mut with_final = answer_only.clone();
        with_final.push(Message::assistant("Final: 어제 16시 35분이 가장 높았습니다."));
        assert_eq!(
            extract_final_answer(&with_final),
            "어제 16시 35분이 가장 높았습니다."
        );

        assert_eq!(extract_final_answer(&[Message::human("q")]), NO_ANSWER);
    }
}
