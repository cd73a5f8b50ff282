use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const FAILURE_MARKER: &str = "Error:";
pub const ANSWER_MARKER: &str = "Answer:";
pub const FINAL_MARKER: &str = "Final:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Human,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
    pub call_id: String,
}

impl ToolCall {
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: Value, call_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments,
            call_id: call_id.into(),
        }
    }

    #[must_use]
    pub fn string_argument(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Message {
    pub role: Role,
    pub content: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    #[must_use]
    pub fn human(content: impl Into<String>) -> Self {
        Self::plain(Role::Human, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    #[must_use]
    pub fn failure(detail: impl AsRef<str>) -> Self {
        Self::assistant(format!("{FAILURE_MARKER} {}", detail.as_ref()))
    }

    #[must_use]
    pub fn tool_invocation(call: ToolCall) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_calls: vec![call],
            tool_name: None,
            tool_call_id: None,
        }
    }

    #[must_use]
    pub fn tool_result(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_name: Some(tool_name.into()),
            tool_call_id: Some(call_id.into()),
        }
    }

    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_name: None,
            tool_call_id: None,
        }
    }

    #[must_use]
    pub fn trimmed_content(&self) -> &str {
        self.content.trim()
    }

    #[must_use]
    pub fn is_tool_invocation(&self) -> bool {
        self.role == Role::Assistant && !self.tool_calls.is_empty()
    }

    #[must_use]
    pub fn starts_with_marker(&self, marker: &str) -> bool {
        self.role == Role::Assistant && self.trimmed_content().starts_with(marker)
    }
}
