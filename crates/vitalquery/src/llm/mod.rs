pub mod openai;

use std::fmt::{Display, Formatter};
use std::sync::OnceLock;

use anyhow::Result;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use openai::OpenAiCompatibleModel;

/// What a prompt is for. Adapters ignore it; scripted models dispatch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptPurpose {
    IntentClassification,
    TableSelection,
    MetricScoring,
    QueryGeneration,
    QueryCheck,
    Narration,
}

impl PromptPurpose {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IntentClassification => "intent_classification",
            Self::TableSelection => "table_selection",
            Self::MetricScoring => "metric_scoring",
            Self::QueryGeneration => "query_generation",
            Self::QueryCheck => "query_check",
            Self::Narration => "narration",
        }
    }
}

impl Display for PromptPurpose {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPrompt {
    pub purpose: PromptPurpose,
    pub system: String,
    pub user: String,
}

impl ChatPrompt {
    #[must_use]
    pub fn new(purpose: PromptPurpose, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            purpose,
            system: system.into(),
            user: user.into(),
        }
    }
}

pub trait LanguageModel: Send + Sync {
    /// Returns the raw completion text. `stop` sequences end generation early.
    fn complete(&self, prompt: &ChatPrompt, stop: &[&str]) -> Result<String>;
}

/// Cuts `text` at the earliest occurrence of any stop sequence.
#[must_use]
pub fn truncate_at_stop<'a>(text: &'a str, stop: &[&str]) -> &'a str {
    stop.iter()
        .filter(|sequence| !sequence.is_empty())
        .filter_map(|sequence| text.find(sequence))
        .min()
        .map_or(text, |end| &text[..end])
}

/// Strict JSON parse of the whole reply, then a lenient pass that drops code
/// fences and keeps the outermost `{...}` block.
#[must_use]
pub fn parse_json_reply<T: DeserializeOwned>(text: &str) -> Option<T> {
    serde_json::from_str::<T>(text.trim())
        .ok()
        .or_else(|| serde_json::from_str::<T>(&lenient_json_object(text)).ok())
}

#[must_use]
pub fn lenient_json_object(text: &str) -> String {
    let without_fences = code_fence_regex().replace_all(text.trim(), "");
    let cleaned = without_fences.trim();
    match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if start < end => cleaned[start..=end].to_string(),
        _ => cleaned.to_string(),
    }
}

fn code_fence_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?m)^```(?:json)?|```$").expect("code fence regex should compile")
    })
}
