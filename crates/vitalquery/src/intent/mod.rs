use std::sync::OnceLock;

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm::{ChatPrompt, LanguageModel, PromptPurpose, parse_json_reply};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Max,
    Min,
}

impl Direction {
    #[must_use]
    pub const fn order_keyword(self) -> &'static str {
        match self {
            Self::Max => "DESC",
            Self::Min => "ASC",
        }
    }
}

/// Max wins when a question mentions both.
#[must_use]
pub fn detect_extreme_direction(question: &str) -> Option<Direction> {
    if max_regex().is_match(question) {
        Some(Direction::Max)
    } else if min_regex().is_match(question) {
        Some(Direction::Min)
    } else {
        None
    }
}

#[must_use]
pub fn asks_when(question: &str) -> bool {
    when_regex().is_match(question)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionIntent {
    DbQuery,
    Other,
}

#[derive(Debug, Deserialize)]
struct IntentReply {
    intent: QuestionIntent,
}

const INTENT_SYSTEM_PROMPT: &str = r#"You are a gatekeeper for a database Q&A endpoint.

This endpoint ONLY accepts questions that can be answered by querying a small SQLite DB
with tables: users(id, name), event(protectee_id -> users.id, timestamp, ppg_json, ppg_threat_detected, hrv, stress, imu_danger_level, latitude, longitude, zone_type, is_watch_connected).

Label the user's input as either:
- "db_query": if the intent is to retrieve/aggregate/filter something from these tables/columns (highest/lowest/average, latest time, count, list within date range, filter by user name, zone_type, watch connection, etc.)
- "other": greetings, chit-chat, general questions, non-database tasks, or requests without any retrievable target from this schema.

ALWAYS return pure JSON: {"intent": "db_query"} or {"intent": "other"}
Do not add explanations. No code fences.

Examples:
Q: "박해름의 스트레스가 가장 높았던 시각 알려줘" -> {"intent":"db_query"}
Q: "안녕?" -> {"intent":"other"}
Q: "요즘 날씨 어때?" -> {"intent":"other"}
Q: "박주연의 HRV 최저값과 시각" -> {"intent":"db_query"}
Q: "워치가 최근에 끊긴 시간" -> {"intent":"db_query"}
Q: "수학 문제 풀어줘" -> {"intent":"other"}"#;

/// Classifies `question` before the graph runs. Unparsable replies count as
/// [`QuestionIntent::Other`].
pub fn classify_intent(model: &dyn LanguageModel, question: &str) -> Result<QuestionIntent> {
    let prompt = ChatPrompt::new(
        PromptPurpose::IntentClassification,
        INTENT_SYSTEM_PROMPT,
        question,
    );
    let reply = model.complete(&prompt, &[])?;
    let intent = parse_json_reply::<IntentReply>(&reply)
        .map_or(QuestionIntent::Other, |parsed| parsed.intent);
    debug!(?intent, "intent: classified question");
    Ok(intent)
}

#[must_use]
pub fn guide_message(known_names: &[String]) -> String {
    let examples = match known_names {
        [] => "박주연".to_string(),
        names => names
            .iter()
            .take(3)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", "),
    };
    let first = known_names.first().map_or("박주연", String::as_str);
    format!(
        "이 기능은 보호대상자({examples})의 생체·위치 기록을 조회하는 질문에만 답할 수 있어요.\n\
         예) \"{first}의 어제 스트레스가 가장 높았던 시각은?\", \"{first}의 이번주 HRV 평균\""
    )
}

fn max_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?i)(가장\s*높|최대|최고|highest|max)").expect("max intent regex should compile")
    })
}

fn min_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?i)(가장\s*낮|최소|최저|lowest|min)").expect("min intent regex should compile")
    })
}

fn when_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(언제|시각|시간|몇\s*시|시점|때)").expect("when intent regex should compile")
    })
}

#[cfg(test)]
mod tests {
    use super::{Direction, asks_when, detect_extreme_direction, guide_message};

    #[test]
    fn detects_extreme_direction_in_korean_and_english() {
        assert_eq!(
            detect_extreme_direction("스트레스가 가장 높았던 시각"),
            Some(Direction::Max)
        );
        assert_eq!(detect_extreme_direction("HRV 최저값"), Some(Direction::Min));
        assert_eq!(detect_extreme_direction("lowest stress"), Some(Direction::Min));
        assert_eq!(detect_extreme_direction("이번주 HRV 평균"), None);
    }

    #[test]
    fn when_detection_covers_time_words() {
        assert!(asks_when("가장 높았던 시각은?"));
        assert!(asks_when("몇 시에 높았어?"));
        assert!(!asks_when("평균 스트레스"));
    }

    #[test]
    fn guide_lists_at_most_three_names() {
        let names = ["박주연", "박해름", "김하늘", "이도윤"].map(String::from);
        let message = guide_message(&names);
        assert!(message.contains("박주연, 박해름, 김하늘"));
        assert!(!message.contains("이도윤"));
    }
}
