use anyhow::Result;

use crate::llm::{ChatPrompt, LanguageModel, PromptPurpose};
use crate::models::message::{ANSWER_MARKER, FINAL_MARKER};
use crate::models::rows::{Row, encode_rows};

pub const NO_RESULT_FINAL: &str = "Final: 조건에 맞는 결과가 없습니다.";

const ROWS_SUMMARY_LIMIT: usize = 800;

const NARRATION_SYSTEM_PROMPT: &str = "당신은 간결한 한국어 문장으로 답변을 정리하는 비서입니다.
규칙:
- 오직 제공된 '원 질문', '정답 문자열', 'rows 요약'만을 근거로 답하세요. 새로운 사실을 만들지 마세요.
- 질문에 '시각/시간/언제'가 포함되었는데 rows 안에 타임스탬프가 없으면, '최대/최소 값은 X이며 시각 정보는 결과에 포함되지 않았습니다'처럼 안전하게 표현하세요.
- rows가 (timestamp, value) 쌍이면 반드시 날짜와 시각(분까지)과 값을 함께 한 문장으로 자연스럽게 말하세요.
- 숫자만 있을 때는 '값'임을 명시하세요(예: '최대 스트레스 값은 91입니다').
- 타임스탬프(YYYY-MM-DD HH:MM:SS)는 한국어 표기로 바꿔도 됩니다(예: 2025년 8월 18일 17시 30분).
- 여러 항목이 열거된 경우 최대 3개까지만 언급하고, 나머지는 '외 N건'으로 축약하세요.
- 출력은 반드시 'Final: '로 시작하세요.";

#[derive(Debug, Clone, Copy)]
pub struct NarrationInput<'a> {
    pub question: &'a str,
    pub answer: Option<&'a str>,
    pub rows: Option<&'a [Row]>,
}

/// Rewrites the deterministic answer into two or three Korean sentences. The
/// result always starts with `Final:`.
pub fn narrate(model: &dyn LanguageModel, input: &NarrationInput<'_>) -> Result<String> {
    let Some(answer) = input.answer else {
        return Ok(NO_RESULT_FINAL.to_string());
    };

    let rows_summary = input
        .rows
        .map_or_else(|| "(없음)".to_string(), summarize_rows);
    let (has_timestamp, has_value) = input.rows.map_or((false, false), scan_rows);
    let user = format!(
        "원 질문:\n{}\n\n정답 문자열:\n{answer}\n\nrows 요약:\n{rows_summary}\n\
         타임스탬프_존재: {}\n숫자값_존재: {}\n\n\
         위 정보를 바탕으로 Final: 로 시작하는 두세 문장을 작성하세요.",
        input.question,
        yes_no(has_timestamp),
        yes_no(has_value),
    );

    let prompt = ChatPrompt::new(PromptPurpose::Narration, NARRATION_SYSTEM_PROMPT, user);
    let reply = model.complete(&prompt, &[])?;
    Ok(ensure_final_marker(reply.trim(), answer))
}

#[must_use]
pub fn ensure_final_marker(reply: &str, answer: &str) -> String {
    if reply.starts_with(FINAL_MARKER) {
        return reply.to_string();
    }
    if reply.is_empty() {
        let body = answer.strip_prefix(ANSWER_MARKER).unwrap_or(answer).trim();
        return format!("{FINAL_MARKER} {body}");
    }
    format!("{FINAL_MARKER} {reply}")
}

/// Rows as JSON, cut to 800 characters with a note on the original length.
#[must_use]
pub fn summarize_rows(rows: &[Row]) -> String {
    let encoded = encode_rows(rows);
    let total = encoded.chars().count();
    if total <= ROWS_SUMMARY_LIMIT {
        return encoded;
    }
    let head = encoded.chars().take(ROWS_SUMMARY_LIMIT).collect::<String>();
    format!("{head}...(총 {total}자 중 앞 {ROWS_SUMMARY_LIMIT}자만)")
}

/// Whether the first row looks like `(timestamp, ...)` and `(_, number, ...)`.
#[must_use]
pub fn scan_rows(rows: &[Row]) -> (bool, bool) {
    let Some(first) = rows.first() else {
        return (false, false);
    };
    let has_timestamp = first.first().is_some_and(|cell| cell.is_timestamp());
    let has_value = first.get(1).is_some_and(|cell| cell.is_number());
    (has_timestamp, has_value)
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "예" } else { "아니오" }
}
