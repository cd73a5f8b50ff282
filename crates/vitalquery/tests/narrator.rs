use std::sync::Mutex;

use anyhow::{Result, bail};
use vitalquery::llm::{ChatPrompt, LanguageModel, PromptPurpose};
use vitalquery::models::rows::Cell;
use vitalquery::narrate::{NO_RESULT_FINAL, NarrationInput, narrate};

struct EchoModel {
    reply: String,
    seen: Mutex<Vec<ChatPrompt>>,
}

impl EchoModel {
    fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn seen(&self) -> Vec<ChatPrompt> {
        self.seen.lock().expect("prompt log lock").clone()
    }
}

impl LanguageModel for EchoModel {
    fn complete(&self, prompt: &ChatPrompt, _stop: &[&str]) -> Result<String> {
        self.seen
            .lock()
            .expect("prompt log lock")
            .push(prompt.clone());
        Ok(self.reply.clone())
    }
}

struct DownModel;

impl LanguageModel for DownModel {
    fn complete(&self, _prompt: &ChatPrompt, _stop: &[&str]) -> Result<String> {
        bail!("connection refused")
    }
}

#[test]
fn missing_answer_skips_the_model() {
    let model = EchoModel::replying("Final: 무시됨");
    let input = NarrationInput {
        question: "박주연의 스트레스 최대값",
        answer: None,
        rows: None,
    };
    assert_eq!(
        narrate(&model, &input).expect("narration should succeed"),
        NO_RESULT_FINAL
    );
    assert!(model.seen().is_empty());
}

#[test]
fn prompt_carries_question_answer_and_row_flags() {
    let model = EchoModel::replying("  2025년 8월 17일 16시 35분에 스트레스 지수 99로 가장 높았습니다.  ");
    let rows = vec![vec![
        Cell::Text("2025-08-17 16:35:12".to_string()),
        Cell::Integer(99),
    ]];
    let input = NarrationInput {
        question: "박주연의 스트레스가 가장 높았던 때는?",
        answer: Some("Answer: 2025-08-17 16:35 (지수 99)"),
        rows: Some(&rows),
    };

    let narration = narrate(&model, &input).expect("narration should succeed");
    assert_eq!(
        narration,
        "Final: 2025년 8월 17일 16시 35분에 스트레스 지수 99로 가장 높았습니다."
    );

    let prompts = model.seen();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].purpose, PromptPurpose::Narration);
    assert!(prompts[0].system.contains("Final: "));
    let user = &prompts[0].user;
    assert!(user.contains("박주연의 스트레스가 가장 높았던 때는?"));
    assert!(user.contains("Answer: 2025-08-17 16:35 (지수 99)"));
    assert!(user.contains(r#"[["2025-08-17 16:35:12",99]]"#));
    assert!(user.contains("타임스탬프_존재: 예"));
    assert!(user.contains("숫자값_존재: 예"));
}

#[test]
fn answer_without_rows_reports_absent_flags() {
    let model = EchoModel::replying("Final: 평균 값은 80입니다.");
    let input = NarrationInput {
        question: "박주연 스트레스 평균",
        answer: Some("Answer: 80"),
        rows: None,
    };
    assert_eq!(
        narrate(&model, &input).expect("narration should succeed"),
        "Final: 평균 값은 80입니다."
    );
    let user = &model.seen()[0].user;
    assert!(user.contains("rows 요약:\n(없음)"));
    assert!(user.contains("타임스탬프_존재: 아니오"));
}

#[test]
fn blank_reply_falls_back_to_the_answer_text() {
    let model = EchoModel::replying("   ");
    let input = NarrationInput {
        question: "질문",
        answer: Some("Answer: 박주연 = 박해름 (평균 80)"),
        rows: None,
    };
    assert_eq!(
        narrate(&model, &input).expect("narration should succeed"),
        "Final: 박주연 = 박해름 (평균 80)"
    );
}

#[test]
fn model_errors_propagate() {
    let input = NarrationInput {
        question: "질문",
        answer: Some("Answer: 1"),
        rows: None,
    };
    let error = narrate(&DownModel, &input).expect_err("a down model should fail");
    assert!(error.to_string().contains("connection refused"));
}
