use std::sync::Mutex;

use anyhow::Result;
use vitalquery::llm::{ChatPrompt, LanguageModel, PromptPurpose};
use vitalquery::router::{Metric, RouteSource, explicit_metric, parse_scores, route_metric};

struct FixedReply {
    reply: &'static str,
    calls: Mutex<Vec<PromptPurpose>>,
}

impl FixedReply {
    fn new(reply: &'static str) -> Self {
        Self {
            reply,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl LanguageModel for FixedReply {
    fn complete(&self, prompt: &ChatPrompt, _stop: &[&str]) -> Result<String> {
        self.calls
            .lock()
            .expect("call log lock")
            .push(prompt.purpose);
        Ok(self.reply.to_string())
    }
}

#[test]
fn named_hrv_routes_without_the_model() {
    let model = FixedReply::new(r#"{"metric": "stress"}"#);
    let routed = route_metric(&model, "박주연의 지난주 HRV 평균은?").expect("routing should succeed");
    assert_eq!(routed.metric, Metric::Hrv);
    assert_eq!(routed.metric.column(), "hrv");
    assert_eq!(routed.source, RouteSource::ExplicitName);
    assert!(model.calls.lock().expect("call log lock").is_empty());
}

#[test]
fn model_choice_is_used_for_unnamed_metrics() {
    let model = FixedReply::new(
        "```json\n{\"scores\": {\"imu_danger_level\": 90, \"stress\": 20, \"hrv\": 0, \"ppg_threat_detected\": 10}, \"metric\": \"imu_danger_level\"}\n```",
    );
    let routed = route_metric(&model, "어제 넘어질 뻔한 순간은 언제야?").expect("routing should succeed");
    assert_eq!(routed.metric, Metric::ImuDangerLevel);
    assert_eq!(routed.source, RouteSource::ModelChoice);
    assert_eq!(routed.scores.score(Metric::ImuDangerLevel), 90);
    assert_eq!(
        *model.calls.lock().expect("call log lock"),
        vec![PromptPurpose::MetricScoring]
    );
}

#[test]
fn unknown_metric_name_falls_back_to_highest_score() {
    let routed = parse_scores(
        r#"{"scores": {"imu_danger_level": 10, "stress": 30, "hrv": 80, "ppg_threat_detected": 80}, "metric": "mood"}"#,
    );
    assert_eq!(routed.metric, Metric::Hrv);
    assert_eq!(routed.source, RouteSource::ScoreArgmax);
}

#[test]
fn garbage_reply_picks_first_candidate() {
    let routed = parse_scores("I think it's stress.");
    assert_eq!(routed.metric, Metric::ImuDangerLevel);
    assert_eq!(routed.scores.score(Metric::Stress), 0);
}

#[test]
fn model_errors_propagate() {
    struct Broken;
    impl LanguageModel for Broken {
        fn complete(&self, _prompt: &ChatPrompt, _stop: &[&str]) -> Result<String> {
            anyhow::bail!("connection refused")
        }
    }
    let error = route_metric(&Broken, "스트레스가 가장 높았던 때").expect_err("error should surface");
    assert!(error.to_string().contains("connection refused"));
}

#[test]
fn english_words_containing_acronyms_are_not_explicit_names() {
    assert_eq!(explicit_metric("What was the maximum stress yesterday?"), None);
    assert_eq!(explicit_metric("minimum stress last week"), None);
    assert_eq!(explicit_metric("이번 주 maximum 스트레스"), None);
    assert_eq!(explicit_metric("upgrade the dashboard"), None);
}

#[test]
fn acronyms_next_to_hangul_still_route() {
    assert_eq!(explicit_metric("IMU 위험도"), Some(Metric::ImuDangerLevel));
    assert_eq!(explicit_metric("imu위험도가 가장 높았던 때"), Some(Metric::ImuDangerLevel));
    assert_eq!(explicit_metric("PPG가 위협을 감지한 시각"), Some(Metric::PpgThreatDetected));
    assert_eq!(explicit_metric("(hrv) 최저값"), Some(Metric::Hrv));
}

#[test]
fn maximum_stress_question_goes_through_scoring() {
    let model = FixedReply::new(r#"{"metric": "stress"}"#);
    let routed = route_metric(&model, "What was the maximum stress yesterday?")
        .expect("routing should succeed");
    assert_eq!(routed.metric, Metric::Stress);
    assert_eq!(routed.source, RouteSource::ModelChoice);
    assert_eq!(
        *model.calls.lock().expect("call log lock"),
        vec![PromptPurpose::MetricScoring]
    );
}
