use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::OnceLock;

use anyhow::{Result, bail};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::llm::{ChatPrompt, LanguageModel, PromptPurpose, lenient_json_object};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    ImuDangerLevel,
    Stress,
    Hrv,
    PpgThreatDetected,
}

impl Metric {
    /// Fixed candidate order; also the tie-break order for argmax.
    pub const ALL: [Metric; 4] = [
        Metric::ImuDangerLevel,
        Metric::Stress,
        Metric::Hrv,
        Metric::PpgThreatDetected,
    ];

    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::ImuDangerLevel => "imu_danger_level",
            Self::Stress => "stress",
            Self::Hrv => "hrv",
            Self::PpgThreatDetected => "ppg_threat_detected",
        }
    }

    #[must_use]
    pub fn qualified_column(self) -> String {
        format!("e.{}", self.column())
    }
}

impl Display for Metric {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Metric {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        let normalized = normalized.strip_prefix("e.").unwrap_or(&normalized);
        match Self::ALL
            .into_iter()
            .find(|metric| metric.column() == normalized)
        {
            Some(metric) => Ok(metric),
            None => bail!(
                "unknown metric `{value}` (expected one of imu_danger_level, stress, hrv, ppg_threat_detected)"
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MetricScores {
    pub imu_danger_level: i64,
    pub stress: i64,
    pub hrv: i64,
    pub ppg_threat_detected: i64,
}

impl MetricScores {
    #[must_use]
    pub fn score(&self, metric: Metric) -> i64 {
        match metric {
            Metric::ImuDangerLevel => self.imu_danger_level,
            Metric::Stress => self.stress,
            Metric::Hrv => self.hrv,
            Metric::PpgThreatDetected => self.ppg_threat_detected,
        }
    }

    fn set(&mut self, metric: Metric, score: i64) {
        match metric {
            Metric::ImuDangerLevel => self.imu_danger_level = score,
            Metric::Stress => self.stress = score,
            Metric::Hrv => self.hrv = score,
            Metric::PpgThreatDetected => self.ppg_threat_detected = score,
        }
    }

    /// Highest score; earlier candidates win ties.
    #[must_use]
    pub fn argmax(&self) -> Metric {
        Metric::ALL
            .into_iter()
            .fold(Metric::ImuDangerLevel, |best, candidate| {
                if self.score(candidate) > self.score(best) {
                    candidate
                } else {
                    best
                }
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSource {
    ExplicitName,
    ModelChoice,
    ScoreArgmax,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoutedMetric {
    pub metric: Metric,
    pub scores: MetricScores,
    pub source: RouteSource,
}

const SCORING_SYSTEM_PROMPT: &str = r#"You are a strict semantic router for Korean analytics questions.
Score how relevant EACH metric is (0~100; integers) by MEANING (not keywords). Then pick exactly ONE best metric.

Canonical meanings:
- imu_danger_level: bodily movement/posture/balance instability; shaking/tremor; fall-risk (physical instability of the person's body)
- stress: psychological/physiological stress state (mental/physio burden; NOT a sensor signal)
- hrv: the HRV metric itself (variation of heartbeat intervals; a sensor-derived physiological metric)
- ppg_threat_detected: PPG-based biosignal overall threat percent (sensor-level anomaly score; a summary for biosignals)

Disambiguation (VERY IMPORTANT):
- If the subject of "instability(불안정)" is the person's movement/body/posture/balance, choose imu_danger_level.
- If the subject is the biosignal/sensor readings themselves (e.g. "생체신호/신호/센서 수치가 불안정/이상"), do NOT choose imu_danger_level.
  Prefer ppg_threat_detected as the overall biosignal threat; choose hrv ONLY when HRV is explicitly the target.
- If the question explicitly names a metric (stress/HRV/PPG/IMU), choose that metric.
- Resolve ties by these priorities (from generic to specific):
  biosignal-overall -> ppg_threat_detected; explicit HRV -> hrv; motion/body instability -> imu_danger_level; mental state -> stress.

Output ONLY compact JSON (no code fences, no extra text):
{"scores": {"imu_danger_level": <0-100>, "stress": <0-100>, "hrv": <0-100>, "ppg_threat_detected": <0-100>}, "metric": "<imu_danger_level|stress|hrv|ppg_threat_detected>"}"#;

/// Explicit acronyms route without the model: HRV, then PPG, then IMU. An
/// acronym only counts when no Latin letter touches it, so `maximum` is not
/// `imu` while `HRV가` is still `hrv`.
#[must_use]
pub fn explicit_metric(question: &str) -> Option<Metric> {
    explicit_patterns()
        .iter()
        .find(|(pattern, _)| pattern.is_match(question))
        .map(|(_, metric)| *metric)
}

pub fn route_metric(model: &dyn LanguageModel, question: &str) -> Result<RoutedMetric> {
    if let Some(metric) = explicit_metric(question) {
        debug!(metric = %metric, "router: explicit metric named in question");
        return Ok(RoutedMetric {
            metric,
            scores: MetricScores::default(),
            source: RouteSource::ExplicitName,
        });
    }

    let prompt = ChatPrompt::new(
        PromptPurpose::MetricScoring,
        SCORING_SYSTEM_PROMPT,
        format!("Question: {question}\nReturn JSON only."),
    );
    let reply = model.complete(&prompt, &[])?;
    let routed = parse_scores(&reply);
    debug!(metric = %routed.metric, source = ?routed.source, "router: scored metrics");
    Ok(routed)
}

/// Never fails: unparsable replies score every metric 0, so the first
/// candidate wins.
#[must_use]
pub fn parse_scores(reply: &str) -> RoutedMetric {
    let Ok(Value::Object(data)) = serde_json::from_str::<Value>(&lenient_json_object(reply)) else {
        return RoutedMetric {
            metric: Metric::ALL[0],
            scores: MetricScores::default(),
            source: RouteSource::ScoreArgmax,
        };
    };

    let mut scores = MetricScores::default();
    if let Some(Value::Object(raw_scores)) = data.get("scores") {
        for metric in Metric::ALL {
            let score = raw_scores.get(metric.column()).map_or(0, score_value);
            scores.set(metric, score);
        }
    }

    let named = data
        .get("metric")
        .and_then(Value::as_str)
        .and_then(|name| {
            Metric::ALL
                .into_iter()
                .find(|metric| metric.column() == name.trim())
        });

    match named {
        Some(metric) => RoutedMetric {
            metric,
            scores,
            source: RouteSource::ModelChoice,
        },
        None => RoutedMetric {
            metric: scores.argmax(),
            scores,
            source: RouteSource::ScoreArgmax,
        },
    }
}

fn score_value(value: &Value) -> i64 {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float.trunc() as i64))
            .unwrap_or(0),
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| text.trim().parse::<f64>().ok().map(|float| float.trunc() as i64))
            .unwrap_or(0),
        _ => 0,
    }
}

fn explicit_patterns() -> &'static [(Regex, Metric)] {
    static PATTERNS: OnceLock<Vec<(Regex, Metric)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"(?i)(?:^|[^a-z])hrv(?:[^a-z]|$)|심박\s*변이", Metric::Hrv),
            (r"(?i)(?:^|[^a-z])ppg(?:[^a-z]|$)", Metric::PpgThreatDetected),
            (r"(?i)(?:^|[^a-z])imu(?:[^a-z]|$)", Metric::ImuDangerLevel),
        ]
        .into_iter()
        .map(|(pattern, metric)| {
            (
                Regex::new(pattern).expect("explicit metric regex should compile"),
                metric,
            )
        })
        .collect()
    })
}
