use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::utils::time::{format_unix_ms, unix_timestamp_seconds};

pub const ENVELOPE_SCHEMA_VERSION: &str = "vitalquery.envelope.v1";

pub type EnvelopeMeta = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeError {
    pub code: String,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// JSON shape printed by `--json` commands, success or failure alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub ok: bool,
    pub command: String,
    pub generated_at_utc: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    pub meta: EnvelopeMeta,
    pub warnings: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<EnvelopeError>,
}

impl CommandEnvelope {
    #[must_use]
    pub fn ok(command: impl Into<String>, data: Value) -> Self {
        let mut envelope = Self::base(command, true);
        envelope.data = Some(data);
        envelope
    }

    #[must_use]
    pub fn error(
        command: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let mut envelope = Self::base(command, false);
        envelope.error = Some(EnvelopeError {
            code: code.into(),
            message: message.into(),
            details: None,
        });
        envelope
    }

    fn base(command: impl Into<String>, ok: bool) -> Self {
        let mut meta = EnvelopeMeta::new();
        meta.insert("schema_version".to_string(), json!(ENVELOPE_SCHEMA_VERSION));
        Self {
            ok,
            command: command.into(),
            generated_at_utc: format_unix_ms(unix_timestamp_seconds().saturating_mul(1_000)),
            data: None,
            meta,
            warnings: Vec::new(),
            error: None,
        }
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_warnings(mut self, warnings: impl IntoIterator<Item = String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    #[must_use]
    pub fn with_error_details(mut self, details: Value) -> Self {
        if let Some(error) = self.error.as_mut() {
            error.details = Some(details);
        }
        self
    }
}

/// Carries a failed envelope through `anyhow` so `main` can pick the exit
/// code and still print the JSON.
#[derive(Debug, Clone)]
pub struct EnvelopeFailure {
    envelope: CommandEnvelope,
    exit_code: i32,
}

impl EnvelopeFailure {
    #[must_use]
    pub fn new(envelope: CommandEnvelope, exit_code: i32) -> Self {
        Self {
            envelope,
            exit_code,
        }
    }

    #[must_use]
    pub fn envelope(&self) -> &CommandEnvelope {
        &self.envelope
    }

    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }
}

impl Display for EnvelopeFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(&self.envelope) {
            Ok(encoded) => f.write_str(&encoded),
            Err(_) => f.write_str("command envelope serialization failure"),
        }
    }
}

impl std::error::Error for EnvelopeFailure {}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{CommandEnvelope, ENVELOPE_SCHEMA_VERSION, EnvelopeFailure};

    #[test]
    fn error_envelope_carries_code_and_details() {
        let envelope = CommandEnvelope::error("validate", "schema_violation", "Unknown columns/tables: e.mood")
            .with_error_details(json!({ "unknown_references": ["e.mood"] }));
        let encoded = serde_json::to_value(&envelope).expect("envelope should serialize");

        assert_eq!(encoded["ok"], false);
        assert_eq!(encoded["meta"]["schema_version"], ENVELOPE_SCHEMA_VERSION);
        assert_eq!(encoded["error"]["details"]["unknown_references"][0], "e.mood");
        assert!(encoded.get("data").is_none());

        let failure = EnvelopeFailure::new(envelope, 2);
        assert!(failure.to_string().starts_with("{\"ok\":false"));
        assert_eq!(failure.exit_code(), 2);
    }
}
