pub mod envelope;
pub mod message;
pub mod rows;
pub mod schema;

use serde_json::Value;

pub use envelope::{CommandEnvelope, ENVELOPE_SCHEMA_VERSION, EnvelopeFailure};
pub use message::{ANSWER_MARKER, FAILURE_MARKER, FINAL_MARKER, Message, Role, ToolCall};
pub use rows::{Cell, Row, ToolPayload};
pub use schema::SchemaDescriptor;

/// JSON schema of a transcript (`Vec<Message>`).
#[must_use]
pub fn transcript_json_schema() -> Value {
    serde_json::to_value(schemars::schema_for!(Vec<Message>))
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}
