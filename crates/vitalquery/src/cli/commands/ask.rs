use std::sync::Arc;

use anyhow::{Context, Error, Result};
use clap::Args;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use super::{CommandContext, EXIT_RECURSION_LIMIT};
use crate::error::AgentError;
use crate::graph::{ConversationState, SqlAgent};
use crate::guard::SchemaGuard;
use crate::intent::{QuestionIntent, classify_intent, guide_message};
use crate::llm::OpenAiCompatibleModel;
use crate::models::{CommandEnvelope, EnvelopeFailure, SchemaDescriptor};
use crate::sqlite::{SqliteDatabase, list_known_names};

const GUIDE_NAME_LIMIT: usize = 3;

#[derive(Debug, Clone, Args)]
pub struct AskArgs {
    #[arg(value_name = "QUESTION")]
    pub question: String,

    #[arg(long, value_name = "N")]
    pub recursion_limit: Option<usize>,

    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[arg(long, default_value_t = false)]
    pub no_intent_gate: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AskOutcome {
    pub intent: QuestionIntent,
    pub answer: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationState>,
}

/// Gates the question, then runs the agent when it is a database question.
pub fn answer_question(
    agent: &SqlAgent,
    question: &str,
    recursion_limit: usize,
    intent_gate: bool,
) -> Result<AskOutcome, AgentError> {
    if question.trim().is_empty() {
        return Err(AgentError::MissingQuestion);
    }
    if intent_gate {
        let intent = classify_intent(agent.model(), question)
            .map_err(|error| AgentError::language_model("intent_gate", &error))?;
        if intent == QuestionIntent::Other {
            info!("ask: question is not a database query, answering with guide");
            let names = list_known_names(agent.database(), GUIDE_NAME_LIMIT);
            return Ok(AskOutcome {
                intent,
                answer: guide_message(&names),
                conversation: None,
            });
        }
    }

    let state = agent.run(question, recursion_limit)?;
    Ok(AskOutcome {
        intent: QuestionIntent::DbQuery,
        answer: state.final_answer(),
        conversation: Some(state),
    })
}

pub fn run(args: &AskArgs, context: &CommandContext) -> Result<()> {
    let config = &context.config;
    let database_path = context.database_path()?;
    let database = SqliteDatabase::open_read_only(&database_path, config.database.row_cap)?;
    let model = OpenAiCompatibleModel::from_config(&config.llm)
        .context("failed to configure language model")?;
    let agent = SqlAgent::new(Arc::new(model), Arc::new(database)).with_guard(SchemaGuard::new(
        SchemaDescriptor::protectee(),
        config.agent.alias_policy,
    ));

    let recursion_limit = args.recursion_limit.unwrap_or(config.agent.recursion_limit);
    let intent_gate = config.agent.intent_gate && !args.no_intent_gate;
    info!(
        db = %database_path.display(),
        recursion_limit,
        intent_gate,
        "ask: start"
    );

    match answer_question(&agent, &args.question, recursion_limit, intent_gate) {
        Ok(outcome) if args.json => {
            let envelope = CommandEnvelope::ok("ask", json!(outcome))
                .with_meta("recursion_limit", json!(recursion_limit));
            println!("{}", serde_json::to_string_pretty(&envelope)?);
            Ok(())
        }
        Ok(outcome) => {
            println!("{}", outcome.answer);
            Ok(())
        }
        Err(error) if args.json => {
            let code = if error.is_recursion_limit() {
                "recursion_limit"
            } else {
                "agent_failed"
            };
            let exit_code = if error.is_recursion_limit() {
                EXIT_RECURSION_LIMIT
            } else {
                1
            };
            let envelope = CommandEnvelope::error("ask", code, error.to_string())
                .with_meta("recursion_limit", json!(recursion_limit));
            Err(Error::new(EnvelopeFailure::new(envelope, exit_code)))
        }
        Err(error) => Err(Error::new(error)),
    }
}
