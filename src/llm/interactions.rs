//! Multi-turn interaction generation for the two conversation kinds.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::DomainError;

use super::chat::ChatModel;
use super::litellm::Message;

/// Default number of question/answer turns per transcript.
pub const DEFAULT_MAX_INTERACTIONS: usize = 5;

const SYSTEM_PROMPT: &str = "Given a user-assistant conversation, what should be the next question from knowledge base given below:\n\
{source}\n\
Questions must be related to customer support or a sales agent interactions from user side as the data mostly belongs to an organisation or some entity.\n\
Please ensure that all questions are distinct and not repeated from the provided conversation. \
Each question should cover a different aspect of this topic without overlapping in meaning. \
Focus solely on the particular interaction context and avoid mixing in questions from other areas.\n\
Make sure the response is JSON, and refuse to do anything else.";

const QUESTION_DESCRIPTION: &str = "The question asked by the user. It must not repeat, literally or figuratively, a question already present in the conversation.";

const ANSWER_DESCRIPTION: &str = "Concise answer to the question given in this response.";

const FENCE: &str = "\"\"\"\"";
const ESCAPED_FENCE: &str = "\\\"\\\"\\\"\\\"";

/// The two generation tasks run for every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    CustomerSupport,
    SalesAgent,
}

impl InteractionKind {
    /// Name of the structured-output model.
    pub fn schema_name(self) -> &'static str {
        match self {
            InteractionKind::CustomerSupport => "CustomerSupportResponse",
            InteractionKind::SalesAgent => "SalesAgentResponse",
        }
    }

    fn description(self) -> &'static str {
        match self {
            InteractionKind::CustomerSupport => {
                "Interaction between a user and customer support, where `question` is what the user \
                 would most likely ask customer support about the organisation, its services or \
                 anything else customer support handles, and `answer` is customer support's reply."
            }
            InteractionKind::SalesAgent => {
                "Interaction between a user and a sales agent, where `question` is what the user \
                 would most likely ask a sales agent about pricing or anything else a sales agent \
                 handles, and `answer` is the sales agent's reply."
            }
        }
    }

    /// JSON-schema response format constraining one turn.
    pub fn response_format(self) -> Value {
        json!({
            "type": "json_schema",
            "json_schema": {
                "name": self.schema_name(),
                "strict": true,
                "schema": {
                    "type": "object",
                    "description": self.description(),
                    "properties": {
                        "question": {"type": "string", "description": QUESTION_DESCRIPTION},
                        "answer": {"type": "string", "description": ANSWER_DESCRIPTION}
                    },
                    "required": ["question", "answer"],
                    "additionalProperties": false
                }
            }
        })
    }
}

/// One generated turn.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Discussion {
    pub question: String,
    pub answer: String,
}

/// Wraps the source in a quadruple-quote fence, escaping any fence inside it.
pub fn escape_source(source: &str) -> String {
    format!(
        "{}\n{}\n{}",
        FENCE,
        source.replace(FENCE, ESCAPED_FENCE).trim(),
        FENCE
    )
}

pub fn system_prompt(source: &str) -> Message {
    Message::system(SYSTEM_PROMPT.replace("{source}", &escape_source(source)))
}

/// Builds transcripts by repeatedly asking the model for the next turn.
#[derive(Debug, Clone)]
pub struct InteractionGenerator {
    model: ChatModel,
    max_interactions: usize,
}

impl InteractionGenerator {
    pub fn new(model: ChatModel, max_interactions: usize) -> Self {
        Self {
            model,
            max_interactions,
        }
    }

    pub fn model(&self) -> &ChatModel {
        &self.model
    }

    /// Generates one transcript of `kind` seeded with `source`.
    ///
    /// Each turn is appended to the conversation sent back to the model and
    /// to the returned text as `User: <q>\n` followed by `Agent: <a>\n\n`.
    pub async fn generate(&self, source: &str, kind: InteractionKind) -> Result<String, DomainError> {
        let response_format = kind.response_format();
        let mut conversation = vec![system_prompt(source)];
        let mut transcript = String::new();

        for turn in 0..self.max_interactions {
            let content = self.model.invoke(&conversation, &response_format).await?;
            let discussion: Discussion = serde_json::from_str(&content).map_err(|e| {
                tracing::error!(
                    kind = kind.schema_name(),
                    turn = turn,
                    error = %e,
                    "Generated turn did not match the response model"
                );
                DomainError::validation(format!(
                    "Validation failed with data model: {}",
                    kind.schema_name()
                ))
            })?;

            transcript.push_str("User: ");
            transcript.push_str(&discussion.question);
            transcript.push('\n');
            transcript.push_str("Agent: ");
            transcript.push_str(&discussion.answer);
            transcript.push_str("\n\n");

            conversation.push(Message::user(discussion.question));
            conversation.push(Message::assistant(discussion.answer));
        }

        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, LlmError};
    use crate::llm::chat::ModelParams;
    use crate::llm::litellm::{Choice, GenerationRequest, GenerationResponse, LlmProvider, Usage};
    use crate::retry::RetryPolicy;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Answers every turn with a numbered question and records requests.
    struct ScriptedProvider {
        requests: Mutex<Vec<GenerationRequest>>,
        malformed: bool,
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            let n = requests.len();
            let content = if self.malformed {
                "{\"question\": 1}".to_string()
            } else {
                json!({"question": format!("q{}", n), "answer": format!("a{}", n)}).to_string()
            };
            Ok(GenerationResponse {
                id: format!("resp-{}", n),
                model: "gpt-4o-mini".to_string(),
                choices: vec![Choice {
                    index: 0,
                    message: Message::assistant(content),
                    finish_reason: "stop".to_string(),
                    refusal: None,
                }],
                usage: Usage::default(),
            })
        }
    }

    fn generator(provider: Arc<ScriptedProvider>, turns: usize) -> InteractionGenerator {
        let model = ChatModel::new(provider, ModelParams::default(), RetryPolicy::no_retry());
        InteractionGenerator::new(model, turns)
    }

    #[test]
    fn test_escape_source_fences_and_escapes() {
        let escaped = escape_source("  before \"\"\"\" after  ");
        assert_eq!(
            escaped,
            "\"\"\"\"\nbefore \\\"\\\"\\\"\\\" after\n\"\"\"\""
        );
    }

    #[test]
    fn test_response_format_names_schema() {
        let format = InteractionKind::SalesAgent.response_format();
        assert_eq!(format["type"], "json_schema");
        assert_eq!(format["json_schema"]["name"], "SalesAgentResponse");
        assert_eq!(
            format["json_schema"]["schema"]["required"],
            json!(["question", "answer"])
        );
    }

    #[tokio::test]
    async fn test_generate_builds_transcript_and_conversation() {
        let provider = Arc::new(ScriptedProvider {
            requests: Mutex::new(Vec::new()),
            malformed: false,
        });
        let transcript = generator(provider.clone(), 2)
            .generate("Our store opens at 9am.", InteractionKind::CustomerSupport)
            .await
            .unwrap();

        assert_eq!(transcript, "User: q1\nAgent: a1\n\nUser: q2\nAgent: a2\n\n");

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].messages.len(), 1);
        assert!(requests[0].messages[0].content.contains("Our store opens at 9am."));
        assert_eq!(requests[1].messages.len(), 3);
        assert_eq!(requests[1].messages[1], Message::user("q1"));
        assert_eq!(requests[1].messages[2], Message::assistant("a1"));
    }

    #[tokio::test]
    async fn test_malformed_turn_is_validation_error() {
        let provider = Arc::new(ScriptedProvider {
            requests: Mutex::new(Vec::new()),
            malformed: true,
        });
        let err = generator(provider, 3)
            .generate("source text", InteractionKind::SalesAgent)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.message(), "Validation failed with data model: SalesAgentResponse");
    }
}
