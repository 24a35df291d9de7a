//! Chat model: one validated, retried, classified completion call.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DomainError, GenerationKind, LlmError};
use crate::metrics::{MetricsCollector, TokenUsage};
use crate::retry::{ClassifyingRetrier, ErrorTable, RetryPolicy};

use super::litellm::{GenerationRequest, LlmProvider, Message};

/// Models able to honour a JSON-schema response format.
pub const SUPPORTED_MODELS: [&str; 4] = [
    "gpt-4o",
    "gpt-4o-2024-08-06",
    "gpt-4o-mini",
    "gpt-4o-mini-2024-07-18",
];

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_COMPLETION_TOKENS: u32 = 1024;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Generation parameters fixed for a whole batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub model: String,
    pub max_completion_tokens: u32,
    pub temperature: f64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_completion_tokens: DEFAULT_MAX_COMPLETION_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl ModelParams {
    pub fn new(model: impl Into<String>, max_completion_tokens: u32, temperature: f64) -> Self {
        Self {
            model: model.into(),
            max_completion_tokens,
            temperature,
        }
    }

    /// Trims the model name and checks every field.
    pub fn validate(mut self) -> Result<Self, DomainError> {
        self.model = self.model.trim().to_string();
        if self.model.is_empty() {
            return Err(DomainError::validation("Model name cannot be empty."));
        }
        if !SUPPORTED_MODELS.contains(&self.model.as_str()) {
            return Err(DomainError::validation(format!(
                "Model '{}' is not supported, use one of: {}.",
                self.model,
                SUPPORTED_MODELS.join(", ")
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(DomainError::validation(
                "Temperature must be between 0.0 and 2.0.",
            ));
        }
        Ok(self)
    }
}

fn incomplete_reason(finish_reason: &str) -> &'static str {
    match finish_reason {
        "length" => "Model reached the specified token limit.",
        "content_filter" => "Model flagged the content as inappropriate.",
        _ => "Unknown reason returned by the generation service that left the response void.",
    }
}

fn has_status(err: &LlmError, code: u16) -> bool {
    err.status_code() == Some(code)
}

/// Classification of generation-service failures, most specific first.
pub fn generation_error_table() -> ErrorTable<LlmError> {
    ErrorTable::new("generation", |_| {
        DomainError::generation(
            GenerationKind::Other,
            "Some unexpected error occurred with the generation service.",
        )
    })
    .on(
        |e| matches!(e, LlmError::Connection(_)),
        |_| {
            DomainError::generation(
                GenerationKind::ConnectionFailure,
                "Connection failure with the generation service.",
            )
        },
    )
    .on(
        |e| matches!(e, LlmError::Timeout(_)),
        |_| {
            DomainError::generation(
                GenerationKind::Timeout,
                "Operation timed out with the generation service.",
            )
        },
    )
    .on(
        |e| has_status(e, 400),
        |_| {
            DomainError::generation(
                GenerationKind::BadRequest,
                "Bad request passed to the generation service.",
            )
        },
    )
    .on(
        |e| has_status(e, 401),
        |_| {
            DomainError::generation(
                GenerationKind::AuthFailure,
                "Generation service API key is invalid or expired, it needs to be replaced.",
            )
        },
    )
    .on(
        |e| has_status(e, 403),
        |_| {
            DomainError::generation(
                GenerationKind::PermissionDenied,
                "Generation service API key lacks permission for this request.",
            )
        },
    )
    .on(
        |e| has_status(e, 404),
        |e| {
            let detail = match e {
                LlmError::ApiError { message, .. } => message.as_str(),
                _ => "no details returned",
            };
            DomainError::generation(
                GenerationKind::NotFound,
                format!("This resource does not exist on the generation service: {}", detail),
            )
        },
    )
    .on(
        |e| has_status(e, 409),
        |_| {
            DomainError::generation(
                GenerationKind::Conflict,
                "Resource conflict occurred, try again later.",
            )
        },
    )
    .on(
        |e| has_status(e, 422),
        |_| {
            DomainError::generation(
                GenerationKind::UnprocessableEntity,
                "Generation service couldn't process the request.",
            )
        },
    )
    .on(
        |e| has_status(e, 429),
        |_| {
            DomainError::generation(
                GenerationKind::RateLimited,
                "Generation service is rate limited.",
            )
        },
    )
    .on(
        |e| e.status_code().is_some_and(|code| code >= 500),
        |_| {
            DomainError::generation(
                GenerationKind::InternalServerError,
                "Generation service is having internal issues.",
            )
        },
    )
    .on(
        |e| e.status_code().is_some(),
        |_| {
            DomainError::generation(
                GenerationKind::GenericApiStatus,
                "Unsuccessful response code returned by the generation service.",
            )
        },
    )
    .on(
        |e| matches!(e, LlmError::Incomplete { .. }),
        |e| {
            let reason = match e {
                LlmError::Incomplete { finish_reason } => incomplete_reason(finish_reason),
                _ => incomplete_reason(""),
            };
            DomainError::generation(GenerationKind::ResponseIncomplete, reason)
        },
    )
    .on(
        |e| matches!(e, LlmError::Refused(_)),
        |e| {
            let text = match e {
                LlmError::Refused(text) => text.as_str(),
                _ => "",
            };
            DomainError::generation(
                GenerationKind::ResponseRefused,
                format!("Model refused with: {}", text),
            )
        },
    )
}

fn is_transient(err: &LlmError) -> bool {
    matches!(err, LlmError::Connection(_)) || has_status(err, 422)
}

/// A provider bound to batch parameters and the generation retry policy.
#[derive(Clone)]
pub struct ChatModel {
    provider: Arc<dyn LlmProvider>,
    params: ModelParams,
    retrier: ClassifyingRetrier<LlmError>,
}

impl ChatModel {
    pub fn new(provider: Arc<dyn LlmProvider>, params: ModelParams, policy: RetryPolicy) -> Self {
        Self {
            provider,
            params,
            retrier: ClassifyingRetrier::new(generation_error_table(), policy).retry_on(is_transient),
        }
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    /// Sends `messages` and returns the content of the first choice.
    ///
    /// A choice that did not finish with `stop`, or that carries a refusal,
    /// is a failure even though the call itself succeeded.
    pub async fn invoke(
        &self,
        messages: &[Message],
        response_format: &Value,
    ) -> Result<String, DomainError> {
        self.retrier
            .run("generate_completion", || self.invoke_once(messages, response_format))
            .await
    }

    async fn invoke_once(
        &self,
        messages: &[Message],
        response_format: &Value,
    ) -> Result<String, LlmError> {
        let request = GenerationRequest::new(self.params.model.clone(), messages.to_vec())
            .with_temperature(self.params.temperature)
            .with_max_completion_tokens(self.params.max_completion_tokens)
            .with_response_format(response_format.clone());

        let started = Instant::now();
        let result = self.provider.generate(request).await;
        let latency = started.elapsed().as_secs_f64();
        let collector = MetricsCollector::new();

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                collector.record_llm_request(&self.params.model, false, latency, TokenUsage::default());
                return Err(err);
            }
        };

        let tokens = TokenUsage::new(
            response.usage.prompt_tokens as u64,
            response.usage.completion_tokens as u64,
        );
        collector.record_llm_request(&self.params.model, true, latency, tokens);
        tracing::info!(
            model = %self.params.model,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            total_tokens = response.usage.total_tokens,
            "Generation token usage"
        );

        let choice = response.choices.into_iter().next().ok_or(LlmError::EmptyResponse)?;

        if choice.finish_reason != "stop" {
            if !matches!(choice.finish_reason.as_str(), "length" | "content_filter") {
                tracing::error!(finish_reason = %choice.finish_reason, "Unknown finish reason");
            }
            return Err(LlmError::Incomplete {
                finish_reason: choice.finish_reason,
            });
        }

        if let Some(refusal) = choice.refusal {
            return Err(LlmError::Refused(refusal));
        }

        Ok(choice.message.content)
    }
}

impl std::fmt::Debug for ChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatModel")
            .field("params", &self.params)
            .field("retrier", &self.retrier)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::llm::litellm::{Choice, GenerationResponse, Usage};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    struct MockLlmProvider {
        responses: Mutex<Vec<Result<GenerationResponse, LlmError>>>,
        calls: Mutex<usize>,
    }

    impl MockLlmProvider {
        fn new(responses: Vec<Result<GenerationResponse, LlmError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl LlmProvider for MockLlmProvider {
        async fn generate(
            &self,
            _request: GenerationRequest,
        ) -> Result<GenerationResponse, LlmError> {
            *self.calls.lock().unwrap() += 1;
            self.responses.lock().unwrap().remove(0)
        }
    }

    fn response(content: &str, finish_reason: &str, refusal: Option<&str>) -> GenerationResponse {
        GenerationResponse {
            id: "resp".to_string(),
            model: DEFAULT_MODEL.to_string(),
            choices: vec![Choice {
                index: 0,
                message: Message::assistant(content),
                finish_reason: finish_reason.to_string(),
                refusal: refusal.map(String::from),
            }],
            usage: Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
        }
    }

    fn model(provider: Arc<MockLlmProvider>) -> ChatModel {
        ChatModel::new(
            provider,
            ModelParams::default(),
            RetryPolicy::new(2, Duration::from_millis(5)),
        )
    }

    #[test]
    fn test_model_params_validation() {
        let params = ModelParams::new("  gpt-4o  ", 256, 1.0).validate().unwrap();
        assert_eq!(params.model, "gpt-4o");

        let err = ModelParams::new("gpt-3.5-turbo", 256, 1.0).validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = ModelParams::new(" ", 256, 1.0).validate().unwrap_err();
        assert_eq!(err.message(), "Model name cannot be empty.");

        let err = ModelParams::new("gpt-4o", 256, 2.5).validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_table_status_mapping() {
        let table = generation_error_table();
        let api = |code| LlmError::ApiError {
            code,
            message: "detail".to_string(),
        };

        assert_eq!(
            table.classify(&api(401)).kind(),
            ErrorKind::Generation(GenerationKind::AuthFailure)
        );
        assert_eq!(
            table.classify(&api(503)).kind(),
            ErrorKind::Generation(GenerationKind::InternalServerError)
        );
        assert_eq!(
            table.classify(&api(418)).kind(),
            ErrorKind::Generation(GenerationKind::GenericApiStatus)
        );
        assert_eq!(
            table.classify(&LlmError::RateLimited("slow".into())).kind(),
            ErrorKind::Generation(GenerationKind::RateLimited)
        );
        assert!(table.classify(&api(404)).message().ends_with("detail"));
        assert_eq!(
            table.classify(&LlmError::ParseError("bad json".into())).kind(),
            ErrorKind::Generation(GenerationKind::Other)
        );
    }

    #[tokio::test]
    async fn test_invoke_returns_content() {
        let provider = Arc::new(MockLlmProvider::new(vec![Ok(response("{}", "stop", None))]));
        let content = model(provider.clone())
            .invoke(&[Message::user("hi")], &Value::Null)
            .await
            .unwrap();
        assert_eq!(content, "{}");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_length_finish_is_incomplete() {
        let provider = Arc::new(MockLlmProvider::new(vec![Ok(response("{", "length", None))]));
        let err = model(provider)
            .invoke(&[Message::user("hi")], &Value::Null)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Generation(GenerationKind::ResponseIncomplete));
        assert_eq!(err.message(), "Model reached the specified token limit.");
    }

    #[tokio::test]
    async fn test_refusal_is_reported() {
        let provider = Arc::new(MockLlmProvider::new(vec![Ok(response(
            "",
            "stop",
            Some("not allowed"),
        ))]));
        let err = model(provider)
            .invoke(&[Message::user("hi")], &Value::Null)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Generation(GenerationKind::ResponseRefused));
        assert_eq!(err.message(), "Model refused with: not allowed");
    }

    #[tokio::test]
    async fn test_connection_failure_is_retried() {
        let provider = Arc::new(MockLlmProvider::new(vec![
            Err(LlmError::Connection("reset".into())),
            Ok(response("{}", "stop", None)),
        ]));
        let content = model(provider.clone())
            .invoke(&[Message::user("hi")], &Value::Null)
            .await
            .unwrap();
        assert_eq!(content, "{}");
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let provider = Arc::new(MockLlmProvider::new(vec![Err(LlmError::ApiError {
            code: 401,
            message: "bad key".into(),
        })]));
        let err = model(provider.clone())
            .invoke(&[Message::user("hi")], &Value::Null)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Generation(GenerationKind::AuthFailure));
        assert_eq!(provider.calls(), 1);
    }
}
