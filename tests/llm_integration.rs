//! Integration tests against a live LiteLLM proxy.
//!
//! Run with: LITELLM_API_BASE=http://localhost:4000 LITELLM_API_KEY=key \
//!   cargo test --test llm_integration -- --ignored

use std::sync::Arc;

use convo_forge::llm::litellm::{GenerationRequest, LiteLlmClient, LlmProvider, Message};
use convo_forge::llm::{ChatModel, InteractionGenerator, InteractionKind, ModelParams};
use convo_forge::retry::RetryPolicy;
use convo_forge::LlmError;

fn create_test_client() -> LiteLlmClient {
    LiteLlmClient::from_env()
        .expect("LITELLM_API_BASE environment variable must be set for integration tests")
}

#[tokio::test]
#[ignore] // Run with: cargo test --test llm_integration -- --ignored
async fn test_simple_generation() {
    let client = create_test_client();

    let request = GenerationRequest::new(
        "gpt-4o-mini",
        vec![
            Message::system("You are a helpful assistant. Reply concisely."),
            Message::user("What is 2 + 2? Reply with just the number."),
        ],
    )
    .with_max_completion_tokens(10)
    .with_temperature(0.0);

    let response = client.generate(request).await;
    assert!(response.is_ok(), "Generation failed: {:?}", response.err());

    let response = response.expect("Should have response");
    let content = response
        .choices
        .first()
        .map(|c| c.message.content.as_str())
        .expect("Should have content");
    assert!(content.contains('4'), "Response should contain '4', got: {}", content);
    assert!(response.usage.total_tokens > 0, "Should have token usage");
}

#[tokio::test]
#[ignore]
async fn test_structured_interaction_generation() {
    let client: Arc<dyn LlmProvider> = Arc::new(create_test_client());
    let model = ChatModel::new(
        client,
        ModelParams::default().validate().expect("default params are valid"),
        RetryPolicy::default(),
    );
    let generator = InteractionGenerator::new(model, 2);

    let transcript = generator
        .generate(
            "Acme Bikes offers free repairs for the first year and ships within 3 days.",
            InteractionKind::CustomerSupport,
        )
        .await
        .expect("Generation should succeed");

    assert_eq!(transcript.matches("User: ").count(), 2);
    assert_eq!(transcript.matches("Agent: ").count(), 2);
}

#[tokio::test]
async fn test_unreachable_proxy_is_connection_error() {
    let client = LiteLlmClient::new(
        "http://127.0.0.1:1".to_string(),
        None,
        "gpt-4o-mini".to_string(),
    );
    let request = GenerationRequest::new("gpt-4o-mini", vec![Message::user("hi")]);

    match client.generate(request).await {
        Err(LlmError::Connection(_)) => {}
        other => panic!("expected connection error, got {:?}", other),
    }
}
