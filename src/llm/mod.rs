//! LLM integration for convo-forge.
//!
//! Three layers:
//! - [`LiteLlmClient`] speaks the OpenAI-compatible wire protocol and reports
//!   native [`LlmError`](crate::error::LlmError)s.
//! - [`ChatModel`] binds a provider to the batch's [`ModelParams`], rejects
//!   truncated or refused completions, and retries and classifies failures.
//! - [`InteractionGenerator`] runs the multi-turn loop producing a transcript.
//!
//! ```ignore
//! use convo_forge::llm::{ChatModel, InteractionGenerator, InteractionKind, LiteLlmClient, ModelParams};
//! use convo_forge::retry::RetryPolicy;
//! use std::sync::Arc;
//!
//! let client = Arc::new(LiteLlmClient::from_env()?);
//! let model = ChatModel::new(client, ModelParams::default().validate()?, RetryPolicy::default());
//! let generator = InteractionGenerator::new(model, 5);
//! let transcript = generator.generate("Refunds take 5 days.", InteractionKind::CustomerSupport).await?;
//! ```

pub mod chat;
pub mod interactions;
pub mod litellm;

pub use chat::{generation_error_table, ChatModel, ModelParams, DEFAULT_MODEL, SUPPORTED_MODELS};
pub use interactions::{
    escape_source, system_prompt, Discussion, InteractionGenerator, InteractionKind,
    DEFAULT_MAX_INTERACTIONS,
};
pub use litellm::{
    Choice, GenerationRequest, GenerationResponse, LiteLlmClient, LlmProvider, Message, Usage,
};
