//! Integration with OpenAI-compatible chat-completion services.
//!
//! The backend is called exactly once per request: there is no retry loop and no local
//! timeout, so whatever the HTTP client enforces is what applies. Any provider speaking
//! the OpenAI chat-completions protocol (OpenAI itself, Groq, a local gateway) can be
//! selected through `openai_api_base`.

use std::sync::Arc;

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs},
};
use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::base::{
    config::Config,
    types::{Res, Role, SamplingConfig, Turn},
};

use super::{GenericLlmClient, LlmClient};

// Extra methods on `LlmClient` applied by the openai implementation.

impl LlmClient {
    pub fn openai(config: &Config) -> Self {
        let client = OpenAiLlmClient::new(config);
        Self::new(Arc::new(client), &config.system_directive)
    }
}

// Specific implementations.

/// OpenAI LLM client implementation.
#[derive(Clone)]
pub struct OpenAiLlmClient {
    client: Client<OpenAIConfig>,
    model: String,
    max_tokens: u32,
}

impl OpenAiLlmClient {
    /// Create a new OpenAI LLM client.
    #[instrument(name = "OpenAiLlmClient::new", skip_all)]
    pub fn new(config: &Config) -> Self {
        let mut cfg = OpenAIConfig::new().with_api_key(config.openai_api_key.clone());

        if let Some(api_base) = &config.openai_api_base {
            cfg = cfg.with_api_base(api_base.clone());
        }

        Self {
            client: Client::with_config(cfg),
            model: config.openai_model.clone(),
            max_tokens: config.openai_max_tokens,
        }
    }
}

/// Convert role-tagged turns into chat-completion request messages.
fn build_messages(turns: &[Turn]) -> Res<Vec<ChatCompletionRequestMessage>> {
    turns
        .iter()
        .map(|turn| {
            let message = match turn.role {
                Role::System => ChatCompletionRequestSystemMessageArgs::default().content(turn.content.clone()).build()?.into(),
                Role::User => ChatCompletionRequestUserMessageArgs::default().content(turn.content.clone()).build()?.into(),
            };

            Ok(message)
        })
        .collect()
}

#[async_trait]
impl GenericLlmClient for OpenAiLlmClient {
    #[instrument(name = "OpenAiLlmClient::invoke", skip_all)]
    async fn invoke(&self, turns: &[Turn], sampling: &SamplingConfig) -> Res<String> {
        debug!("Invoking model `{}` with {} turns.", self.model, turns.len());

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(build_messages(turns)?)
            .temperature(sampling.temperature)
            .max_completion_tokens(self.max_tokens)
            .build()?;

        let response = self.client.chat().create(request).await?;

        let message = response.choices.into_iter().next().map(|choice| choice.message).ok_or_else(|| anyhow::anyhow!("Model returned no choices."))?;

        if let Some(refusal) = message.refusal {
            return Err(anyhow::anyhow!("Request refused: {refusal}"));
        }

        message.content.ok_or_else(|| anyhow::anyhow!("Model returned an empty message."))
    }
}

// Tests.
