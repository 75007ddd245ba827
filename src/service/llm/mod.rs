pub mod openai;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::base::{
    error::fallback_reply,
    types::{Res, SamplingConfig, Turn},
};

// Traits.

/// Generic LLM client trait that clients must implement.
///
/// This trait defines the single primitive the relay needs from a text-generation
/// backend: accept role-tagged turns, return text. Implementing this trait allows
/// different LLM providers to be used with the relay-bot.
#[async_trait]
pub trait GenericLlmClient: Send + Sync + 'static {
    /// Invoke the backend once with the given turns and sampling settings.
    ///
    /// Implementations may fail for any transport, auth, quota, or response-shape reason;
    /// callers go through [`LlmClient::generate`], which contains those failures.
    async fn invoke(&self, turns: &[Turn], sampling: &SamplingConfig) -> Res<String>;
}

// Types.

/// Outcome of a generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    /// The backend produced a reply.
    Completed(String),
    /// The backend failed; `cause` describes why.
    Recovered { cause: String },
}

impl Generation {
    pub fn is_recovered(&self) -> bool {
        matches!(self, Generation::Recovered { .. })
    }

    /// The user-facing text for this outcome.
    pub fn into_reply(self) -> String {
        match self {
            Generation::Completed(text) => text,
            Generation::Recovered { cause } => fallback_reply(cause),
        }
    }
}

// Structs.

/// LLM client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct LlmClient {
    inner: Arc<dyn GenericLlmClient>,
    system_directive: Arc<str>,
}

impl Deref for LlmClient {
    type Target = dyn GenericLlmClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl LlmClient {
    pub fn new(inner: Arc<dyn GenericLlmClient>, system_directive: &str) -> Self {
        Self {
            inner,
            system_directive: Arc::from(system_directive),
        }
    }

    /// Generate a reply to a composed prompt.
    ///
    /// Sends the system directive and the prompt as two turns with greedy decoding. This never
    /// fails: any backend error is returned as [`Generation::Recovered`] with its cause.
    #[instrument(skip_all)]
    pub async fn generate(&self, prompt: &str) -> Generation {
        let turns = [Turn::system(self.system_directive.as_ref()), Turn::user(prompt)];

        match self.inner.invoke(&turns, &SamplingConfig::DETERMINISTIC).await {
            Ok(text) => {
                info!("Generated a reply of {} characters.", text.len());
                Generation::Completed(text)
            }
            Err(err) => {
                warn!("Generation backend failed: {err:#}");
                Generation::Recovered { cause: err.to_string() }
            }
        }
    }
}

// Tests.
