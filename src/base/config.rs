//! Load configuration via `config` crate with env-override support.

use std::{ops::Deref, sync::Arc};

use serde::Deserialize;

use crate::base::prompts;

use super::types::Res;

/// Default model for the generation backend.
fn default_openai_model() -> String {
    "gpt-4.1-mini".to_string()
}

/// Default max output tokens for the generation backend.
fn default_openai_max_tokens() -> u32 {
    1024
}

/// Default system directive for the generation backend.
fn default_system_directive() -> String {
    prompts::SYSTEM_DIRECTIVE.to_string()
}

/// Default number of prior messages included in a prompt.
fn default_history_limit() -> usize {
    5
}

fn default_db_namespace() -> String {
    "relay".to_string()
}

fn default_db_database() -> String {
    "bot".to_string()
}

/// Configuration for the relay-bot application.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ConfigInner {
    /// OpenAI (or compatible) API key (`OPENAI_API_KEY`).
    pub openai_api_key: String,
    /// Base URL of an OpenAI-compatible API, e.g. Groq (`OPENAI_API_BASE`).
    #[serde(default)]
    pub openai_api_base: Option<String>,
    /// Model to use for replies (`OPENAI_MODEL`).
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    /// Max output tokens for the model (`OPENAI_MAX_TOKENS`).
    #[serde(default = "default_openai_max_tokens")]
    pub openai_max_tokens: u32,
    /// Optional custom system directive to override the default (`SYSTEM_DIRECTIVE`).
    #[serde(default = "default_system_directive")]
    pub system_directive: String,
    /// Number of prior messages to include as context (`HISTORY_LIMIT`).
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Slack app token (`SLACK_APP_TOKEN`).
    pub slack_app_token: String,
    /// Slack bot token (`SLACK_BOT_TOKEN`).
    pub slack_bot_token: String,
    /// Database endpoint URL (`DB_ENDPOINT`); `mem://` runs an in-process store.
    pub db_endpoint: String,
    /// Database username (`DB_USERNAME`).
    #[serde(default)]
    pub db_username: String,
    /// Database password (`DB_PASSWORD`).
    #[serde(default)]
    pub db_password: String,
    /// Database namespace (`DB_NAMESPACE`).
    #[serde(default = "default_db_namespace")]
    pub db_namespace: String,
    /// Database name (`DB_DATABASE`).
    #[serde(default = "default_db_database")]
    pub db_database: String,
}

impl Config {
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let mut cfg = config::Config::builder().add_source(config::Environment::default().prefix("RELAY_BOT"));

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        let result = Config {
            inner: Arc::new(cfg.build()?.try_deserialize()?),
        };

        result.validate()?;

        Ok(result)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Res<()> {
        if self.openai_max_tokens < 1 || self.openai_max_tokens > 128000 {
            return Err(anyhow::anyhow!("OpenAI max tokens must be between 1 and 128000."));
        }

        if self.history_limit < 1 || self.history_limit > 100 {
            return Err(anyhow::anyhow!("History limit must be between 1 and 100."));
        }

        Ok(())
    }
}
