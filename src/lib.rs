//! Library root for `relay-bot`.
//!
//! Relay-bot answers @-mentions in Slack channels. For every mention it:
//! - Records the message in the channel's history
//! - Builds a prompt from the most recent messages in that channel
//! - Asks an LLM for a reply, falling back to an apology on failure
//! - Posts the reply in the thread of the triggering message
//!
//! The bot integrates with Slack for chat, SurrealDB for storage,
//! and an OpenAI-compatible API for responses. Each service sits behind a
//! trait, so any of them can be swapped out (or faked in tests).

pub mod base;
pub mod interaction;
pub mod runtime;
pub mod service;

use base::{config::Config, types::Void};
use rustls::crypto;
use tracing::info;

/// Public async entry for the binary crate.
///
/// Sets up necessary services and starts the relay-bot runtime:
/// - Initializes the crypto provider
/// - Creates the runtime context with database, LLM, and chat clients
/// - Starts the main event loop for processing mentions
pub async fn start(config: Config) -> Void {
    info!("Starting relay-bot ...");

    // Start the crypto provider.
    crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("A rustls crypto provider was already installed."))?;

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config).await?;

    // Start the runtime.
    runtime.start().await?;

    Ok(())
}
