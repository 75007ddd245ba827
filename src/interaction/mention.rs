//! Handling of @-mention events: the full pipeline from inbound event to threaded reply.
//!
//! Each stage contains its own failures:
//! - a storage write failure is logged and ignored,
//! - a history read failure degrades to an empty history,
//! - a generation failure becomes a fallback reply,
//! - a parse or emission failure is caught at the top and answered with a fallback reply.
//!
//! Every handled event therefore ends in exactly one reply, unless there is no channel to
//! address it to.

use serde::Deserialize;
use tracing::{Instrument, error, info, instrument, warn};

use crate::{
    base::{
        error::{ParseFailure, RelayError, fallback_reply},
        prompts,
        types::{Reply, Void},
    },
    runtime::Runtime,
};

/// A raw mention event, as delivered by the chat platform.
///
/// Every field is optional here; [`MentionEvent::parse`] decides what is required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MentionEvent {
    pub channel: Option<String>,
    pub user: Option<String>,
    pub text: Option<String>,
    pub ts: Option<String>,
}

/// A validated mention, with the addressing prefix stripped from its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    pub conversation_id: String,
    pub author_id: String,
    pub text: String,
    pub external_timestamp: String,
}

impl MentionEvent {
    /// Validate the event and extract the user's text.
    pub fn parse(&self) -> Result<Mention, ParseFailure> {
        let conversation_id = required(&self.channel, "channel")?;
        let author_id = required(&self.user, "user")?;
        let external_timestamp = required(&self.ts, "ts")?;
        let raw_text = self.text.as_deref().ok_or(ParseFailure::MissingField("text"))?;

        Ok(Mention {
            conversation_id: conversation_id.to_string(),
            author_id: author_id.to_string(),
            text: parse_mention_text(raw_text)?.to_string(),
            external_timestamp: external_timestamp.to_string(),
        })
    }
}

fn required<'a>(field: &'a Option<String>, name: &'static str) -> Result<&'a str, ParseFailure> {
    match field.as_deref() {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ParseFailure::MissingField(name)),
    }
}

/// Strip the leading address token (e.g. `<@U12345>`) from a mention's text.
///
/// Everything up to and including the first `>` is dropped and the remainder is trimmed.
/// The remainder may be empty.
pub fn parse_mention_text(raw: &str) -> Result<&str, ParseFailure> {
    raw.split_once('>').map(|(_, rest)| rest.trim()).ok_or(ParseFailure::MissingAddressDelimiter)
}

/// Handles a mention event on its own task.
///
/// Errors that survive the pipeline (i.e., nowhere to send a reply) are logged.
#[instrument(skip_all)]
pub fn handle_mention(event: MentionEvent, runtime: Runtime) {
    tokio::spawn(
        async move {
            // Process the event.
            let result = handle_mention_event(&event, &runtime).await;

            // Log any errors.
            if let Err(err) = &result {
                error!("Error while handling: {}", err);
            }
        }
        .in_current_span(),
    );
}

/// Runs the mention pipeline and emits exactly one reply.
///
/// Returns an error only when no reply could be delivered at all.
#[instrument(skip_all, fields(channel = ?event.channel, ts = ?event.ts))]
pub async fn handle_mention_event(event: &MentionEvent, runtime: &Runtime) -> Void {
    let channel_id = match event.channel.as_deref() {
        Some(channel_id) if !channel_id.is_empty() => channel_id.to_string(),
        _ => return Err(ParseFailure::MissingField("channel").into()),
    };

    let text = match compose_reply(event, runtime).await {
        Ok(text) => text,
        Err(err) => {
            error!(kind = err.kind(), "Failed to process mention: {}", err);
            fallback_reply(&err)
        }
    };

    let reply = Reply {
        channel_id,
        thread_ts: event.ts.clone().filter(|ts| !ts.is_empty()),
        text,
    };

    if let Err(err) = runtime.chat.send_reply(&reply).await {
        let err = RelayError::UnexpectedFailure(err.to_string());
        error!(kind = err.kind(), "Failed to emit reply: {}", err);

        let fallback = Reply { text: fallback_reply(&err), ..reply };
        runtime.chat.send_reply(&fallback).await?;
    }

    info!("Replied to mention.");

    Ok(())
}

/// Stages 1 through 5: parse, store, fetch, compose, and generate.
///
/// Only a parse failure is returned; the remaining stages degrade instead.
async fn compose_reply(event: &MentionEvent, runtime: &Runtime) -> Result<String, RelayError> {
    let mention = event.parse()?;

    // Recording is best-effort relative to replying.

    if let Err(err) = runtime
        .db
        .store_message(&mention.conversation_id, &mention.author_id, &mention.text, &mention.external_timestamp)
        .await
    {
        let err = RelayError::StorageUnavailable(err.to_string());
        warn!(kind = err.kind(), "Failed to store message: {}", err);
    }

    let history = match runtime.db.fetch_history(&mention.conversation_id, runtime.config.history_limit).await {
        Ok(history) => history,
        Err(err) => {
            let err = RelayError::StorageUnavailable(err.to_string());
            warn!(kind = err.kind(), "Failed to fetch history, continuing without it: {}", err);
            Vec::new()
        }
    };

    let prompt = prompts::build_prompt(&mention.text, &history);

    let generation = runtime.llm.generate(&prompt).await;

    if generation.is_recovered() {
        warn!(kind = "BackendFailure", "Replying with the generation fallback.");
    }

    Ok(generation.into_reply())
}

// Tests.
