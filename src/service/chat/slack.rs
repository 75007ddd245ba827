//! Slack integration for relay-bot.
//!
//! This module connects to Slack in socket mode, turns `app_mention` push events into
//! [`MentionEvent`]s for the mention handler, and posts replies into threads.

use crate::{
    base::{
        config::Config,
        types::{Reply, Res, Void},
    },
    interaction::{self, mention::MentionEvent},
    runtime::Runtime,
    service::{db::DbClient, llm::LlmClient},
};
use async_trait::async_trait;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use slack_morphism::prelude::*;
use tracing::{info, instrument, warn};

use std::sync::Arc;

use super::{ChatClient, GenericChatClient};

// Type aliases.

type FullClient = slack_morphism::SlackClient<SlackClientHyperConnector<HttpsConnector<HttpConnector>>>;

// Extra methods on `ChatClient` applied by the slack implementation.

impl ChatClient {
    /// Creates a new Slack chat client.
    pub async fn slack(config: &Config, db: DbClient, llm: LlmClient) -> Res<Self> {
        let client = SlackChatClient::new(config, db, llm).await?;
        Ok(Self { inner: Arc::new(client) })
    }
}

impl From<SlackChatClient> for ChatClient {
    fn from(client: SlackChatClient) -> Self {
        Self { inner: Arc::new(client) }
    }
}

impl From<&SlackAppMentionEvent> for MentionEvent {
    fn from(event: &SlackAppMentionEvent) -> Self {
        Self {
            channel: Some(event.channel.0.clone()),
            user: Some(event.user.0.clone()),
            text: event.content.text.clone(),
            ts: Some(event.origin.ts.0.clone()),
        }
    }
}

// Structs.

/// User state for the slack socket client.
struct SlackUserState {
    runtime: Runtime,
}

/// Slack client implementation.
#[derive(Clone)]
struct SlackChatClient {
    pub app_token: SlackApiToken,
    pub bot_token: SlackApiToken,
    pub client: Arc<FullClient>,
    pub config: Config,
    pub db: DbClient,
    pub llm: LlmClient,
}

impl SlackChatClient {
    /// Create a new Slack chat client.
    ///
    /// The app token drives the socket-mode connection and the bot token drives Web API
    /// calls; there is no OAuth installation flow.
    #[instrument(name = "SlackChatClient::new", skip_all)]
    pub async fn new(config: &Config, db: DbClient, llm: LlmClient) -> Res<Self> {
        // Initialize tokens.

        let app_token = SlackApiToken::new(SlackApiTokenValue(config.slack_app_token.clone()));
        let bot_token = SlackApiToken::new(SlackApiTokenValue(config.slack_bot_token.clone()));

        // Initialize the Slack client.

        let https_connector = HttpsConnector::<HttpConnector>::builder().with_native_roots()?.https_only().enable_all_versions().build();
        let connector = SlackClientHyperConnector::with_connector(https_connector);
        let client = Arc::new(slack_morphism::SlackClient::new(connector));

        // Get the bot's user ID (this also verifies the bot token).

        let session = client.open_session(&bot_token);
        let bot_user = session.auth_test().await?;
        info!("Slack bot user ID: {}", bot_user.user_id.0);

        Ok(Self {
            app_token,
            bot_token,
            client,
            config: config.clone(),
            db,
            llm,
        })
    }
}

#[async_trait]
impl GenericChatClient for SlackChatClient {
    async fn start(&self) -> Void {
        // Initialize the socket mode listener.

        let socket_mode_callbacks = SlackSocketModeListenerCallbacks::new()
            .with_command_events(handle_command_event)
            .with_interaction_events(handle_interaction_event)
            .with_push_events(handle_push_event);

        // Initialize the socket mode listener environment.

        let listener_environment = Arc::new(SlackClientEventsListenerEnvironment::new(self.client.clone()).with_user_state(SlackUserState {
            runtime: Runtime {
                config: self.config.clone(),
                db: self.db.clone(),
                llm: self.llm.clone(),
                chat: ChatClient::from(self.clone()),
            },
        }));

        let socket_mode_listener = Arc::new(SlackClientSocketModeListener::new(
            &SlackClientSocketModeConfig::new(),
            listener_environment.clone(),
            socket_mode_callbacks,
        ));

        // Register an app token to listen for events,
        socket_mode_listener.listen_for(&self.app_token).await?;

        // Start WS connections calling Slack API to get WS url for the token,
        // and wait for Ctrl-C to shutdown.
        socket_mode_listener.serve().await;

        Ok(())
    }

    #[instrument(skip_all, fields(channel = %reply.channel_id, thread_ts = ?reply.thread_ts))]
    async fn send_reply(&self, reply: &Reply) -> Void {
        let message = SlackMessageContent::new().with_text(reply.text.clone());

        let mut request = SlackApiChatPostMessageRequest::new(SlackChannelId(reply.channel_id.clone()), message)
            .with_as_user(true)
            .with_link_names(true);

        if let Some(thread_ts) = &reply.thread_ts {
            request = request.with_thread_ts(SlackTs(thread_ts.clone()));
        }

        let session = self.client.open_session(&self.bot_token);

        let _ = session.chat_post_message(&request).await.map_err(|e| anyhow::anyhow!("Failed to send message: {}", e))?;

        Ok(())
    }
}

// Socket mode listener callbacks for Slack.

/// Handles command events from Slack.
async fn handle_command_event(
    event: SlackCommandEvent,
    _client: Arc<SlackHyperClient>,
    _states: SlackClientEventsUserState,
) -> Result<SlackCommandEventResponse, Box<dyn std::error::Error + Send + Sync>> {
    warn!("[COMMAND] {:#?}", event);
    Ok(SlackCommandEventResponse::new(
        SlackMessageContent::new().with_text("No app commands are currently supported. Mention me in a channel instead.".into()),
    ))
}

/// Handles interaction events from Slack.
async fn handle_interaction_event(event: SlackInteractionEvent, _client: Arc<SlackHyperClient>, _states: SlackClientEventsUserState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    warn!("[INTERACTION] {:#?}", event);
    Ok(())
}

/// Handles push events from Slack.
///
/// Only app mentions drive the relay; each one is handled on its own task.
#[instrument(skip_all)]
async fn handle_push_event(event_callback: SlackPushEventCallback, _client: Arc<SlackHyperClient>, states: SlackClientEventsUserState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let event = event_callback.event;
    let states = states.read().await;
    let user_state = states.get_user_state::<SlackUserState>().ok_or(anyhow::anyhow!("Failed to get user state"))?;

    match event {
        SlackEventCallbackBody::AppMention(slack_app_mention_event) => {
            info!("Received app mention event ...");

            interaction::mention::handle_mention(MentionEvent::from(&slack_app_mention_event), user_state.runtime.clone());
        }
        _ => {
            warn!("Received unhandled push event.")
        }
    }

    Ok(())
}

// Tests.
