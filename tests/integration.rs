#![cfg(test)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mockall::mock;
use relay_bot::{
    base::{
        config::{Config, ConfigInner},
        prompts::SYSTEM_DIRECTIVE,
        types::{MessageRecord, Reply, Res, SamplingConfig, Turn, Void},
    },
    interaction::mention::{MentionEvent, handle_mention, handle_mention_event},
    runtime::Runtime,
    service::{
        chat::{ChatClient, GenericChatClient},
        db::{DbClient, GenericDbClient},
        llm::{GenericLlmClient, LlmClient},
    },
};

// Mocks.

mock! {
    pub Chat {}

    #[async_trait]
    impl GenericChatClient for Chat {
        async fn start(&self) -> Void;
        async fn send_reply(&self, reply: &Reply) -> Void;
    }
}

mock! {
    pub Llm {}

    #[async_trait]
    impl GenericLlmClient for Llm {
        async fn invoke(&self, turns: &[Turn], sampling: &SamplingConfig) -> Res<String>;
    }
}

mock! {
    pub Db {}

    #[async_trait]
    impl GenericDbClient for Db {
        async fn insert_message(&self, record: &MessageRecord) -> Void;
        async fn find_recent_messages(&self, conversation_id: &str, limit: usize) -> Res<Vec<MessageRecord>>;
    }
}

type Sent = Arc<Mutex<Vec<Reply>>>;
type Prompts = Arc<Mutex<Vec<String>>>;

/// A chat client that records every reply it is asked to send.
fn get_recording_chat() -> (MockChat, Sent) {
    let sent: Sent = Arc::default();
    let sink = sent.clone();

    let mut mock = MockChat::new();
    mock.expect_send_reply().returning(move |reply| {
        sink.lock().unwrap().push(reply.clone());
        Ok(())
    });

    (mock, sent)
}

/// A backend that echoes a fixed reply and records every user prompt it receives.
fn get_recording_llm(reply: &'static str) -> (MockLlm, Prompts) {
    let prompts: Prompts = Arc::default();
    let sink = prompts.clone();

    let mut mock = MockLlm::new();
    mock.expect_invoke().returning(move |turns, _| {
        sink.lock().unwrap().push(turns[1].content.clone());
        Ok(reply.to_string())
    });

    (mock, prompts)
}

fn get_failing_llm(cause: &'static str) -> MockLlm {
    let mut mock = MockLlm::new();
    mock.expect_invoke().returning(move |_, _| Err(anyhow::anyhow!(cause)));
    mock
}

fn test_config(history_limit: usize) -> Config {
    Config {
        inner: Arc::new(ConfigInner {
            openai_api_key: "sk-test".to_string(),
            openai_model: "gpt-4.1-mini".to_string(),
            openai_max_tokens: 256,
            system_directive: SYSTEM_DIRECTIVE.to_string(),
            history_limit,
            slack_app_token: "xapp-test".to_string(),
            slack_bot_token: "xoxb-test".to_string(),
            db_endpoint: "mem://".to_string(),
            ..Default::default()
        }),
    }
}

fn runtime_with(db: DbClient, llm: MockLlm, chat: MockChat) -> Runtime {
    Runtime {
        config: test_config(5),
        db,
        llm: LlmClient::new(Arc::new(llm), SYSTEM_DIRECTIVE),
        chat: ChatClient::new(Arc::new(chat)),
    }
}

fn mention(channel: &str, text: &str, ts: &str) -> MentionEvent {
    serde_json::from_value(serde_json::json!({
        "type": "app_mention",
        "user": "U54321",
        "text": text,
        "ts": ts,
        "channel": channel,
        "event_ts": ts,
    }))
    .unwrap()
}

// Tests.

#[tokio::test]
async fn test_mention_replies_once_in_thread() {
    let db = DbClient::surreal_memory().await.unwrap();
    let (llm, _) = get_recording_llm("Here is some help.");
    let (chat, sent) = get_recording_chat();
    let runtime = runtime_with(db, llm, chat);

    handle_mention_event(&mention("C01TEST", "<@U12345> Help me with a test issue", "1234567890.123456"), &runtime)
        .await
        .unwrap();

    let sent = sent.lock().unwrap();
    assert_eq!(
        *sent,
        vec![Reply {
            channel_id: "C01TEST".to_string(),
            thread_ts: Some("1234567890.123456".to_string()),
            text: "Here is some help.".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_mention_is_stored_and_included_in_history() {
    let db = DbClient::surreal_memory().await.unwrap();
    db.store_message("C01TEST", "U11111", "earlier question", "1234567890.000001").await.unwrap();

    let (llm, prompts) = get_recording_llm("ok");
    let (chat, _) = get_recording_chat();
    let runtime = runtime_with(db.clone(), llm, chat);

    handle_mention_event(&mention("C01TEST", "<@U12345>  follow-up ", "1234567890.000002"), &runtime).await.unwrap();

    // The stripped text was recorded.
    let history = db.fetch_history("C01TEST", 5).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].text, "follow-up");
    assert_eq!(history[1].author_id, "U54321");

    // The prompt carried the chronological window plus the current message.
    let prompts = prompts.lock().unwrap();
    assert_eq!(
        prompts[0],
        "Previous conversation:\nUser: earlier question\nUser: follow-up\n\nCurrent message: follow-up\n\nPlease provide a helpful response to the current message, taking into account the context from previous messages if relevant."
    );
}

#[tokio::test]
async fn test_history_window_is_bounded_by_limit() {
    let db = DbClient::surreal_memory().await.unwrap();
    for i in 1..=7 {
        db.store_message("C01TEST", "U11111", &format!("m{i}"), &format!("1234567890.00000{i}")).await.unwrap();
    }

    let (llm, prompts) = get_recording_llm("ok");
    let (chat, _) = get_recording_chat();
    let runtime = runtime_with(db, llm, chat);

    handle_mention_event(&mention("C01TEST", "<@U12345> m8", "1234567890.000008"), &runtime).await.unwrap();

    let prompts = prompts.lock().unwrap();
    assert!(prompts[0].starts_with("Previous conversation:\nUser: m4\nUser: m5\nUser: m6\nUser: m7\nUser: m8\n\n"));
    assert!(!prompts[0].contains("User: m3"));
}

#[tokio::test]
async fn test_missing_delimiter_replies_with_error() {
    let mut db = MockDb::new();
    db.expect_insert_message().never();
    db.expect_find_recent_messages().never();

    let mut llm = MockLlm::new();
    llm.expect_invoke().never();

    let (chat, sent) = get_recording_chat();
    let runtime = runtime_with(DbClient::new(Arc::new(db)), llm, chat);

    let result = handle_mention_event(&mention("C01TEST", "no address here", "1234567890.123456"), &runtime).await;

    assert!(result.is_ok());

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].thread_ts.as_deref(), Some("1234567890.123456"));
    assert!(sent[0].text.starts_with("Sorry, I encountered an error:"));
}

#[tokio::test]
async fn test_missing_ts_replies_top_level() {
    let db = DbClient::surreal_memory().await.unwrap();
    let mut llm = MockLlm::new();
    llm.expect_invoke().never();
    let (chat, sent) = get_recording_chat();
    let runtime = runtime_with(db, llm, chat);

    let event = MentionEvent {
        channel: Some("C01TEST".to_string()),
        user: Some("U54321".to_string()),
        text: Some("<@U12345> hi".to_string()),
        ts: None,
    };

    handle_mention_event(&event, &runtime).await.unwrap();

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].thread_ts, None);
    assert_eq!(sent[0].text, "Sorry, I encountered an error: mention event is missing the `ts` field");
}

#[tokio::test]
async fn test_missing_channel_cannot_reply() {
    let db = DbClient::surreal_memory().await.unwrap();
    let mut llm = MockLlm::new();
    llm.expect_invoke().never();
    let mut chat = MockChat::new();
    chat.expect_send_reply().never();
    let runtime = runtime_with(db, llm, chat);

    let event = MentionEvent {
        channel: None,
        user: Some("U54321".to_string()),
        text: Some("<@U12345> hi".to_string()),
        ts: Some("1234567890.123456".to_string()),
    };

    assert!(handle_mention_event(&event, &runtime).await.is_err());
}

#[tokio::test]
async fn test_store_failure_still_replies() {
    let mut db = MockDb::new();
    db.expect_insert_message().times(1).returning(|_| Err(anyhow::anyhow!("connection refused")));
    db.expect_find_recent_messages()
        .withf(|conversation_id, limit| conversation_id.to_string() == "C01TEST" && *limit == 5)
        .times(1)
        .returning(|_, _| Ok(vec![]));

    let (llm, prompts) = get_recording_llm("still here");
    let (chat, sent) = get_recording_chat();
    let runtime = runtime_with(DbClient::new(Arc::new(db)), llm, chat);

    handle_mention_event(&mention("C01TEST", "<@U12345> hello", "1234567890.123456"), &runtime).await.unwrap();

    assert_eq!(prompts.lock().unwrap().len(), 1);

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, "still here");
}

#[tokio::test]
async fn test_history_failure_degrades_to_empty_history() {
    let mut db = MockDb::new();
    db.expect_insert_message().times(1).returning(|_| Ok(()));
    db.expect_find_recent_messages().times(1).returning(|_, _| Err(anyhow::anyhow!("query timed out")));

    let (llm, prompts) = get_recording_llm("fine");
    let (chat, sent) = get_recording_chat();
    let runtime = runtime_with(DbClient::new(Arc::new(db)), llm, chat);

    handle_mention_event(&mention("C01TEST", "<@U12345> hello", "1234567890.123456"), &runtime).await.unwrap();

    let prompts = prompts.lock().unwrap();
    assert!(prompts[0].starts_with("Previous conversation:\n\nCurrent message: hello\n\n"));
    assert_eq!(sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_backend_failure_replies_with_fallback() {
    let db = DbClient::surreal_memory().await.unwrap();
    let (chat, sent) = get_recording_chat();
    let runtime = runtime_with(db, get_failing_llm("rate limit exceeded"), chat);

    handle_mention_event(&mention("C01TEST", "<@U12345> hello", "1234567890.123456"), &runtime).await.unwrap();

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, "Sorry, I encountered an error: rate limit exceeded");
    assert_eq!(sent[0].thread_ts.as_deref(), Some("1234567890.123456"));
}

#[tokio::test]
async fn test_emission_failure_sends_fallback_once() {
    let db = DbClient::surreal_memory().await.unwrap();
    let (llm, _) = get_recording_llm("the answer");

    let attempts: Sent = Arc::default();
    let sink = attempts.clone();
    let mut chat = MockChat::new();
    chat.expect_send_reply().times(2).returning(move |reply| {
        let mut attempts = sink.lock().unwrap();
        attempts.push(reply.clone());
        if attempts.len() == 1 { Err(anyhow::anyhow!("invalid_thread_ts")) } else { Ok(()) }
    });

    let runtime = runtime_with(db, llm, chat);

    handle_mention_event(&mention("C01TEST", "<@U12345> hello", "1234567890.123456"), &runtime).await.unwrap();

    let attempts = attempts.lock().unwrap();
    assert_eq!(attempts[0].text, "the answer");
    assert!(attempts[1].text.starts_with("Sorry, I encountered an error:"));
    assert!(attempts[1].text.contains("invalid_thread_ts"));
    assert_eq!(attempts[1].channel_id, "C01TEST");
    assert_eq!(attempts[1].thread_ts.as_deref(), Some("1234567890.123456"));
}

#[tokio::test]
async fn test_emission_and_fallback_failure_returns_error() {
    let db = DbClient::surreal_memory().await.unwrap();
    let (llm, _) = get_recording_llm("the answer");

    let attempts: Sent = Arc::default();
    let sink = attempts.clone();
    let mut chat = MockChat::new();
    chat.expect_send_reply().times(2).returning(move |reply| {
        sink.lock().unwrap().push(reply.clone());
        Err(anyhow::anyhow!("channel_not_found"))
    });

    let runtime = runtime_with(db, llm, chat);

    let result = handle_mention_event(&mention("C01TEST", "<@U12345> hello", "1234567890.123456"), &runtime).await;

    assert!(result.is_err());

    let attempts = attempts.lock().unwrap();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].text, "the answer");
    assert!(attempts[1].text.contains("channel_not_found"));
}

#[tokio::test]
async fn test_duplicate_delivery_stores_two_records() {
    let db = DbClient::surreal_memory().await.unwrap();
    let (llm, _) = get_recording_llm("ok");
    let (chat, sent) = get_recording_chat();
    let runtime = runtime_with(db.clone(), llm, chat);

    let event = mention("C01TEST", "<@U12345> same thing", "1234567890.123456");
    handle_mention_event(&event, &runtime).await.unwrap();
    handle_mention_event(&event, &runtime).await.unwrap();

    assert_eq!(db.fetch_history("C01TEST", 5).await.unwrap().len(), 2);
    assert_eq!(sent.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_spawned_mentions_in_separate_channels_each_reply() {
    let db = DbClient::surreal_memory().await.unwrap();
    let (llm, _) = get_recording_llm("ok");
    let (chat, sent) = get_recording_chat();
    let runtime = runtime_with(db.clone(), llm, chat);

    handle_mention(mention("C05ISOLATION1", "<@U12345> backend topics", "1234567890.222222"), runtime.clone());
    handle_mention(mention("C05ISOLATION2", "<@U12345> frontend topics", "1234567890.222223"), runtime.clone());

    // Wait for both spawned handlers to finish.
    for _ in 0..100 {
        if sent.lock().unwrap().len() == 2 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    let mut channels = sent.lock().unwrap().iter().map(|r| r.channel_id.clone()).collect::<Vec<_>>();
    channels.sort();
    assert_eq!(channels, vec!["C05ISOLATION1".to_string(), "C05ISOLATION2".to_string()]);

    let first = db.fetch_history("C05ISOLATION1", 5).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].text, "backend topics");
}
