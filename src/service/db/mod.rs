use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::base::types::{MessageRecord, Res, Void};

pub mod surreal;

// Traits.

/// Generic database client trait that clients must implement.
///
/// These are the two driver primitives the message store needs: an append and a
/// recency query. Implementing this trait allows different database backends to be
/// used with the relay-bot.
#[async_trait]
pub trait GenericDbClient: Send + Sync + 'static {
    /// Appends a message record.
    ///
    /// Every call must produce a new record, even when an identical one already exists.
    async fn insert_message(&self, record: &MessageRecord) -> Void;

    /// Finds the `limit` most recent records for a conversation.
    ///
    /// Results are ordered by `external_timestamp` descending (most recent first).
    async fn find_recent_messages(&self, conversation_id: &str, limit: usize) -> Res<Vec<MessageRecord>>;
}

// Structs.

/// Database client for relay-bot.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct DbClient {
    /// The database client instance.
    inner: Arc<dyn GenericDbClient>,
}

impl Deref for DbClient {
    type Target = dyn GenericDbClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl DbClient {
    pub fn new(inner: Arc<dyn GenericDbClient>) -> Self {
        Self { inner }
    }

    /// Records one observed message.
    ///
    /// There is no deduplication: storing the same message twice yields two records.
    #[instrument(skip(self, text))]
    pub async fn store_message(&self, conversation_id: &str, author_id: &str, text: &str, external_timestamp: &str) -> Void {
        let record = MessageRecord::new(conversation_id, author_id, text, external_timestamp);

        self.insert_message(&record).await
    }

    /// Fetches the most recent `limit` messages for a conversation, oldest first.
    ///
    /// Returns an empty list when the conversation has no history.
    #[instrument(skip(self))]
    pub async fn fetch_history(&self, conversation_id: &str, limit: usize) -> Res<Vec<MessageRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut history = self.find_recent_messages(conversation_id, limit).await?;
        history.reverse();

        debug!("Fetched {} history messages.", history.len());

        Ok(history)
    }
}

// Tests.
