//! SurrealDB implementation for relay-bot message storage.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::{
    Surreal,
    engine::any::{self, Any},
    opt::auth::Root,
};
use tracing::{info, instrument};

use crate::base::{
    config::Config,
    types::{MessageRecord, Res, Void},
};

use super::{DbClient, GenericDbClient};

// Extra methods on `DbClient` applied by the surreal implementation.

impl DbClient {
    /// Connects to the database named by the configuration.
    pub async fn surreal(config: &Config) -> Res<Self> {
        let client = SurrealDbClient::new(config).await?;
        Ok(Self { inner: Arc::new(client) })
    }

    /// Creates a fresh in-process database, for local runs and tests.
    pub async fn surreal_memory() -> Res<Self> {
        let client = SurrealDbClient::memory().await?;
        Ok(Self { inner: Arc::new(client) })
    }
}

// Structs.

/// Row shape of the `message` table.
///
/// `recorded_at` is stored as an RFC 3339 string so the table has a single, explicit schema.
#[derive(Debug, Serialize, Deserialize)]
struct MessageRow {
    conversation_id: String,
    author_id: String,
    text: String,
    external_timestamp: String,
    recorded_at: String,
}

impl From<&MessageRecord> for MessageRow {
    fn from(record: &MessageRecord) -> Self {
        Self {
            conversation_id: record.conversation_id.clone(),
            author_id: record.author_id.clone(),
            text: record.text.clone(),
            external_timestamp: record.external_timestamp.clone(),
            recorded_at: record.recorded_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }
}

impl TryFrom<MessageRow> for MessageRecord {
    type Error = anyhow::Error;

    fn try_from(row: MessageRow) -> Res<Self> {
        Ok(Self {
            conversation_id: row.conversation_id,
            author_id: row.author_id,
            text: row.text,
            external_timestamp: row.external_timestamp,
            recorded_at: DateTime::parse_from_rfc3339(&row.recorded_at)?.with_timezone(&Utc),
        })
    }
}

/// SurrealDB client implementation.
#[derive(Clone)]
pub struct SurrealDbClient {
    db: Surreal<Any>,
}

impl SurrealDbClient {
    /// Create a new database client.
    ///
    /// Remote endpoints (`ws://`, `wss://`, ...) are signed in as root; `mem://` skips authentication.
    #[instrument(name = "SurrealDbClient::new", skip_all)]
    pub async fn new(config: &Config) -> Res<Self> {
        let db = any::connect(config.db_endpoint.as_str()).await?;

        if !config.db_endpoint.starts_with("mem://") {
            db.signin(Root {
                username: &config.db_username,
                password: &config.db_password,
            })
            .await?;
        }

        db.use_ns(config.db_namespace.as_str()).use_db(config.db_database.as_str()).await?;

        let client = Self { db };
        client.define_schema().await?;

        info!("Database initialized successfully.");

        Ok(client)
    }

    /// Create a new in-memory database client.
    #[instrument(name = "SurrealDbClient::memory", skip_all)]
    pub async fn memory() -> Res<Self> {
        let db = any::connect("mem://").await?;
        db.use_ns("relay").use_db("bot").await?;

        let client = Self { db };
        client.define_schema().await?;

        Ok(client)
    }

    /// Define the `message` table and its recency index.
    async fn define_schema(&self) -> Void {
        self.db
            .query(
                "
                DEFINE TABLE IF NOT EXISTS message SCHEMAFULL;
                DEFINE FIELD IF NOT EXISTS conversation_id ON message TYPE string;
                DEFINE FIELD IF NOT EXISTS author_id ON message TYPE string;
                DEFINE FIELD IF NOT EXISTS text ON message TYPE string;
                DEFINE FIELD IF NOT EXISTS external_timestamp ON message TYPE string;
                DEFINE FIELD IF NOT EXISTS recorded_at ON message TYPE string;
                DEFINE INDEX IF NOT EXISTS message_recency ON message FIELDS conversation_id, external_timestamp;
                ",
            )
            .await?
            .check()?;

        Ok(())
    }
}

#[async_trait]
impl GenericDbClient for SurrealDbClient {
    #[instrument(skip_all)]
    async fn insert_message(&self, record: &MessageRecord) -> Void {
        self.db.query("CREATE message CONTENT $row").bind(("row", MessageRow::from(record))).await?.check()?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_recent_messages(&self, conversation_id: &str, limit: usize) -> Res<Vec<MessageRecord>> {
        let mut response = self
            .db
            .query(
                "SELECT conversation_id, author_id, text, external_timestamp, recorded_at FROM message \
                 WHERE conversation_id = $conversation_id \
                 ORDER BY external_timestamp DESC \
                 LIMIT $limit",
            )
            .bind(("conversation_id", conversation_id.to_string()))
            .bind(("limit", limit))
            .await?;

        let rows: Vec<MessageRow> = response.take(0)?;

        rows.into_iter().map(MessageRecord::try_from).collect()
    }
}
