use chrono::{DateTime, Utc};

pub type Err = anyhow::Error;
pub type Res<T> = Result<T, Err>;
pub type Void = Res<()>;

/// A single observed message, as persisted by the message store.
///
/// Records are append-only: they are created once per parsed mention and never updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    /// The channel (or thread root) the message belongs to.
    pub conversation_id: String,
    /// The user who sent the message.
    pub author_id: String,
    /// The message body, with the leading mention already stripped.
    pub text: String,
    /// The platform ordering token (Slack `ts`); the only sort key for history.
    pub external_timestamp: String,
    /// When this system recorded the message. Audit only.
    pub recorded_at: DateTime<Utc>,
}

impl MessageRecord {
    /// Creates a new record stamped with the current wall-clock time.
    pub fn new(conversation_id: &str, author_id: &str, text: &str, external_timestamp: &str) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            author_id: author_id.to_string(),
            text: text.to_string(),
            external_timestamp: external_timestamp.to_string(),
            recorded_at: Utc::now(),
        }
    }
}

/// Role tag for a single turn sent to the generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

/// A role-tagged input to the generation backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// Sampling settings passed along with every backend invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingConfig {
    pub temperature: f32,
}

impl SamplingConfig {
    /// Greedy decoding.
    pub const DETERMINISTIC: Self = Self { temperature: 0.0 };
}

/// An outbound reply, addressed to a channel and (usually) a thread within it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub channel_id: String,
    /// The thread anchor; `None` posts top-level.
    pub thread_ts: Option<String>,
    pub text: String,
}
