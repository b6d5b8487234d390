//! Persistence boundary for notifications, conversations and messages.
//!
//! The push layer only needs the operations below. Production deployments back them
//! with the platform database; [`MemoryStore`] is the in-process implementation used by
//! the default binary wiring and by tests.

mod memory;

pub use memory::MemoryStore;

use crate::types::*;
use async_trait::async_trait;
use serde::Deserialize;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by a message store
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Invalid input: {0}")]
    Invalid(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Fields of a notification to be created
#[derive(Debug, Clone, Deserialize)]
pub struct NewNotification {
    pub user_id: UserId,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

fn default_kind() -> String {
    "general".to_string()
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn create_notification(&self, new: NewNotification) -> StoreResult<Notification>;

    /// A user's notification history, newest first
    async fn list_notifications(&self, user_id: UserId) -> StoreResult<Vec<Notification>>;

    /// Up to `limit` most recent unread notifications, oldest first
    async fn unread_notifications(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> StoreResult<Vec<Notification>>;

    /// Mark a notification read on behalf of its owner
    async fn mark_notification_read(
        &self,
        id: NotificationId,
        reader: UserId,
    ) -> StoreResult<Notification>;

    /// Conversations the user takes part in, most recently active first
    async fn list_conversations(&self, user_id: UserId) -> StoreResult<Vec<ConversationSummary>>;

    /// Conversation for `job_id` between the two users, created if it does not exist
    async fn get_or_create_conversation(
        &self,
        job_id: JobId,
        user_a: UserId,
        user_b: UserId,
    ) -> StoreResult<Conversation>;

    async fn get_conversation(&self, id: ConversationId) -> StoreResult<Conversation>;

    /// Whether the user takes part in at least one conversation about `job_id`
    async fn is_job_participant(&self, job_id: JobId, user_id: UserId) -> StoreResult<bool>;

    /// Messages oldest first. Marks the ones sent by the other participant as read.
    async fn list_messages(
        &self,
        conversation_id: ConversationId,
        reader: UserId,
    ) -> StoreResult<Vec<Message>>;

    async fn append_message(
        &self,
        conversation_id: ConversationId,
        sender_id: UserId,
        content: String,
    ) -> StoreResult<Message>;
}
