use super::{MessageStore, NewNotification, StoreError, StoreResult};
use crate::types::*;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory message store. Insertion order doubles as chronological order.
#[derive(Clone, Default)]
pub struct MemoryStore {
    notifications: Arc<RwLock<HashMap<UserId, Vec<Notification>>>>,
    conversations: Arc<RwLock<HashMap<ConversationId, Conversation>>>,
    messages: Arc<RwLock<HashMap<ConversationId, Vec<Message>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn member_conversation(
        &self,
        id: ConversationId,
        user_id: UserId,
    ) -> StoreResult<Conversation> {
        let conversation = self.get_conversation(id).await?;
        if !conversation.has_participant(&user_id) {
            return Err(StoreError::Forbidden(format!(
                "user {} is not part of conversation {}",
                user_id, id
            )));
        }
        Ok(conversation)
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn create_notification(&self, new: NewNotification) -> StoreResult<Notification> {
        if new.title.trim().is_empty() {
            return Err(StoreError::Invalid("title cannot be empty".to_string()));
        }

        let notification = Notification {
            id: uuid::Uuid::new_v4(),
            user_id: new.user_id,
            title: new.title,
            body: new.body,
            kind: new.kind,
            data: new.data,
            created_at: chrono::Utc::now(),
            read_at: None,
        };

        self.notifications
            .write()
            .await
            .entry(notification.user_id)
            .or_default()
            .push(notification.clone());
        Ok(notification)
    }

    async fn list_notifications(&self, user_id: UserId) -> StoreResult<Vec<Notification>> {
        let notifications = self.notifications.read().await;
        Ok(notifications
            .get(&user_id)
            .map(|list| list.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    async fn unread_notifications(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> StoreResult<Vec<Notification>> {
        let notifications = self.notifications.read().await;
        let mut unread: Vec<Notification> = notifications
            .get(&user_id)
            .map(|list| {
                list.iter()
                    .rev()
                    .filter(|n| n.read_at.is_none())
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        unread.reverse();
        Ok(unread)
    }

    async fn mark_notification_read(
        &self,
        id: NotificationId,
        reader: UserId,
    ) -> StoreResult<Notification> {
        let mut notifications = self.notifications.write().await;
        let notification = notifications
            .values_mut()
            .flat_map(|list| list.iter_mut())
            .find(|n| n.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("notification {}", id)))?;

        if notification.user_id != reader {
            return Err(StoreError::Forbidden(format!(
                "notification {} belongs to another user",
                id
            )));
        }
        if notification.read_at.is_none() {
            notification.read_at = Some(chrono::Utc::now());
        }
        Ok(notification.clone())
    }

    async fn list_conversations(&self, user_id: UserId) -> StoreResult<Vec<ConversationSummary>> {
        let conversations = self.conversations.read().await;
        let messages = self.messages.read().await;

        let mut summaries: Vec<ConversationSummary> = conversations
            .values()
            .filter(|c| c.has_participant(&user_id))
            .map(|c| {
                let thread = messages.get(&c.id);
                let last_message = thread.and_then(|t| t.last().cloned());
                let unread_count = thread
                    .map(|t| {
                        t.iter()
                            .filter(|m| m.sender_id != user_id && m.read_at.is_none())
                            .count()
                    })
                    .unwrap_or(0);
                ConversationSummary {
                    conversation: c.clone(),
                    last_message,
                    unread_count,
                }
            })
            .collect();

        summaries.sort_by_key(|s| {
            std::cmp::Reverse(
                s.last_message
                    .as_ref()
                    .map(|m| m.created_at)
                    .unwrap_or(s.conversation.created_at),
            )
        });
        Ok(summaries)
    }

    async fn get_or_create_conversation(
        &self,
        job_id: JobId,
        user_a: UserId,
        user_b: UserId,
    ) -> StoreResult<Conversation> {
        if user_a == user_b {
            return Err(StoreError::Invalid(
                "a conversation needs two distinct participants".to_string(),
            ));
        }

        let mut conversations = self.conversations.write().await;
        if let Some(existing) = conversations
            .values()
            .find(|c| c.matches(&job_id, &user_a, &user_b))
        {
            return Ok(existing.clone());
        }

        let conversation = Conversation {
            id: uuid::Uuid::new_v4(),
            job_id,
            participant_a: user_a,
            participant_b: user_b,
            created_at: chrono::Utc::now(),
        };
        conversations.insert(conversation.id, conversation.clone());
        tracing::debug!(
            conversation_id = %conversation.id,
            job_id = %job_id,
            "Conversation created"
        );
        Ok(conversation)
    }

    async fn get_conversation(&self, id: ConversationId) -> StoreResult<Conversation> {
        self.conversations
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("conversation {}", id)))
    }

    async fn is_job_participant(&self, job_id: JobId, user_id: UserId) -> StoreResult<bool> {
        Ok(self
            .conversations
            .read()
            .await
            .values()
            .any(|c| c.job_id == job_id && c.has_participant(&user_id)))
    }

    async fn list_messages(
        &self,
        conversation_id: ConversationId,
        reader: UserId,
    ) -> StoreResult<Vec<Message>> {
        self.member_conversation(conversation_id, reader).await?;

        let now = chrono::Utc::now();
        let mut messages = self.messages.write().await;
        let thread = messages.entry(conversation_id).or_default();
        for message in thread.iter_mut() {
            if message.sender_id != reader && message.read_at.is_none() {
                message.read_at = Some(now);
            }
        }
        Ok(thread.clone())
    }

    async fn append_message(
        &self,
        conversation_id: ConversationId,
        sender_id: UserId,
        content: String,
    ) -> StoreResult<Message> {
        if content.trim().is_empty() {
            return Err(StoreError::Invalid("content cannot be empty".to_string()));
        }
        self.member_conversation(conversation_id, sender_id).await?;

        let message = Message {
            id: uuid::Uuid::new_v4(),
            conversation_id,
            sender_id,
            content,
            created_at: chrono::Utc::now(),
            read_at: None,
        };
        self.messages
            .write()
            .await
            .entry(conversation_id)
            .or_default()
            .push(message.clone());
        Ok(message)
    }
}
