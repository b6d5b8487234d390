use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque ID types for type safety
pub type UserId = Uuid;
pub type NotificationId = Uuid;
pub type ConversationId = Uuid;
pub type MessageId = Uuid;
pub type JobId = Uuid;
/// Externally supplied room key (job id, conversation id, ...)
pub type RoomId = String;
pub type ConnectionId = ulid::Ulid;

/// Timestamp in RFC 3339 format
pub type Timestamp = chrono::DateTime<chrono::Utc>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub title: String,
    pub body: String,
    /// Originating domain event, e.g. "bid_accepted"
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub read_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    pub id: ConversationId,
    pub job_id: JobId,
    pub participant_a: UserId,
    pub participant_b: UserId,
    pub created_at: Timestamp,
}

impl Conversation {
    pub fn has_participant(&self, user_id: &UserId) -> bool {
        self.participant_a == *user_id || self.participant_b == *user_id
    }

    /// The participant that is not `user_id`
    pub fn other_participant(&self, user_id: &UserId) -> Option<UserId> {
        if self.participant_a == *user_id {
            Some(self.participant_b)
        } else if self.participant_b == *user_id {
            Some(self.participant_a)
        } else {
            None
        }
    }

    /// Whether this conversation is the one for `job_id` between `a` and `b` (in any order)
    pub fn matches(&self, job_id: &JobId, a: &UserId, b: &UserId) -> bool {
        self.job_id == *job_id
            && ((self.participant_a == *a && self.participant_b == *b)
                || (self.participant_a == *b && self.participant_b == *a))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: String,
    pub created_at: Timestamp,
    pub read_at: Option<Timestamp>,
}

/// A conversation enriched for listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub last_message: Option<Message>,
    pub unread_count: usize,
}

/// A session key wrapped for one party
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WrappedKey {
    pub key_id: String,
    pub wrapped_key: String,
}

/// Opaque end-to-end encrypted payload.
///
/// The ciphertext is decryptable by any of the three parties holding a wrapped copy
/// of the session key. The server only forwards it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncryptedEnvelope {
    pub ciphertext: String,
    pub nonce: String,
    pub sender_key: WrappedKey,
    pub recipient_key: WrappedKey,
    pub escrow_key: WrappedKey,
}

/// A message relayed to the members of a chat room
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub envelope: EncryptedEnvelope,
    pub sent_at: Timestamp,
}
