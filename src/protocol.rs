use crate::types::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A serialized push envelope, shared between all connections it is fanned out to
pub type Frame = Arc<str>;

/// Kind of content carried by a push envelope
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PushType {
    Notification,
    Message,
    Typing,
    PublicKey,
}

impl PushType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PushType::Notification => "notification",
            PushType::Message => "message",
            PushType::Typing => "typing",
            PushType::PublicKey => "public_key",
        }
    }
}

impl std::fmt::Display for PushType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server -> client wire format: `{"type": ..., "payload": ...}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushEnvelope<T> {
    #[serde(rename = "type")]
    pub kind: PushType,
    pub payload: T,
}

impl<T: Serialize> PushEnvelope<T> {
    pub fn new(kind: PushType, payload: T) -> Self {
        Self { kind, payload }
    }

    /// Serialize into a frame ready to be queued on connections
    pub fn encode(&self) -> serde_json::Result<Frame> {
        serde_json::to_string(self).map(Frame::from)
    }
}

/// Decode a frame received from the server (used by clients and tests)
pub fn decode_frame(frame: &str) -> serde_json::Result<PushEnvelope<serde_json::Value>> {
    serde_json::from_str(frame)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TypingPayload {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub is_typing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicKeyPayload {
    pub user_id: UserId,
    pub public_key: String,
}

/// JSON body of every REST error response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub code: String,
    pub msg: String,
}
