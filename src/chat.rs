//! Chat rooms and public-key bootstrap, layered on the [`Hub`].
//!
//! Room membership and the key directory sit behind one `RwLock` and are mutated by
//! callers directly, unlike the hub registry which only its own task touches. Fan-out
//! targets are computed under the lock; frames are handed to the hub after it is
//! released.
//!
//! The key directory is a volatile cache: it only holds the last key each user
//! announced since the process started.

use crate::hub::Hub;
use crate::protocol::{PublicKeyPayload, PushEnvelope, PushType, TypingPayload};
use crate::types::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Directory {
    rooms: HashMap<RoomId, HashSet<UserId>>,
    public_keys: HashMap<UserId, String>,
}

impl Directory {
    /// Members sharing at least one room with `user_id`, excluding the user
    fn peers_of(&self, user_id: &UserId) -> HashSet<UserId> {
        self.rooms
            .values()
            .filter(|members| members.contains(user_id))
            .flat_map(|members| members.iter().copied())
            .filter(|member| member != user_id)
            .collect()
    }
}

#[derive(Clone)]
pub struct ChatHub {
    hub: Hub,
    directory: Arc<RwLock<Directory>>,
}

impl ChatHub {
    pub fn new(hub: Hub) -> Self {
        Self {
            hub,
            directory: Arc::new(RwLock::new(Directory::default())),
        }
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Add `user_id` to the room and send them the keys other members already announced
    pub async fn join_chat(&self, room_id: &str, user_id: UserId) {
        let known_keys: Vec<PublicKeyPayload> = {
            let mut directory = self.directory.write().await;
            let members = directory.rooms.entry(room_id.to_string()).or_default();
            members.insert(user_id);
            let others: Vec<UserId> = members
                .iter()
                .copied()
                .filter(|member| *member != user_id)
                .collect();

            others
                .into_iter()
                .filter_map(|member| {
                    directory
                        .public_keys
                        .get(&member)
                        .map(|key| PublicKeyPayload {
                            user_id: member,
                            public_key: key.clone(),
                        })
                })
                .collect()
        };

        tracing::info!(
            room_id = %room_id,
            user_id = %user_id,
            keys = known_keys.len(),
            "User joined chat"
        );

        for payload in &known_keys {
            self.hub
                .send_to_user(user_id, PushType::PublicKey, payload)
                .await;
        }
    }

    /// Remove `user_id` from the room. Returns whether they were a member.
    pub async fn leave_chat(&self, room_id: &str, user_id: UserId) -> bool {
        let mut directory = self.directory.write().await;
        let Some(members) = directory.rooms.get_mut(room_id) else {
            return false;
        };
        let removed = members.remove(&user_id);
        if members.is_empty() {
            directory.rooms.remove(room_id);
            tracing::debug!(room_id = %room_id, "Room emptied, removed");
        }
        if removed {
            tracing::info!(room_id = %room_id, user_id = %user_id, "User left chat");
        }
        removed
    }

    /// Record the user's current public key and send it to everyone sharing a room with them
    pub async fn handle_public_key(&self, user_id: UserId, public_key: String) {
        let peers = {
            let mut directory = self.directory.write().await;
            directory.public_keys.insert(user_id, public_key.clone());
            directory.peers_of(&user_id)
        };

        tracing::info!(
            user_id = %user_id,
            recipients = peers.len(),
            "Public key announced"
        );

        let payload = PublicKeyPayload {
            user_id,
            public_key,
        };
        self.fan_out(peers.into_iter().collect(), PushType::PublicKey, &payload)
            .await;
    }

    /// Relay an encrypted chat message to every member of the room, sender included
    pub async fn send_chat_message(&self, room_id: &str, message: &ChatMessage) {
        let members = self.members(room_id).await;
        tracing::debug!(
            room_id = %room_id,
            sender_id = %message.sender_id,
            recipients = members.len(),
            "Relaying chat message"
        );
        self.fan_out(members, PushType::Message, message).await;
    }

    /// Tell the other members of the room that `sender_id` started or stopped typing
    pub async fn send_typing_indicator(&self, room_id: &str, sender_id: UserId, is_typing: bool) {
        let recipients: Vec<UserId> = self
            .members(room_id)
            .await
            .into_iter()
            .filter(|member| *member != sender_id)
            .collect();

        let payload = TypingPayload {
            room_id: room_id.to_string(),
            user_id: sender_id,
            is_typing,
        };
        self.fan_out(recipients, PushType::Typing, &payload).await;
    }

    async fn fan_out<T: Serialize>(&self, recipients: Vec<UserId>, kind: PushType, payload: &T) {
        if recipients.is_empty() {
            return;
        }
        match PushEnvelope::new(kind, payload).encode() {
            Ok(frame) => self.hub.send_frame(recipients, frame).await,
            Err(e) => tracing::error!(%kind, "Failed to serialize room push: {}", e),
        }
    }

    /// Current members of the room (empty if the room does not exist)
    pub async fn members(&self, room_id: &str) -> Vec<UserId> {
        self.directory
            .read()
            .await
            .rooms
            .get(room_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub async fn is_member(&self, room_id: &str, user_id: UserId) -> bool {
        self.directory
            .read()
            .await
            .rooms
            .get(room_id)
            .is_some_and(|members| members.contains(&user_id))
    }

    pub async fn room_exists(&self, room_id: &str) -> bool {
        self.directory.read().await.rooms.contains_key(room_id)
    }

    pub async fn room_count(&self) -> usize {
        self.directory.read().await.rooms.len()
    }

    /// Rooms the user currently belongs to
    pub async fn rooms_of(&self, user_id: UserId) -> Vec<RoomId> {
        self.directory
            .read()
            .await
            .rooms
            .iter()
            .filter(|(_, members)| members.contains(&user_id))
            .map(|(room_id, _)| room_id.clone())
            .collect()
    }

    /// Last key the user announced, if any
    pub async fn public_key(&self, user_id: UserId) -> Option<String> {
        self.directory
            .read()
            .await
            .public_keys
            .get(&user_id)
            .cloned()
    }
}
