//! REST endpoints of the push gateway.
//!
//! Bodies are validated here (or by the store) before anything is pushed; the socket
//! never carries client input.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::Caller;
use crate::error::ApiError;
use crate::hub::HubStats;
use crate::protocol::{PublicKeyPayload, PushType};
use crate::state::AppState;
use crate::store::{NewNotification, StoreError};
use crate::types::*;

/// Longest room id accepted from clients
const MAX_ROOM_ID_LEN: usize = 128;

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    #[serde(flatten)]
    pub hub: HubStats,
    pub rooms: usize,
}

#[derive(Debug, Deserialize)]
pub struct OpenConversationRequest {
    pub participant_id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct AnnounceKeyRequest {
    pub public_key: String,
}

#[derive(Debug, Deserialize)]
pub struct TypingRequest {
    pub is_typing: bool,
}

#[derive(Debug, Deserialize)]
pub struct RoomMessageRequest {
    pub envelope: EncryptedEnvelope,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomMembers {
    pub room_id: RoomId,
    pub members: Vec<UserId>,
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        hub: state.hub.stats().await,
        rooms: state.chat.room_count().await,
    })
}

/// Persist a notification and push it to the user's live connections.
///
/// POST /notifications/send
pub async fn send_notification(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewNotification>,
) -> ApiResult<(StatusCode, Json<Notification>)> {
    let notification = state.store.create_notification(new).await?;
    tracing::info!(
        user_id = %notification.user_id,
        kind = %notification.kind,
        "Notification created"
    );

    state
        .hub
        .send_to_user(notification.user_id, PushType::Notification, &notification)
        .await;
    Ok((StatusCode::CREATED, Json(notification)))
}

/// GET /notifications/user/{id}
pub async fn list_user_notifications(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(user_id): Path<UserId>,
) -> ApiResult<Json<Vec<Notification>>> {
    if caller != user_id {
        tracing::warn!(user_id = %user_id, caller = %caller, "Rejected foreign notification history");
        return Err(ApiError::Forbidden(
            "cannot read another user's notifications".to_string(),
        ));
    }
    Ok(Json(state.store.list_notifications(user_id).await?))
}

/// POST /notifications/{id}/read
pub async fn mark_notification_read(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(id): Path<NotificationId>,
) -> ApiResult<Json<Notification>> {
    Ok(Json(state.store.mark_notification_read(id, caller).await?))
}

/// GET /messages/conversations
pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
) -> ApiResult<Json<Vec<ConversationSummary>>> {
    Ok(Json(state.store.list_conversations(caller).await?))
}

/// Get or create the caller's conversation with a participant about a job.
///
/// POST /messages/conversations/job/{job_id}
pub async fn open_job_conversation(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(job_id): Path<JobId>,
    Json(body): Json<OpenConversationRequest>,
) -> ApiResult<Json<Conversation>> {
    if body.participant_id == caller {
        return Err(ApiError::BadRequest(
            "cannot open a conversation with yourself".to_string(),
        ));
    }
    let conversation = state
        .store
        .get_or_create_conversation(job_id, caller, body.participant_id)
        .await?;
    Ok(Json(conversation))
}

/// Load a conversation the caller takes part in
async fn member_conversation(
    state: &AppState,
    id: ConversationId,
    caller: UserId,
) -> ApiResult<Conversation> {
    let conversation = state.store.get_conversation(id).await?;
    if !conversation.has_participant(&caller) {
        tracing::warn!(
            conversation_id = %id,
            user_id = %caller,
            "Rejected access to foreign conversation"
        );
        return Err(ApiError::Forbidden(
            "not a participant of this conversation".to_string(),
        ));
    }
    Ok(conversation)
}

/// List messages, marking incoming ones read.
///
/// GET /messages/conversations/{id}
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(id): Path<ConversationId>,
) -> ApiResult<Json<Vec<Message>>> {
    member_conversation(&state, id, caller).await?;
    Ok(Json(state.store.list_messages(id, caller).await?))
}

/// Append a message and push it to the other participant.
///
/// POST /messages/conversations/{id}
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(id): Path<ConversationId>,
    Json(body): Json<PostMessageRequest>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    let conversation = member_conversation(&state, id, caller).await?;
    let message = state.store.append_message(id, caller, body.content).await?;

    if let Some(recipient) = conversation.other_participant(&caller) {
        state
            .hub
            .send_to_user(recipient, PushType::Message, &message)
            .await;
    }
    Ok((StatusCode::CREATED, Json(message)))
}

fn check_room_id(room_id: &str) -> ApiResult<()> {
    if room_id.trim().is_empty() || room_id.len() > MAX_ROOM_ID_LEN {
        return Err(ApiError::BadRequest(format!(
            "room id must be 1-{} characters",
            MAX_ROOM_ID_LEN
        )));
    }
    Ok(())
}

/// A room is a conversation id or a job id. The caller must be a participant of the
/// conversation, or of at least one conversation about the job.
async fn authorize_room(state: &AppState, room_id: &str, caller: UserId) -> ApiResult<()> {
    check_room_id(room_id)?;
    let forbidden = || {
        tracing::warn!(room_id = %room_id, user_id = %caller, "Rejected access to foreign room");
        ApiError::Forbidden("not a participant of this room".to_string())
    };
    let Ok(id) = room_id.parse::<uuid::Uuid>() else {
        return Err(forbidden());
    };

    match state.store.get_conversation(id).await {
        Ok(conversation) if conversation.has_participant(&caller) => return Ok(()),
        Ok(_) => return Err(forbidden()),
        Err(StoreError::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }

    if state.store.is_job_participant(id, caller).await? {
        Ok(())
    } else {
        Err(forbidden())
    }
}

async fn require_member(state: &AppState, room_id: &str, caller: UserId) -> ApiResult<()> {
    authorize_room(state, room_id, caller).await?;
    if !state.chat.is_member(room_id, caller).await {
        return Err(ApiError::Forbidden("not a member of this room".to_string()));
    }
    Ok(())
}

/// POST /chat/rooms/{room_id}/join
pub async fn join_room(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(room_id): Path<RoomId>,
) -> ApiResult<StatusCode> {
    authorize_room(&state, &room_id, caller).await?;
    state.chat.join_chat(&room_id, caller).await;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /chat/rooms/{room_id}/leave
pub async fn leave_room(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(room_id): Path<RoomId>,
) -> ApiResult<StatusCode> {
    check_room_id(&room_id)?;
    state.chat.leave_chat(&room_id, caller).await;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /chat/rooms/{room_id}/members
pub async fn room_members(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(room_id): Path<RoomId>,
) -> ApiResult<Json<RoomMembers>> {
    require_member(&state, &room_id, caller).await?;
    let members = state.chat.members(&room_id).await;
    Ok(Json(RoomMembers { room_id, members }))
}

/// POST /chat/rooms/{room_id}/typing
pub async fn room_typing(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(room_id): Path<RoomId>,
    Json(body): Json<TypingRequest>,
) -> ApiResult<StatusCode> {
    require_member(&state, &room_id, caller).await?;
    state
        .chat
        .send_typing_indicator(&room_id, caller, body.is_typing)
        .await;
    Ok(StatusCode::NO_CONTENT)
}

/// Relay an encrypted message to the room.
///
/// POST /chat/rooms/{room_id}/messages
pub async fn room_message(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(room_id): Path<RoomId>,
    Json(body): Json<RoomMessageRequest>,
) -> ApiResult<(StatusCode, Json<ChatMessage>)> {
    require_member(&state, &room_id, caller).await?;
    if body.envelope.ciphertext.is_empty() {
        return Err(ApiError::BadRequest("ciphertext cannot be empty".to_string()));
    }

    let message = ChatMessage {
        room_id: room_id.clone(),
        sender_id: caller,
        envelope: body.envelope,
        sent_at: chrono::Utc::now(),
    };
    state.chat.send_chat_message(&room_id, &message).await;
    Ok((StatusCode::ACCEPTED, Json(message)))
}

/// POST /chat/keys
pub async fn announce_key(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Json(body): Json<AnnounceKeyRequest>,
) -> ApiResult<StatusCode> {
    let public_key = body.public_key.trim().to_string();
    if public_key.is_empty() {
        return Err(ApiError::BadRequest("public_key cannot be empty".to_string()));
    }
    state.chat.handle_public_key(caller, public_key).await;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /chat/keys/{user_id}
pub async fn get_key(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<UserId>,
) -> ApiResult<Json<PublicKeyPayload>> {
    let public_key = state
        .chat
        .public_key(user_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("no public key announced by {}", user_id)))?;
    Ok(Json(PublicKeyPayload {
        user_id,
        public_key,
    }))
}
