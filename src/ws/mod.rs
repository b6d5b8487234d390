pub mod pump;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
};
use futures::stream::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ApiError;
use crate::hub::Connection;
use crate::protocol::{PushEnvelope, PushType};
use crate::state::AppState;
use crate::types::UserId;
use pump::{ReaderExit, WriterExit};

/// How long the writer may take to flush its close frame after the reader quit
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub user_id: Option<String>,
}

/// WebSocket upgrade handler.
///
/// The caller's identity is validated before upgrading, so a bad request never
/// creates a connection.
pub async fn ws_handler(
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let user_id: UserId = match params.user_id.as_deref().map(|s| s.trim().parse()) {
        Some(Ok(id)) => id,
        _ => {
            tracing::warn!(user_id = ?params.user_id, "WebSocket upgrade without valid user_id");
            return ApiError::BadRequest("user_id query parameter must be a UUID".to_string())
                .into_response();
        }
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    tracing::info!(user_id = %user_id, "WebSocket connection request");
    ws.on_upgrade(move |socket| handle_socket(socket, user_id, state))
}

/// Outcome of a connection's lifetime
enum Ended {
    Reader(ReaderExit),
    Writer(WriterExit),
}

/// Run one push connection: register it, pump frames, unregister when either side stops
async fn handle_socket(socket: WebSocket, user_id: UserId, state: Arc<AppState>) {
    let (sink, mut stream) = socket.split();
    let config = state.config.clone();

    let (connection, outbound) = Connection::new(user_id, config.connection_queue);
    let connection_id = connection.id();

    queue_catchup(&state, &connection).await;

    let mut writer = tokio::spawn(pump::write_frames(sink, outbound, config.ping_interval));
    state.hub.register(connection).await;

    tracing::info!(
        user_id = %user_id,
        connection_id = %connection_id,
        "WebSocket connected"
    );

    let ended = tokio::select! {
        exit = pump::read_until_closed(&mut stream, config.idle_timeout) => Ended::Reader(exit),
        exit = &mut writer => Ended::Writer(exit.unwrap_or(WriterExit::WriteFailed)),
    };

    state.hub.unregister(user_id, connection_id).await;

    match ended {
        Ended::Reader(exit) => {
            // Unregistering closed the queue, so the writer sends a close frame and stops
            if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
                .await
                .is_err()
            {
                writer.abort();
            }
            tracing::info!(
                user_id = %user_id,
                connection_id = %connection_id,
                reason = ?exit,
                "WebSocket reader stopped"
            );
        }
        Ended::Writer(exit) => {
            tracing::info!(
                user_id = %user_id,
                connection_id = %connection_id,
                reason = ?exit,
                "WebSocket writer stopped"
            );
        }
    }
}

/// Queue the user's recent unread notifications on a fresh connection.
///
/// Takes at most half of the connection's queue so live pushes are not evicted
/// behind the backlog.
///
/// A notification created just before the socket connected may also be pushed live
/// once the connection registers, so it can arrive twice. Both frames carry the same
/// notification `id`; clients de-duplicate on it.
async fn queue_catchup(state: &AppState, connection: &Connection) {
    let limit = state
        .config
        .catchup_limit
        .min(state.config.connection_queue / 2);
    if limit == 0 {
        return;
    }

    let unread = match state
        .store
        .unread_notifications(connection.user_id(), limit)
        .await
    {
        Ok(unread) => unread,
        Err(e) => {
            tracing::warn!(user_id = %connection.user_id(), "Catch-up fetch failed: {}", e);
            return;
        }
    };

    let mut queued = 0;
    for notification in &unread {
        let Ok(frame) = PushEnvelope::new(PushType::Notification, notification).encode() else {
            continue;
        };
        if connection.try_push(frame).is_err() {
            break;
        }
        queued += 1;
    }

    if queued > 0 {
        tracing::debug!(
            user_id = %connection.user_id(),
            queued,
            "Queued unread notifications for new connection"
        );
    }
}
