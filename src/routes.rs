use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{api, auth, state::AppState, ws};

/// Build the HTTP/WS router
pub fn router(state: Arc<AppState>, gateway_auth: Arc<auth::GatewayAuth>) -> Router {
    // Everything except the health check must come through the gateway
    let gated = Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/notifications/send", post(api::send_notification))
        .route(
            "/notifications/user/{id}",
            get(api::list_user_notifications),
        )
        .route("/notifications/{id}/read", post(api::mark_notification_read))
        .route("/messages/conversations", get(api::list_conversations))
        .route(
            "/messages/conversations/job/{job_id}",
            post(api::open_job_conversation),
        )
        .route(
            "/messages/conversations/{id}",
            get(api::list_messages).post(api::post_message),
        )
        .route("/chat/rooms/{room_id}/join", post(api::join_room))
        .route("/chat/rooms/{room_id}/leave", post(api::leave_room))
        .route("/chat/rooms/{room_id}/members", get(api::room_members))
        .route("/chat/rooms/{room_id}/typing", post(api::room_typing))
        .route("/chat/rooms/{room_id}/messages", post(api::room_message))
        .route("/chat/keys", post(api::announce_key))
        .route("/chat/keys/{user_id}", get(api::get_key))
        .layer(middleware::from_fn_with_state(
            gateway_auth,
            auth::gateway_auth_middleware,
        ));

    Router::new()
        .route("/health", get(api::health))
        .merge(gated)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
