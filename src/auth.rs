//! Caller identity propagated by the fronting API gateway.
//!
//! The gateway authenticates users and forwards their id in `X-User-Id`. When
//! `PUSH_GATEWAY_TOKEN` is set, requests must also carry the shared token in
//! `X-Gateway-Token`, so only the gateway can assert identities.

use crate::error::ApiError;
use crate::types::UserId;
use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const GATEWAY_TOKEN_HEADER: &str = "x-gateway-token";

/// Gateway trust configuration
#[derive(Debug, Clone, Default)]
pub struct GatewayAuth {
    /// Shared secret expected from the gateway (None = trust every caller)
    pub token: Option<String>,
}

impl GatewayAuth {
    /// Load from PUSH_GATEWAY_TOKEN
    pub fn from_env() -> Self {
        let token = std::env::var("PUSH_GATEWAY_TOKEN")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        if token.is_some() {
            tracing::info!("Gateway token check enabled");
        } else {
            tracing::warn!("PUSH_GATEWAY_TOKEN not set - identity headers are trusted as-is");
        }
        Self { token }
    }

    pub fn is_enabled(&self) -> bool {
        self.token.is_some()
    }

    pub fn validate(&self, presented: &str) -> bool {
        match &self.token {
            Some(expected) => constant_time_eq(expected.as_bytes(), presented.as_bytes()),
            None => true,
        }
    }
}

/// Constant-time byte comparison to prevent timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Middleware rejecting requests that did not come through the gateway
pub async fn gateway_auth_middleware(
    State(auth): State<Arc<GatewayAuth>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !auth.is_enabled() {
        return next.run(request).await;
    }

    let presented = request
        .headers()
        .get(GATEWAY_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());

    match presented {
        Some(token) if auth.validate(token) => next.run(request).await,
        _ => {
            tracing::warn!(path = %request.uri().path(), "Request without valid gateway token");
            ApiError::Unauthorized.into_response()
        }
    }
}

/// Authenticated caller, taken from the `X-User-Id` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
            .map(Caller)
            .ok_or(ApiError::Unauthorized)
    }
}
