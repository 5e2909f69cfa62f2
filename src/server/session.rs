//! Session extraction for authenticated routes.
//!
//! A session token travels either in the `session_token` cookie (the web
//! client) or in the `Authorization` header (api clients). Handlers take a
//! [`Session`] argument; routes that tolerate anonymous callers take
//! `Option<Session>` instead.

use super::state::ServerState;
use crate::user::AuthTokenValue;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::IntoResponse,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::debug;

pub const COOKIE_SESSION_TOKEN_KEY: &str = "session_token";
pub const HEADER_SESSION_TOKEN_KEY: &str = "Authorization";

#[derive(Debug)]
pub struct Session {
    pub user_id: usize,
    pub token: String,
}

pub enum SessionExtractionError {
    AccessDenied,
}

impl IntoResponse for SessionExtractionError {
    fn into_response(self) -> axum::response::Response {
        match self {
            SessionExtractionError::AccessDenied => StatusCode::FORBIDDEN.into_response(),
        }
    }
}

/// Pulls the raw token from the request, cookie first, header second.
async fn session_token(parts: &mut Parts, state: &ServerState) -> Option<String> {
    let jar = CookieJar::from_request_parts(parts, state).await.ok();
    if let Some(cookie) = jar.as_ref().and_then(|jar| jar.get(COOKIE_SESSION_TOKEN_KEY)) {
        return Some(cookie.value().to_string());
    }
    parts
        .headers
        .get(HEADER_SESSION_TOKEN_KEY)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

async fn resolve_session(parts: &mut Parts, state: &ServerState) -> Option<Session> {
    let token = match session_token(parts, state).await {
        Some(token) => AuthTokenValue(token),
        None => {
            debug!("Request carries no session token");
            return None;
        }
    };

    match state.store.get_auth_token(&token) {
        Ok(Some(auth_token)) => {
            // last_used is bookkeeping only, a failed stamp never blocks auth
            if let Err(err) = state.store.touch_auth_token(&token) {
                debug!("Failed to stamp auth token last_used: {}", err);
            }
            Some(Session {
                user_id: auth_token.user_id,
                token: auth_token.value.0,
            })
        }
        Ok(None) => {
            debug!("Unknown session token");
            None
        }
        Err(err) => {
            debug!("Auth token lookup failed: {}", err);
            None
        }
    }
}

impl FromRequestParts<ServerState> for Session {
    type Rejection = SessionExtractionError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        resolve_session(parts, state)
            .await
            .ok_or(SessionExtractionError::AccessDenied)
    }
}

impl FromRequestParts<ServerState> for Option<Session> {
    type Rejection = SessionExtractionError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        Ok(resolve_session(parts, state).await)
    }
}
