//! Rate limiting middleware using tower-governor
//!
//! Login attempts are limited per IP to slow down credential stuffing;
//! authenticated traffic is keyed by user id with an IP fallback.

use crate::server::session::Session;
use axum::{
    body::Body,
    extract::{ConnectInfo, Request},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tower_governor::{key_extractor::KeyExtractor, GovernorError};
use tracing::warn;

/// Login attempts per minute per IP
pub const LOGIN_PER_MINUTE: u32 = 10;

/// Global requests per minute per user
pub const GLOBAL_PER_MINUTE: u32 = 1000;

const LOCAL_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);

/// Extracts IP address from ConnectInfo for IP-based rate limiting
#[derive(Clone)]
pub struct IpKeyExtractor;

impl KeyExtractor for IpKeyExtractor {
    type Key = SocketAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        // In-process requests carry no peer address, collapse them onto loopback
        Ok(req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr)
            .unwrap_or(LOCAL_ADDR))
    }
}

/// Extracts user ID from session for user-based rate limiting
/// Falls back to IP if no session exists
#[derive(Clone)]
pub struct UserOrIpKeyExtractor;

impl KeyExtractor for UserOrIpKeyExtractor {
    type Key = String;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        if let Some(user_id) = req.extensions().get::<usize>() {
            return Ok(format!("user:{}", user_id));
        }

        let addr = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr)
            .unwrap_or(LOCAL_ADDR);
        Ok(format!("ip:{}", addr.ip()))
    }
}

/// Logs rate limit violations and maps them to 429.
pub fn rate_limit_error_handler(err: GovernorError) -> Response {
    match err {
        GovernorError::TooManyRequests { .. } => {
            warn!("Rate limit exceeded");
            StatusCode::TOO_MANY_REQUESTS.into_response()
        }
        other => {
            warn!("Rate limiting error: {:?}", other);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Middleware to extract user_id from Session and add it to request extensions
/// This allows the rate limiter to use user_id as the key
pub async fn extract_user_id_for_rate_limit(
    session: Option<Session>,
    mut request: Request<Body>,
    next: Next,
) -> impl IntoResponse {
    if let Some(session) = session {
        request.extensions_mut().insert(session.user_id);
    }
    next.run(request).await
}
