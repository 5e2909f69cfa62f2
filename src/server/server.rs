use anyhow::{anyhow, Result};
use std::{
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant, SystemTime},
};

use chrono::Utc;
use tracing::{debug, error, warn};

use crate::letters::{
    ComposeRequest, DeliveryService, Letter, LetterError, RecipientSelectionPolicy, Reply,
};
use crate::songs::Song;
use crate::store::ComusicStore;
use crate::user::{AuthToken, AuthTokenValue, Profile, ProfilePatch};
use axum_extra::extract::cookie::{Cookie, SameSite};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::services::ServeDir;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{response, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::metrics::{metrics_handler, record_login_attempt};
use super::session::{Session, COOKIE_SESSION_TOKEN_KEY};
use super::state::ServerState;
use super::{
    extract_user_id_for_rate_limit, log_requests, rate_limit_error_handler, IpKeyExtractor,
    ServerConfig, UserOrIpKeyExtractor, GLOBAL_PER_MINUTE, LOGIN_PER_MINUTE,
};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
    pub session_token: Option<String>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
struct SignupBody {
    pub handle: String,
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
struct LoginBody {
    pub handle: String,
    pub password: String,
}

#[derive(Serialize)]
struct AuthSuccessResponse {
    token: String,
    profile: Profile,
}

#[derive(Deserialize, Debug)]
struct ReplyBody {
    pub content: String,
    #[serde(default)]
    pub is_anonymous: bool,
}

/// A letter with its song resolved, as shown in inbox and sent lists.
#[derive(Serialize)]
struct LetterView {
    #[serde(flatten)]
    letter: Letter,
    song: Option<Song>,
}

#[derive(Serialize)]
struct LetterDetail {
    #[serde(flatten)]
    letter: Letter,
    song: Option<Song>,
    replies: Vec<Reply>,
}

#[derive(Serialize)]
struct QuotaResponse {
    sent_today: i64,
    max_daily_letters: i64,
    can_send: bool,
    unread_inbox: i64,
    max_inbox_letters: i64,
}

async fn home(session: Option<Session>, State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
        session_token: session.map(|s| s.token),
    };
    Json(stats)
}

fn session_cookie_response(status: StatusCode, token: &str, body: String) -> Response {
    let cookie_value = HeaderValue::from_str(&format!(
        "{}={}; Path=/; HttpOnly",
        COOKIE_SESSION_TOKEN_KEY, token
    ))
    .unwrap();
    response::Builder::new()
        .status(status)
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .header(axum::http::header::SET_COOKIE, cookie_value)
        .body(Body::from(body))
        .unwrap()
}

fn expired_cookie_response(status: StatusCode) -> Response {
    let cookie_value = Cookie::build(Cookie::new(COOKIE_SESSION_TOKEN_KEY, ""))
        .path("/")
        .expires(time::OffsetDateTime::now_utc() - time::Duration::days(1)) // Expire it in the past
        .same_site(SameSite::Lax)
        .build();

    response::Builder::new()
        .status(status)
        .header(axum::http::header::SET_COOKIE, cookie_value.to_string())
        .body(Body::empty())
        .unwrap()
}

fn open_session(state: &ServerState, user_id: usize) -> Result<AuthToken> {
    let token = AuthToken {
        user_id,
        created: SystemTime::now(),
        last_used: None,
        value: AuthTokenValue::generate(),
    };
    state.store.add_auth_token(token.clone())?;
    Ok(token)
}

async fn signup(
    State(state): State<ServerState>,
    Json(body): Json<SignupBody>,
) -> Result<Response, ApiError> {
    debug!("signup() called for handle {}", body.handle);
    if body.handle.trim().is_empty() || body.username.trim().is_empty() {
        return Err(LetterError::validation("Handle and username must not be empty").into());
    }
    if body.password.is_empty() {
        return Err(LetterError::validation("Password must not be empty").into());
    }

    let user_id = match state
        .store
        .create_user(body.handle.trim(), body.username.trim(), &body.password)
    {
        Ok(user_id) => user_id,
        Err(err) => {
            if format!("{:#}", err).contains("UNIQUE constraint failed") {
                return Err(LetterError::validation("Handle is already taken").into());
            }
            return Err(ApiError::from(err));
        }
    };

    // A new member may unblock letters waiting for an eligible receiver.
    if let Err(err) = state.delivery.sweep_queued(Utc::now()) {
        warn!("Post-signup delivery sweep failed: {}", err);
    }

    let token = open_session(&state, user_id)?;
    let profile = state
        .store
        .get_profile(user_id)?
        .ok_or(LetterError::NotFound)?;
    let response_body = serde_json::to_string(&AuthSuccessResponse {
        token: token.value.0.clone(),
        profile,
    })
    .unwrap();
    Ok(session_cookie_response(
        StatusCode::CREATED,
        &token.value.0,
        response_body,
    ))
}

async fn login(State(state): State<ServerState>, Json(body): Json<LoginBody>) -> Response {
    debug!("login() called for handle {}", body.handle);
    if let Ok(Some(credentials)) = state.store.get_user_credentials(&body.handle) {
        if let Ok(true) = credentials.verify(&body.password) {
            return match open_session(&state, credentials.user_id)
                .and_then(|token| Ok((state.store.get_profile(credentials.user_id)?, token)))
            {
                Ok((Some(profile), token)) => {
                    record_login_attempt("success");
                    let response_body = serde_json::to_string(&AuthSuccessResponse {
                        token: token.value.0.clone(),
                        profile,
                    })
                    .unwrap();
                    session_cookie_response(StatusCode::CREATED, &token.value.0, response_body)
                }
                Ok((None, _)) => StatusCode::FORBIDDEN.into_response(),
                Err(err) => {
                    error!("Error with auth token generation: {}", err);
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            };
        }
    }
    record_login_attempt("failure");
    StatusCode::FORBIDDEN.into_response()
}

async fn logout(State(state): State<ServerState>, session: Session) -> Response {
    match state.store.delete_auth_token(&AuthTokenValue(session.token)) {
        Ok(Some(_)) => expired_cookie_response(StatusCode::OK),
        Ok(None) => StatusCode::BAD_REQUEST.into_response(),
        Err(err) => {
            error!("Failed to delete auth token: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn delete_account(State(state): State<ServerState>, session: Session) -> Response {
    match state.store.delete_user(session.user_id) {
        Ok(()) => expired_cookie_response(StatusCode::OK),
        Err(err) => {
            error!("Failed to delete account {}: {}", session.user_id, err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn get_profile(
    session: Session,
    State(state): State<ServerState>,
) -> Result<Json<Profile>, ApiError> {
    let profile = state
        .store
        .get_profile(session.user_id)?
        .ok_or(LetterError::NotFound)?;
    Ok(Json(profile))
}

async fn put_profile(
    session: Session,
    State(state): State<ServerState>,
    Json(patch): Json<ProfilePatch>,
) -> Result<Json<Profile>, ApiError> {
    if let Some(username) = &patch.username {
        if username.trim().is_empty() {
            return Err(LetterError::validation("Username must not be empty").into());
        }
    }
    state.store.update_profile(session.user_id, &patch)?;
    let profile = state
        .store
        .get_profile(session.user_id)?
        .ok_or(LetterError::NotFound)?;
    Ok(Json(profile))
}

fn letter_view(store: &dyn ComusicStore, letter: Letter) -> Result<LetterView> {
    let song = store.get_song(&letter.song_id)?;
    Ok(LetterView { letter, song })
}

async fn compose_letter(
    session: Session,
    State(state): State<ServerState>,
    Json(request): Json<ComposeRequest>,
) -> Result<Response, ApiError> {
    let outcome = state
        .delivery
        .compose(session.user_id, &request, Utc::now())?;
    Ok((StatusCode::CREATED, Json(outcome)).into_response())
}

async fn get_inbox(
    session: Session,
    State(state): State<ServerState>,
) -> Result<Json<Vec<LetterView>>, ApiError> {
    let letters = state.store.inbox_letters(session.user_id)?;
    let views = letters
        .into_iter()
        .map(|letter| letter_view(state.store.as_ref(), letter))
        .collect::<Result<Vec<_>>>()?;
    Ok(Json(views))
}

async fn get_sent(
    session: Session,
    State(state): State<ServerState>,
) -> Result<Json<Vec<LetterView>>, ApiError> {
    let letters = state.store.sent_letters(session.user_id)?;
    let views = letters
        .into_iter()
        .map(|letter| letter_view(state.store.as_ref(), letter))
        .collect::<Result<Vec<_>>>()?;
    Ok(Json(views))
}

async fn get_quota(
    session: Session,
    State(state): State<ServerState>,
) -> Result<Json<QuotaResponse>, ApiError> {
    let (allowance, limits) = state.delivery.send_allowance(session.user_id, Utc::now())?;
    let unread_inbox = state.store.unread_load(session.user_id)?;
    Ok(Json(QuotaResponse {
        sent_today: allowance.sent_today,
        max_daily_letters: limits.max_daily_letters,
        can_send: allowance.allowed,
        unread_inbox,
        max_inbox_letters: limits.max_inbox_letters,
    }))
}

async fn get_letter_detail(
    session: Session,
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<LetterDetail>, ApiError> {
    let letter = state
        .delivery
        .open_letter(session.user_id, &id, Utc::now())?;
    let song = state.store.get_song(&letter.song_id)?;
    let replies = state.store.replies_for_letter(&letter.id)?;
    Ok(Json(LetterDetail {
        letter,
        song,
        replies,
    }))
}

async fn post_reply(
    session: Session,
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(body): Json<ReplyBody>,
) -> Result<Response, ApiError> {
    let reply = state.delivery.reply(
        session.user_id,
        &id,
        &body.content,
        body.is_anonymous,
        Utc::now(),
    )?;
    Ok((StatusCode::CREATED, Json(reply)).into_response())
}

async fn archive_letter(
    session: Session,
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.delivery.archive(session.user_id, &id, Utc::now())?;
    Ok(StatusCode::OK)
}

async fn get_settings(
    _session: Session,
    State(state): State<ServerState>,
) -> Result<Json<crate::settings::DeliveryLimits>, ApiError> {
    Ok(Json(state.store.delivery_limits()?))
}

pub fn make_app(
    config: ServerConfig,
    store: Arc<dyn ComusicStore>,
    policy: Box<dyn RecipientSelectionPolicy>,
) -> Result<Router> {
    let delivery = Arc::new(DeliveryService::new(store.clone(), policy));
    let state = ServerState {
        config: config.clone(),
        start_time: Instant::now(),
        store,
        delivery,
        hash: env!("GIT_HASH").to_string(),
    };

    // One replenished login attempt every few seconds per IP
    let login_governor = Arc::new(
        GovernorConfigBuilder::default()
            .per_second((60 / LOGIN_PER_MINUTE) as u64)
            .burst_size(LOGIN_PER_MINUTE)
            .key_extractor(IpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow!("Invalid login rate limit configuration"))?,
    );
    let global_governor = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond((60_000 / GLOBAL_PER_MINUTE) as u64)
            .burst_size(GLOBAL_PER_MINUTE)
            .key_extractor(UserOrIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow!("Invalid global rate limit configuration"))?,
    );

    let auth_routes: Router = Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/account", delete(delete_account))
        .layer(GovernorLayer::new(login_governor).error_handler(rate_limit_error_handler))
        .with_state(state.clone());

    let profile_routes: Router = Router::new()
        .route("/", get(get_profile).put(put_profile))
        .with_state(state.clone());

    let letter_routes: Router = Router::new()
        .route("/", post(compose_letter))
        .route("/inbox", get(get_inbox))
        .route("/sent", get(get_sent))
        .route("/quota", get(get_quota))
        .route("/{id}", get(get_letter_detail))
        .route("/{id}/replies", post(post_reply))
        .route("/{id}/archive", post(archive_letter))
        .with_state(state.clone());

    let settings_routes: Router = Router::new()
        .route("/", get(get_settings))
        .with_state(state.clone());

    let home_router: Router = match config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    let mut app: Router = home_router
        .route("/metrics", get(metrics_handler))
        .nest("/v1/auth", auth_routes)
        .nest("/v1/profile", profile_routes)
        .nest("/v1/letters", letter_routes)
        .nest("/v1/settings", settings_routes);

    // The global limiter must sit inside the user id extraction layer so it
    // can key on the extension that layer inserts.
    app = app.layer(GovernorLayer::new(global_governor).error_handler(rate_limit_error_handler));
    app = app.layer(middleware::from_fn_with_state(
        state.clone(),
        extract_user_id_for_rate_limit,
    ));
    app = app.layer(middleware::from_fn_with_state(state.clone(), log_requests));

    Ok(app)
}

pub async fn run_server(
    store: Arc<dyn ComusicStore>,
    policy: Box<dyn RecipientSelectionPolicy>,
    requests_logging_level: super::RequestsLoggingLevel,
    port: u16,
    frontend_dir_path: Option<String>,
) -> Result<()> {
    let config = ServerConfig {
        port,
        requests_logging_level,
        frontend_dir_path,
    };
    let app = make_app(config, store, policy)?;

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    Ok(
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?,
    )
}
