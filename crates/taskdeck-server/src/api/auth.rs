use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse};
use axum::Json;

use taskdeck_shared::requests::{LoginRequest, RegisterRequest};
use taskdeck_shared::{Envelope, User};

use super::AppState;
use crate::auth::{clear_cookie, read_cookie, session_cookie};
use crate::error::ApiError;
use crate::extract::{CurrentUser, Valid};
use crate::service;

type SetCookie = AppendHeaders<[(header::HeaderName, String); 1]>;

async fn start_session(state: &AppState, user: &User) -> SetCookie {
    let cookie = state.sessions.create(&user.id).await;
    AppendHeaders([(
        header::SET_COOKIE,
        session_cookie(&cookie, state.sessions.ttl(), state.secure_cookies()),
    )])
}

pub async fn register(
    State(state): State<AppState>,
    Valid(registration): Valid<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = service::register(&state.store, &state.passwords, registration).await?;
    let cookie = start_session(&state, &user).await;
    Ok((StatusCode::CREATED, cookie, Json(Envelope::ok(user))))
}

pub async fn login(
    State(state): State<AppState>,
    Valid(credentials): Valid<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = service::authenticate(&state.store, &state.passwords, credentials).await?;
    tracing::info!(user_id = %user.id, "user logged in");
    let cookie = start_session(&state, &user).await;
    Ok((cookie, Json(Envelope::ok(user))))
}

/// Always succeeds; a missing or stale cookie is simply cleared.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(cookie) = read_cookie(&headers) {
        state.sessions.revoke(cookie).await;
    }
    (
        AppendHeaders([(header::SET_COOKIE, clear_cookie(state.secure_cookies()))]),
        Json(Envelope::empty()),
    )
}

pub async fn current_user(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Envelope<User>>, ApiError> {
    let user = service::current_user(&state.store, &user.id).await?;
    Ok(Json(Envelope::ok(user)))
}
