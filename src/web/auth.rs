use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use chrono::{Duration, Utc};
use serde::Deserialize;

use super::{pages, AppState};
use crate::auth::{
    generate_client_token, generate_session_token, read_cookie, verify_password, MaybeSession,
    SESSION_COOKIE, SESSION_TTL_SECS,
};
use crate::config::Config;
use crate::db as queries;

const LOGIN_FAILED: &str = "Incorrect email or password";

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

/// GET /login
pub async fn login_page(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
) -> Response {
    if session.is_some() {
        return Redirect::to(&state.config.route("/client")).into_response();
    }
    Html(pages::login_page(&state.config.endpoint, None).into_string()).into_response()
}

/// POST /login - check credentials and issue a fresh session.
pub async fn login_post(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let user = match queries::get_user(state.db.pool(), form.email.trim()).await {
        Ok(user) => user,
        Err(e) => {
            tracing::error!("Failed to look up user: {e:#}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Login failed").into_response();
        }
    };

    let Some(user) = user else {
        return login_failed(&state.config);
    };

    match verify_password(&form.password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => {
            tracing::info!(email = %user.email, "Rejected login");
            return login_failed(&state.config);
        }
        Err(e) => {
            tracing::error!("Password verification error: {e:#}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Login failed").into_response();
        }
    }

    let now = Utc::now();
    match queries::delete_expired_sessions(state.db.pool(), &now.to_rfc3339()).await {
        Ok(0) => {}
        Ok(removed) => tracing::debug!(removed, "Pruned expired sessions"),
        Err(e) => tracing::warn!("Failed to prune expired sessions: {e:#}"),
    }

    let cookie = generate_session_token();
    let token = generate_client_token();
    let expires_at = (now + Duration::seconds(SESSION_TTL_SECS)).to_rfc3339();

    if let Err(e) =
        queries::create_session(state.db.pool(), &cookie, &user.email, &token, &expires_at).await
    {
        tracing::error!("Failed to create session: {e:#}");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Login failed").into_response();
    }
    tracing::info!(email = %user.email, "Moderator logged in");

    (
        [(
            header::SET_COOKIE,
            session_cookie(&state.config, &cookie, SESSION_TTL_SECS),
        )],
        Redirect::to(&state.config.route("/client")),
    )
        .into_response()
}

/// GET /logout - destroy the server session and return to the login page.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(cookie) = read_cookie(&headers, SESSION_COOKIE) {
        if let Err(e) = queries::delete_session(state.db.pool(), cookie).await {
            tracing::warn!("Failed to delete session: {e:#}");
        }
    }

    (
        [(header::SET_COOKIE, session_cookie(&state.config, "", 0))],
        Redirect::to(&state.config.route("/login")),
    )
        .into_response()
}

fn login_failed(config: &Config) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Html(pages::login_page(&config.endpoint, Some(LOGIN_FAILED)).into_string()),
    )
        .into_response()
}

fn session_cookie(config: &Config, value: &str, max_age: i64) -> String {
    let path = if config.endpoint.is_empty() {
        "/"
    } else {
        config.endpoint.as_str()
    };
    let secure = if config.production { "; Secure" } else { "" };
    format!("{SESSION_COOKIE}={value}; HttpOnly; SameSite=Lax; Path={path}; Max-Age={max_age}{secure}")
}
