use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use sqlx::SqlitePool;

use crate::db as queries;
use crate::db::Session;

/// Name of the login cookie.
pub const SESSION_COOKIE: &str = "session";

/// Read a cookie value from request headers.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all("cookie")
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|cookie| {
            let (key, value) = cookie.trim().split_once('=')?;
            (key == name).then_some(value)
        })
}

/// Current moderation session (if any).
/// Use this extractor when authentication is optional.
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Option<Session>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeSession
where
    S: Send + Sync,
    SqlitePool: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let pool = SqlitePool::from_ref(state);

        let Some(cookie) = read_cookie(&parts.headers, SESSION_COOKIE) else {
            return Ok(MaybeSession(None));
        };

        let session = match queries::get_session_by_cookie(&pool, cookie).await {
            Ok(Some(s)) => s,
            Ok(None) => return Ok(MaybeSession(None)),
            Err(e) => {
                tracing::error!("Failed to look up session: {e:#}");
                return Ok(MaybeSession(None));
            }
        };

        let now = chrono::Utc::now().to_rfc3339();
        if session.expires_at < now {
            let _ = queries::delete_session(&pool, cookie).await;
            return Ok(MaybeSession(None));
        }

        Ok(MaybeSession(Some(session)))
    }
}

/// Current moderation session (required).
/// Returns 403 Forbidden if not logged in.
#[derive(Debug, Clone)]
pub struct RequireSession(pub Session);

#[async_trait]
impl<S> FromRequestParts<S> for RequireSession
where
    S: Send + Sync,
    SqlitePool: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let MaybeSession(session) = MaybeSession::from_request_parts(parts, state).await?;

        session
            .map(RequireSession)
            .ok_or_else(|| StatusCode::FORBIDDEN.into_response())
    }
}
