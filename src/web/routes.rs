use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use super::{auth, pages, relay, AppState};
use crate::auth::{MaybeSession, RequireSession};
use crate::db::{self, NewQueuedPost};
use crate::ingest::{IngestError, IngestOutcome, Subscription, SIGNATURE_HEADER};

/// Create the router with all routes. Paths are relative to the endpoint prefix.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/healthz", get(health))
        .route("/facebook", get(subscribe).post(deliver))
        .route("/login", get(auth::login_page).post(auth::login_post))
        .route("/logout", get(auth::logout))
        .route("/booru", post(submit))
        .route("/client", get(client))
        .route("/client/verify", get(verify))
        .route("/client/posts", get(posts))
        .route("/client/uncors", get(relay::relay))
}

async fn home(State(state): State<AppState>) -> Redirect {
    Redirect::to(&state.config.account_url)
}

async fn health() -> &'static str {
    "OK"
}

// ========== Push webhook ==========

#[derive(Debug, Deserialize)]
pub struct HubParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// GET /facebook - subscription handshake.
async fn subscribe(State(state): State<AppState>, Query(params): Query<HubParams>) -> Response {
    match state.gateway.subscribe(
        params.mode.as_deref(),
        params.verify_token.as_deref(),
        params.challenge.as_deref(),
    ) {
        Subscription::Confirmed(challenge) => (StatusCode::OK, challenge).into_response(),
        Subscription::Rejected => {
            tracing::warn!("Webhook verification token mismatch");
            StatusCode::UNAUTHORIZED.into_response()
        }
        Subscription::NotAHandshake => Redirect::to(&state.config.account_url).into_response(),
    }
}

/// POST /facebook - acknowledge immediately, validate and enqueue in the background.
async fn deliver(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let gateway = state.gateway.clone();

    tokio::spawn(async move {
        match gateway.ingest(signature.as_deref(), &body).await {
            Ok(IngestOutcome::Enqueued { id, post_id }) => {
                tracing::info!(id, post_id = %post_id, "Queued pushed post");
            }
            Ok(IngestOutcome::Duplicate { post_id }) => {
                tracing::debug!(post_id = %post_id, "Ignored duplicate delivery");
            }
            Err(IngestError::Validation(e)) => tracing::warn!("Rejected delivery: {e}"),
            Err(e) => tracing::error!("Failed to ingest delivery: {e}"),
        }
    });

    StatusCode::OK
}

// ========== Curation ==========

#[derive(Debug, Serialize)]
struct SubmitResponse {
    queued: bool,
    queue: &'static str,
}

/// POST /booru - queue an approved post.
async fn submit(
    State(state): State<AppState>,
    RequireSession(session): RequireSession,
    Json(post): Json<NewQueuedPost>,
) -> Response {
    let kind = post.queue_kind();
    match db::enqueue(state.db.pool(), &post).await {
        Ok(inserted) => {
            tracing::info!(
                post_id = %post.post_id,
                queue = kind.as_str(),
                by = %session.email,
                duplicate = inserted.is_none(),
                "Approved post"
            );
            Json(SubmitResponse {
                queued: inserted.is_some(),
                queue: kind.as_str(),
            })
            .into_response()
        }
        Err(e) => {
            tracing::error!("Failed to queue submission: {e:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response()
        }
    }
}

/// GET /client - the curation page.
async fn client(State(state): State<AppState>, MaybeSession(session): MaybeSession) -> Response {
    match session {
        Some(session) => {
            Html(pages::client_page(&state.config.endpoint, &session.email).into_string())
                .into_response()
        }
        None => Redirect::to(&state.config.route("/login")).into_response(),
    }
}

#[derive(Debug, Serialize)]
struct VerifyResponse {
    token: Option<String>,
}

/// GET /client/verify - the bearer token of the current session, or null.
async fn verify(MaybeSession(session): MaybeSession) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        token: session.map(|s| s.token),
    })
}

/// GET /client/posts - one shuffled aggregator batch.
async fn posts(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    headers: HeaderMap,
) -> Response {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let authorized = matches!((&session, bearer), (Some(s), Some(b)) if s.token == b);
    if !authorized {
        return StatusCode::FORBIDDEN.into_response();
    }

    let outcome = state.aggregator.fetch().await;
    if !outcome.errors.is_empty() {
        tracing::debug!(failed = outcome.errors.len(), "Some providers failed this poll");
    }
    Json(outcome.posts).into_response()
}
