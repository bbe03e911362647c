//! Push-ingestion gateway.
//!
//! Deliveries are acknowledged before they are validated; everything here runs
//! after the sender already got its 200, so failures are only logged.

mod attachments;
mod classifier;
mod payload;
mod signature;

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

pub use attachments::{AttachmentResolver, GraphAttachmentResolver};
pub use classifier::{ContentClassifier, KeywordClassifier};
pub use payload::{ChangeValue, PostAuthor, WebhookChange, WebhookEntry, WebhookFeed};
pub use signature::{sign, verify_signature, SIGNATURE_HEADER};

use crate::db::{self, Database, NewQueuedPost, QueueKind};

/// Provider tag for pushed page posts.
pub const PUSH_PROVIDER: &str = "Facebook";

/// Why a pushed event was refused.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("signature header missing")]
    MissingSignature,
    #[error("signature does not match")]
    BadSignature,
    #[error("malformed body: {0}")]
    MalformedBody(String),
    #[error("received data is not from a page webhook")]
    NotFromPage,
    #[error("post has no message")]
    EmptyMessage,
    #[error("message rejected by content classifier")]
    Rejected,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("failed to resolve attachments: {0:#}")]
    Attachments(anyhow::Error),
    #[error("failed to store post: {0:#}")]
    Store(anyhow::Error),
}

/// What happened to an accepted delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Enqueued { id: i64, post_id: String },
    Duplicate { post_id: String },
}

/// Answer to a subscription handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subscription {
    /// Echo the challenge back.
    Confirmed(String),
    Rejected,
    /// Parameters missing; not a handshake at all.
    NotAHandshake,
}

/// Validates, deduplicates and enqueues pushed events.
#[derive(Clone)]
pub struct Gateway {
    db: Database,
    verify_token: String,
    secret: Vec<u8>,
    classifier: Arc<dyn ContentClassifier>,
    resolver: Arc<dyn AttachmentResolver>,
}

impl Gateway {
    #[must_use]
    pub fn new(
        db: Database,
        verify_token: &str,
        secret: &str,
        classifier: Arc<dyn ContentClassifier>,
        resolver: Arc<dyn AttachmentResolver>,
    ) -> Self {
        Self {
            db,
            verify_token: verify_token.to_string(),
            secret: secret.as_bytes().to_vec(),
            classifier,
            resolver,
        }
    }

    /// Check a subscription handshake's `hub.mode` / `hub.verify_token`.
    #[must_use]
    pub fn subscribe(
        &self,
        mode: Option<&str>,
        token: Option<&str>,
        challenge: Option<&str>,
    ) -> Subscription {
        match (mode, token) {
            (Some(mode), Some(token)) if !mode.is_empty() && !token.is_empty() => {
                if mode == "subscribe" && token == self.verify_token {
                    info!("Webhook registered!");
                    Subscription::Confirmed(challenge.unwrap_or_default().to_string())
                } else {
                    Subscription::Rejected
                }
            }
            _ => Subscription::NotAHandshake,
        }
    }

    /// Process one delivery end to end.
    pub async fn ingest(
        &self,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<IngestOutcome, IngestError> {
        verify_signature(&self.secret, body, signature)?;

        let feed: WebhookFeed = serde_json::from_slice(body)
            .map_err(|e| ValidationError::MalformedBody(e.to_string()))?;
        if feed.object != "page" {
            return Err(ValidationError::NotFromPage.into());
        }
        let change = feed
            .first_change()
            .ok_or_else(|| ValidationError::MalformedBody("no changes in entry".to_string()))?;

        let exists = db::post_exists(self.db.pool(), QueueKind::Default, &change.post_id)
            .await
            .map_err(IngestError::Store)?;
        if exists {
            debug!(post_id = %change.post_id, "Post already queued");
            return Ok(IngestOutcome::Duplicate {
                post_id: change.post_id.clone(),
            });
        }

        let message = self.validate_content(change)?;
        info!(author = %change.from.name, "New post from {}", change.from.name);

        let attachments = self
            .resolver
            .resolve(change)
            .await
            .map_err(IngestError::Attachments)?;
        if attachments.is_empty() {
            warn!(post_id = %change.post_id, "Pushed post has no image attachments");
        }

        let post = NewQueuedPost {
            post_id: change.post_id.clone(),
            author: change.from.name.clone(),
            author_link: format!("https://facebook.com/{}", change.from.id),
            message: message.to_string(),
            attachments,
            provider: Some(PUSH_PROVIDER.to_string()),
            is_explicit: false,
            links: None,
        };

        let inserted = db::enqueue_into(self.db.pool(), QueueKind::Default, &post)
            .await
            .map_err(IngestError::Store)?;

        Ok(match inserted {
            Some(id) => IngestOutcome::Enqueued {
                id,
                post_id: post.post_id,
            },
            None => IngestOutcome::Duplicate {
                post_id: post.post_id,
            },
        })
    }

    fn validate_content<'a>(&self, change: &'a ChangeValue) -> Result<&'a str, ValidationError> {
        let message = change
            .message
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .ok_or(ValidationError::EmptyMessage)?;

        if self.classifier.accepts(message) {
            Ok(message)
        } else {
            Err(ValidationError::Rejected)
        }
    }
}
