//! One-shot publishing worker.
//!
//! Each run takes the highest-priority queued item, prepares its images,
//! publishes it, and removes it. A failing item is abandoned and the next one
//! is tried, until `max_tries` items have failed; the last failing item is
//! left queued for the next scheduled run.

mod caption;
mod mastodon;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

pub use caption::{compose, split_annotation, Caption, CaptionInput};
pub use mastodon::{MastodonClient, SocialClient, StatusRequest};

use crate::config::Config;
use crate::db::{self, Database, QueueKind, QueuedPost};
use crate::imaging::{ImageError, ImageProcessor};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("post {post_id} has no usable attachments")]
    NoAttachments { post_id: String },
    #[error("media upload failed: {0}")]
    Upload(String),
    #[error("status post failed: {0}")]
    Status(String),
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("stored post is malformed: {0}")]
    Malformed(String),
}

/// Settings for one publisher run.
#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub max_tries: u32,
    pub visibility: String,
    pub tags: String,
    pub quality: u8,
    pub upscale_providers: Vec<String>,
    pub upscaler: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
}

impl PublishSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_tries: config.max_tries.max(1),
            visibility: config.visibility.clone(),
            tags: config.post_tags.clone(),
            quality: config.publish_quality,
            upscale_providers: config.upscale_providers.clone(),
            upscaler: config.realcugan_path.clone(),
            work_dir: config.work_dir.clone(),
        }
    }

    fn needs_upscale(&self, provider: Option<&str>) -> bool {
        provider.is_some_and(|p| self.upscale_providers.iter().any(|u| u == p))
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Both queues empty.
    Drained { abandoned: u32 },
    Published {
        kind: QueueKind,
        post_id: String,
        status_id: String,
        abandoned: u32,
    },
    /// The failure bound was reached; `post_id` is still queued.
    GaveUp { post_id: String, failures: u32 },
}

pub struct Publisher {
    db: Database,
    client: reqwest::Client,
    social: Arc<dyn SocialClient>,
    settings: PublishSettings,
}

impl Publisher {
    #[must_use]
    pub fn new(
        db: Database,
        client: reqwest::Client,
        social: Arc<dyn SocialClient>,
        settings: PublishSettings,
    ) -> Self {
        Self {
            db,
            client,
            social,
            settings,
        }
    }

    /// Run until one item is published, the queues are empty, or the
    /// failure bound is hit.
    ///
    /// # Errors
    ///
    /// Returns an error only for database failures. Publish failures are
    /// handled by the retry bound.
    pub async fn run(&self) -> Result<RunOutcome> {
        let mut failures = 0;

        loop {
            let Some((kind, post)) = db::dequeue(self.db.pool()).await? else {
                info!(abandoned = failures, "Queue is empty");
                return Ok(RunOutcome::Drained {
                    abandoned: failures,
                });
            };

            debug!(queue = kind.as_str(), post_id = %post.post_id, "Publishing");
            match self.publish(kind, &post).await {
                Ok(status_id) => {
                    db::remove_post(self.db.pool(), kind, post.id).await?;
                    info!(
                        queue = kind.as_str(),
                        post_id = %post.post_id,
                        status_id = %status_id,
                        "Published post"
                    );
                    return Ok(RunOutcome::Published {
                        kind,
                        post_id: post.post_id,
                        status_id,
                        abandoned: failures,
                    });
                }
                Err(e) => {
                    failures += 1;
                    if failures >= self.settings.max_tries {
                        error!(
                            post_id = %post.post_id,
                            failures,
                            "Publish failed: {e}; giving up until the next run"
                        );
                        return Ok(RunOutcome::GaveUp {
                            post_id: post.post_id,
                            failures,
                        });
                    }
                    warn!(
                        post_id = %post.post_id,
                        failures,
                        "Publish failed: {e}; skipping to next item"
                    );
                    db::remove_post(self.db.pool(), kind, post.id).await?;
                }
            }
        }
    }

    /// Prepare, upload and publish one item.
    async fn publish(&self, kind: QueueKind, post: &QueuedPost) -> Result<String, PublishError> {
        let urls = post
            .attachment_urls()
            .map_err(|e| PublishError::Malformed(e.to_string()))?;
        let links = post
            .link_map()
            .map_err(|e| PublishError::Malformed(e.to_string()))?;
        let upscaled = self.settings.needs_upscale(post.provider.as_deref());

        let mut processor = ImageProcessor::new(
            self.settings.work_dir.as_deref(),
            self.settings.quality,
            self.settings.upscaler.clone(),
        )?;
        let uploaded = self.upload_all(&mut processor, post, &urls, upscaled).await;
        if let Err(e) = processor.release() {
            warn!(error = %e, "Failed to release image processor");
        }
        let media_ids = uploaded?;

        if media_ids.is_empty() {
            return Err(PublishError::NoAttachments {
                post_id: post.post_id.clone(),
            });
        }

        let caption = compose(&CaptionInput {
            message: &post.message,
            author: &post.author,
            author_link: &post.author_link,
            provider: post.provider.as_deref(),
            boosted: kind == QueueKind::Boosted,
            explicit: post.is_explicit,
            upscaled,
            links: links.as_ref(),
            tags: &self.settings.tags,
        });

        let request = StatusRequest {
            status: caption.status,
            visibility: self.settings.visibility.clone(),
            media_ids,
            sensitive: caption.spoiler_text.is_some(),
            spoiler_text: caption.spoiler_text,
        };
        self.social.post_status(&request).await
    }

    async fn upload_all(
        &self,
        processor: &mut ImageProcessor,
        post: &QueuedPost,
        urls: &[String],
        upscale: bool,
    ) -> Result<Vec<String>, PublishError> {
        let mut media_ids = Vec::with_capacity(urls.len());

        for (index, url) in urls.iter().enumerate() {
            let bytes = match self.fetch_attachment(url).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(post_id = %post.post_id, url = %url, "Skipping attachment: {e:#}");
                    continue;
                }
            };
            let image = match processor.process(bytes, url, upscale).await {
                Ok(image) => image,
                Err(e) => {
                    warn!(post_id = %post.post_id, url = %url, "Skipping attachment: {e}");
                    continue;
                }
            };

            let file_name = format!("{}-{index}.{}", post.post_id, image.extension());
            media_ids.push(self.social.upload_media(&image, &file_name).await?);
        }

        Ok(media_ids)
    }

    /// Read an attachment from disk (`file://`) or over HTTP.
    async fn fetch_attachment(&self, url: &str) -> Result<Vec<u8>> {
        let parsed = Url::parse(url)?;
        if parsed.scheme() == "file" {
            let path = parsed
                .to_file_path()
                .map_err(|()| anyhow::anyhow!("not a local path: {url}"))?;
            return Ok(tokio::fs::read(&path).await?);
        }

        let response = self.client.get(parsed).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}
