use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::payload::ChangeValue;

/// Looks up the image URLs attached to a pushed post.
#[async_trait]
pub trait AttachmentResolver: Send + Sync {
    async fn resolve(&self, change: &ChangeValue) -> Result<Vec<String>>;
}

/// Resolves attachments through the Graph API `/{post-id}/attachments` edge.
pub struct GraphAttachmentResolver {
    client: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AttachmentList {
    #[serde(default)]
    data: Vec<Attachment>,
}

#[derive(Debug, Deserialize)]
struct Attachment {
    media: Option<Media>,
    subattachments: Option<AttachmentList>,
}

#[derive(Debug, Deserialize)]
struct Media {
    image: Option<MediaImage>,
}

#[derive(Debug, Deserialize)]
struct MediaImage {
    src: String,
}

impl GraphAttachmentResolver {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: &str, access_token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
        }
    }
}

#[async_trait]
impl AttachmentResolver for GraphAttachmentResolver {
    async fn resolve(&self, change: &ChangeValue) -> Result<Vec<String>> {
        let mut request = self
            .client
            .get(format!("{}/{}/attachments", self.base_url, change.post_id));
        if let Some(token) = &self.access_token {
            request = request.query(&[("access_token", token)]);
        }

        let response = request
            .send()
            .await
            .context("Failed to fetch post attachments")?;
        if !response.status().is_success() {
            anyhow::bail!("Attachment lookup failed with status {}", response.status());
        }

        let list: AttachmentList = response
            .json()
            .await
            .context("Failed to parse post attachments")?;

        Ok(image_urls(list))
    }
}

/// Album posts list their images as sub-attachments; single images carry
/// the media directly.
fn image_urls(list: AttachmentList) -> Vec<String> {
    list.data
        .into_iter()
        .flat_map(|attachment| match attachment.subattachments {
            Some(sub) if !sub.data.is_empty() => image_urls(sub),
            _ => attachment
                .media
                .and_then(|m| m.image)
                .map(|image| vec![image.src])
                .unwrap_or_default(),
        })
        .collect()
}
