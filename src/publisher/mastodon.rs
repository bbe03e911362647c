use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::PublishError;
use crate::imaging::ProcessedImage;

/// A status ready to be published.
#[derive(Debug, Clone, Serialize)]
pub struct StatusRequest {
    pub status: String,
    pub visibility: String,
    pub media_ids: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub sensitive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spoiler_text: Option<String>,
}

/// Social network operations the publisher needs.
#[async_trait]
pub trait SocialClient: Send + Sync {
    /// Upload one image, returning its media id.
    async fn upload_media(
        &self,
        image: &ProcessedImage,
        file_name: &str,
    ) -> Result<String, PublishError>;

    /// Publish a status, returning its id.
    async fn post_status(&self, status: &StatusRequest) -> Result<String, PublishError>;
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

/// Mastodon REST client.
#[derive(Clone)]
pub struct MastodonClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl MastodonClient {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: &str, token: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    async fn read_id(response: reqwest::Response) -> Result<String, String> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("HTTP {status}: {body}"));
        }
        response
            .json::<IdResponse>()
            .await
            .map(|r| r.id)
            .map_err(|e| format!("invalid response: {e}"))
    }
}

#[async_trait]
impl SocialClient for MastodonClient {
    async fn upload_media(
        &self,
        image: &ProcessedImage,
        file_name: &str,
    ) -> Result<String, PublishError> {
        let part = Part::bytes(image.bytes.clone())
            .file_name(file_name.to_string())
            .mime_str(image.mime)?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/api/v2/media", self.base_url))
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await?;

        let id = Self::read_id(response).await.map_err(PublishError::Upload)?;
        debug!(media_id = %id, file_name, "Uploaded media");
        Ok(id)
    }

    async fn post_status(&self, status: &StatusRequest) -> Result<String, PublishError> {
        let response = self
            .client
            .post(format!("{}/api/v1/statuses", self.base_url))
            .bearer_auth(&self.token)
            .json(status)
            .send()
            .await?;

        Self::read_id(response).await.map_err(PublishError::Status)
    }
}
