use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::filter::Candidate;
use super::traits::{ProviderKind, SourceAdapter};
use super::{NormalizedPost, ProviderFetchError};
use crate::constants::PROVIDER_PAGE_SIZE;

const NAME: &str = ProviderKind::Konachan.name();

/// Konachan's JSON post listing, safe rating only.
pub struct KonachanAdapter {
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct KonachanPost {
    id: Option<u64>,
    parent_id: Option<u64>,
    #[serde(default)]
    author: String,
    creator_id: Option<u64>,
    #[serde(default)]
    source: String,
    #[serde(default)]
    file_url: String,
    #[serde(default)]
    sample_url: String,
    #[serde(default)]
    preview_url: String,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
}

impl KonachanAdapter {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn candidate(&self, post: KonachanPost) -> Candidate {
        Candidate {
            id: post.id,
            parent_id: post.parent_id,
            source: post.source,
            author: post.author,
            author_link: format!(
                "{}/user/show/{}",
                self.base_url,
                post.creator_id.unwrap_or_default()
            ),
            sample: post.sample_url,
            smaller_sample: post.preview_url,
            file_url: post.file_url,
            provider: Some(NAME.to_string()),
            width: post.width,
            height: post.height,
        }
    }
}

#[async_trait]
impl SourceAdapter for KonachanAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Konachan
    }

    async fn fetch(
        &self,
        client: &reqwest::Client,
        page: u32,
    ) -> Result<Vec<NormalizedPost>, ProviderFetchError> {
        let response = client
            .get(format!("{}/post.json", self.base_url))
            .query(&[
                ("limit", PROVIDER_PAGE_SIZE.to_string()),
                ("page", page.to_string()),
                ("tags", "rating:s".to_string()),
            ])
            .send()
            .await
            .map_err(|source| ProviderFetchError::Transport {
                provider: NAME,
                source,
            })?;

        if !response.status().is_success() {
            return Err(ProviderFetchError::Status {
                provider: NAME,
                status: response.status().as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| ProviderFetchError::Transport {
                provider: NAME,
                source,
            })?;

        // An overloaded Konachan answers with an empty or null body.
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(ProviderFetchError::Overloaded { provider: NAME });
        }
        let posts: Option<Vec<KonachanPost>> =
            serde_json::from_slice(&body).map_err(|e| ProviderFetchError::Parse {
                provider: NAME,
                message: e.to_string(),
            })?;
        let Some(posts) = posts else {
            return Err(ProviderFetchError::Overloaded { provider: NAME });
        };

        debug!(provider = NAME, page, count = posts.len(), "Fetched page");

        Ok(posts
            .into_iter()
            .filter_map(|post| {
                self.candidate(post)
                    .normalize(page, |id| format!("{}/post/show/{id}", self.base_url))
            })
            .collect())
    }
}
