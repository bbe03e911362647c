use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::filter::Candidate;
use super::traits::{ProviderKind, SourceAdapter};
use super::{NormalizedPost, ProviderFetchError};
use crate::constants::PROVIDER_PAGE_SIZE;

const NAME: &str = ProviderKind::Safebooru.name();

/// Tags excluded from every Safebooru query.
const EXCLUDED_TAGS: &[&str] = &[
    "-rating:explicit",
    "-*boy*",
    "-*gundam*",
    "-mecha",
    "-ass",
    "-no_humans",
];

/// Safebooru's XML "dapi" endpoint.
pub struct SafebooruAdapter {
    base_url: String,
}

impl SafebooruAdapter {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn post_page(&self, id: u64) -> String {
        format!("{}/index.php?page=post&s=view&id={id}", self.base_url)
    }
}

#[async_trait]
impl SourceAdapter for SafebooruAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Safebooru
    }

    async fn fetch(
        &self,
        client: &reqwest::Client,
        page: u32,
    ) -> Result<Vec<NormalizedPost>, ProviderFetchError> {
        let response = client
            .get(format!("{}/index.php", self.base_url))
            .query(&[
                ("page", "dapi".to_string()),
                ("s", "post".to_string()),
                ("q", "index".to_string()),
                ("pid", page.to_string()),
                ("limit", PROVIDER_PAGE_SIZE.to_string()),
                ("tags", EXCLUDED_TAGS.join(" ")),
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
            .text()
            .await
            .map_err(|source| ProviderFetchError::Transport {
                provider: NAME,
                source,
            })?;

        let candidates = parse_posts(&body)?;
        debug!(provider = NAME, page, count = candidates.len(), "Fetched page");

        let author_link = format!("{}/", self.base_url);
        Ok(candidates
            .into_iter()
            .filter_map(|mut candidate| {
                candidate.author = NAME.to_string();
                candidate.author_link.clone_from(&author_link);
                candidate.normalize(page, |id| self.post_page(id))
            })
            .collect())
    }
}

/// Read `<posts><post .../></posts>` attributes. A body without a `posts`
/// element is what Safebooru returns when it is overloaded.
fn parse_posts(body: &str) -> Result<Vec<Candidate>, ProviderFetchError> {
    let parse_error = |e: scraper::error::SelectorErrorKind<'_>| ProviderFetchError::Parse {
        provider: NAME,
        message: e.to_string(),
    };
    let posts_selector = Selector::parse("posts").map_err(parse_error)?;
    let post_selector = Selector::parse("post").map_err(parse_error)?;

    let document = Html::parse_document(body);
    if document.select(&posts_selector).next().is_none() {
        return Err(ProviderFetchError::Overloaded { provider: NAME });
    }

    Ok(document.select(&post_selector).map(candidate_from).collect())
}

fn candidate_from(element: ElementRef<'_>) -> Candidate {
    let attr = |name: &str| element.value().attr(name).unwrap_or_default().to_string();
    let number = |name: &str| element.value().attr(name).and_then(|v| v.parse::<u64>().ok());

    Candidate {
        id: number("id"),
        parent_id: number("parent_id"),
        source: attr("source"),
        sample: attr("sample_url"),
        smaller_sample: attr("preview_url"),
        file_url: attr("file_url"),
        width: number("width").unwrap_or_default() as u32,
        height: number("height").unwrap_or_default() as u32,
        ..Candidate::default()
    }
}
