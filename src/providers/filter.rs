use super::NormalizedPost;

/// Source links must look like a web address; anything else is blocked.
#[must_use]
pub fn is_allowed_source(source: &str) -> bool {
    source.starts_with("http") || source.starts_with("www")
}

/// Whether the source link is a real page rather than a direct image file.
#[must_use]
pub fn is_page_source(source: &str) -> bool {
    !(source.is_empty()
        || source.contains(".jpg")
        || source.contains(".jpeg")
        || source.contains(".png"))
}

/// One raw record from a provider, before filtering.
#[derive(Debug, Clone, Default)]
pub(crate) struct Candidate {
    pub id: Option<u64>,
    pub parent_id: Option<u64>,
    pub source: String,
    pub author: String,
    pub author_link: String,
    pub sample: String,
    pub smaller_sample: String,
    pub file_url: String,
    pub provider: Option<String>,
    pub width: u32,
    pub height: u32,
}

impl Candidate {
    fn post_id(&self) -> Option<u64> {
        self.id
            .filter(|id| *id != 0)
            .or_else(|| self.parent_id.filter(|id| *id != 0))
    }

    /// Apply the inclusion rules. `page_url` builds the provider's own page
    /// for a post id, used when the source link is missing or a bare image.
    pub fn normalize(
        self,
        pid: u32,
        page_url: impl FnOnce(u64) -> String,
    ) -> Option<NormalizedPost> {
        let post_id = self.post_id()?;
        if !is_allowed_source(&self.source) || self.file_url.is_empty() {
            return None;
        }

        let message = if is_page_source(&self.source) {
            self.source
        } else {
            page_url(post_id)
        };

        Some(NormalizedPost {
            post_id: post_id.to_string(),
            author: self.author,
            author_link: self.author_link,
            message,
            sample: self.sample,
            smaller_sample: self.smaller_sample,
            attachments: vec![self.file_url],
            provider: self.provider,
            provider_name: None,
            width: self.width,
            height: self.height,
            pid,
        })
    }
}
