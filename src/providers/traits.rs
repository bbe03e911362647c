use async_trait::async_trait;

use super::{NormalizedPost, ProviderFetchError};

/// The fixed set of source kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Safebooru,
    Konachan,
}

impl ProviderKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Safebooru => "Safebooru",
            Self::Konachan => "Konachan",
        }
    }
}

/// A polled image source.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Which source this adapter talks to.
    fn kind(&self) -> ProviderKind;

    /// Name used to tag records and errors.
    fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Fetch one page of normalized posts.
    ///
    /// Records without a resolvable id or with a blocked source link are
    /// already dropped. No retry happens here.
    async fn fetch(
        &self,
        client: &reqwest::Client,
        page: u32,
    ) -> Result<Vec<NormalizedPost>, ProviderFetchError>;
}
