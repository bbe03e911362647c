//! Polled third-party image sources.
//!
//! Each source is a [`SourceAdapter`]; the [`Aggregator`] queries all of them
//! independently, keeps only records with a resolvable id and an acceptable
//! source link, tags them with the provider name and shuffles the merged list.

mod aggregator;
mod filter;
mod konachan;
mod safebooru;
mod traits;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use aggregator::{AggregateOutcome, Aggregator};
pub use filter::{is_allowed_source, is_page_source};
pub use konachan::KonachanAdapter;
pub use safebooru::SafebooruAdapter;
pub use traits::{ProviderKind, SourceAdapter};

use crate::config::Config;

/// A provider-agnostic candidate image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedPost {
    pub post_id: String,
    pub author: String,
    pub author_link: String,
    pub message: String,
    pub sample: String,
    pub smaller_sample: String,
    pub attachments: Vec<String>,
    /// Provider credited in the published caption, if any.
    pub provider: Option<String>,
    /// Name of the adapter that produced this record.
    #[serde(default)]
    pub provider_name: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Source page the record came from.
    pub pid: u32,
}

/// A single adapter's failure for one poll.
#[derive(Debug, Error)]
pub enum ProviderFetchError {
    #[error("[{provider}] Server overload!")]
    Overloaded { provider: &'static str },
    #[error("[{provider}] request failed: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("[{provider}] unexpected status {status}")]
    Status { provider: &'static str, status: u16 },
    #[error("[{provider}] malformed response: {message}")]
    Parse {
        provider: &'static str,
        message: String,
    },
}

impl ProviderFetchError {
    #[must_use]
    pub const fn provider(&self) -> &'static str {
        match self {
            Self::Overloaded { provider }
            | Self::Transport { provider, .. }
            | Self::Status { provider, .. }
            | Self::Parse { provider, .. } => provider,
        }
    }
}

/// Aggregator over every built-in source, configured from `config`.
#[must_use]
pub fn default_aggregator(config: &Config, client: reqwest::Client) -> Aggregator {
    let mut aggregator = Aggregator::new(client);
    aggregator.register(Box::new(SafebooruAdapter::new(&config.safebooru_url)));
    aggregator.register(Box::new(KonachanAdapter::new(&config.konachan_url)));
    aggregator
}
