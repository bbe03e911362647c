use futures_util::future::join_all;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, error};

use super::traits::SourceAdapter;
use super::{NormalizedPost, ProviderFetchError};
use crate::constants::MAX_PROVIDER_PAGE;

/// Result of one poll across every adapter.
#[derive(Debug, Default)]
pub struct AggregateOutcome {
    /// Merged, tagged and shuffled posts.
    pub posts: Vec<NormalizedPost>,
    /// One entry per adapter that failed this poll.
    pub errors: Vec<ProviderFetchError>,
}

/// Registry of source adapters sharing one HTTP client.
pub struct Aggregator {
    client: reqwest::Client,
    adapters: Vec<Box<dyn SourceAdapter>>,
}

impl Aggregator {
    /// Create an aggregator with no adapters.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            adapters: Vec::new(),
        }
    }

    /// Register an adapter.
    pub fn register(&mut self, adapter: Box<dyn SourceAdapter>) {
        self.adapters.push(adapter);
    }

    /// Get all registered adapters.
    #[must_use]
    pub fn adapters(&self) -> &[Box<dyn SourceAdapter>] {
        &self.adapters
    }

    /// Poll every adapter once.
    ///
    /// Each adapter gets its own random page. A failing adapter contributes
    /// nothing and is reported in [`AggregateOutcome::errors`]; the others are
    /// unaffected. Nothing is retried.
    pub async fn fetch(&self) -> AggregateOutcome {
        let pages: Vec<u32> = {
            let mut rng = rand::thread_rng();
            self.adapters
                .iter()
                .map(|_| rng.gen_range(0..MAX_PROVIDER_PAGE))
                .collect()
        };

        let results = join_all(
            self.adapters
                .iter()
                .zip(pages)
                .map(|(adapter, page)| adapter.fetch(&self.client, page)),
        )
        .await;

        let mut outcome = AggregateOutcome::default();
        for (adapter, result) in self.adapters.iter().zip(results) {
            match result {
                Ok(posts) => {
                    debug!(provider = adapter.name(), count = posts.len(), "Provider polled");
                    outcome.posts.extend(posts.into_iter().map(|mut post| {
                        post.provider_name = Some(adapter.name().to_string());
                        post
                    }));
                }
                Err(e) => {
                    error!("{e}");
                    outcome.errors.push(e);
                }
            }
        }

        shuffle(&mut outcome.posts);
        outcome
    }
}

/// Uniform random permutation (Fisher-Yates).
pub fn shuffle<T>(items: &mut [T]) {
    items.shuffle(&mut rand::thread_rng());
}
