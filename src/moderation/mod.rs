//! Moderator review loop.
//!
//! A [`ModerationSession`] owns all curation state for one logged-in
//! moderator. It is driven by key events and image-load notifications from a
//! [`Viewer`] and talks to the web service through a [`CurationBackend`].

mod backend;
mod session;
mod viewer;

use thiserror::Error;

pub use backend::{CurationBackend, HttpCurationClient};
pub use session::{Action, ModerationSession, Phase, SessionState, SessionStats, Transition};
pub use viewer::{ItemMetadata, Viewer};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("not logged in")]
    Unauthenticated,
    #[error("failed to fetch posts: {0:#}")]
    Fetch(anyhow::Error),
    #[error("server returned no posts")]
    EmptyFetch,
    #[error("failed to submit post: {0:#}")]
    Submit(anyhow::Error),
    #[error("a warning message is required when flagged as suggestive")]
    MissingAnnotation,
    #[error("no post is being shown")]
    NoCurrent,
}
