use indexmap::IndexMap;

use serde::{Deserialize, Serialize};

use crate::constants::BOOST_MARKER;

/// Which of the two post tables an item lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueKind {
    /// Ordinary items, served FIFO.
    Default,
    /// Artist-of-the-month items, always served before default items.
    Boosted,
}

impl QueueKind {
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Default => "default_posts",
            Self::Boosted => "boosted_posts",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Boosted => "boosted",
        }
    }

    /// Dequeue order: boosted first.
    pub const ALL: [Self; 2] = [Self::Boosted, Self::Default];
}

/// External links of a boosted post, name to URL, in submission order.
pub type LinkMap = IndexMap<String, String>;

/// A post waiting to be enqueued. This is also the JSON body of the curated
/// submission endpoint, so unknown fields (sample URLs, sizes) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQueuedPost {
    pub post_id: String,
    pub author: String,
    pub author_link: String,
    #[serde(default)]
    pub message: String,
    pub attachments: Vec<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default, alias = "isExplicit")]
    pub is_explicit: bool,
    #[serde(default)]
    pub links: Option<LinkMap>,
}

impl NewQueuedPost {
    /// Boosted items carry external links or the reserved id marker.
    #[must_use]
    pub fn queue_kind(&self) -> QueueKind {
        if self.links.is_some() || self.post_id.contains(BOOST_MARKER) {
            QueueKind::Boosted
        } else {
            QueueKind::Default
        }
    }
}

/// A persisted queue row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QueuedPost {
    pub id: i64,
    pub post_id: String,
    pub author: String,
    pub author_link: String,
    pub message: String,
    /// JSON array of URLs.
    pub attachments: String,
    pub provider: Option<String>,
    pub is_explicit: bool,
    /// JSON object of link name to URL.
    pub links: Option<String>,
}

impl QueuedPost {
    /// Decode the stored attachment list.
    pub fn attachment_urls(&self) -> serde_json::Result<Vec<String>> {
        serde_json::from_str(&self.attachments)
    }

    /// Decode the stored external links in submission order.
    pub fn link_map(&self) -> serde_json::Result<Option<LinkMap>> {
        self.links.as_deref().map(serde_json::from_str).transpose()
    }
}

/// A moderator credential.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub email: String,
    pub password_hash: String,
}

/// A logged-in moderation session.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub id: i64,
    /// Value of the `session` cookie.
    pub cookie: String,
    pub email: String,
    /// Bearer token handed to the client by the verify endpoint.
    pub token: String,
    pub expires_at: String,
    pub created_at: String,
}
