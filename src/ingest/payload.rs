use serde::{Deserialize, Serialize};

/// Body of a page-feed push delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookFeed {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookChange {
    pub value: ChangeValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeValue {
    pub post_id: String,
    pub from: PostAuthor,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostAuthor {
    pub id: String,
    pub name: String,
}

impl WebhookFeed {
    /// The only change that is processed: the first change of the first entry.
    #[must_use]
    pub fn first_change(&self) -> Option<&ChangeValue> {
        self.entry
            .first()
            .and_then(|entry| entry.changes.first())
            .map(|change| &change.value)
    }
}
