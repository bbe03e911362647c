use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backend::CurationBackend;
use super::viewer::{ItemMetadata, Viewer};
use super::SessionError;
use crate::constants::ANNOTATION_DELIMITER;
use crate::db::NewQueuedPost;
use crate::providers::NormalizedPost;

/// Served images between preload passes.
const PRELOAD_EVERY: u32 = 5;

/// Upcoming images primed per preload pass.
const PRELOAD_DEPTH: usize = 9;

/// Refills in a row that may yield nothing displayable before giving up.
const MAX_EMPTY_REFILLS: u32 = 3;

const EMPTY_CACHE_ALERT: &str = "No images available right now.";

const MISSING_ANNOTATION_ALERT: &str =
    "Warning message must be added if Flag as Suggestive enabled.";

/// Decision inputs, each bound to one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Discard the current item.
    Skip,
    Approve,
    FlagExplicit,
    TogglePreview,
}

impl Action {
    /// Key binding: Shift skips (not with Ctrl), Enter approves, E flags, Q
    /// switches preview resolution.
    #[must_use]
    pub fn from_key(key: &str, ctrl: bool) -> Option<Self> {
        match key {
            "Shift" if !ctrl => Some(Self::Skip),
            "Enter" => Some(Self::Approve),
            "e" | "E" => Some(Self::FlagExplicit),
            "q" | "Q" => Some(Self::TogglePreview),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// A render or request is in flight; decisions are ignored.
    Locked,
    /// Waiting for a decision on the current item.
    Idle,
}

/// Result of a key release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Ignored,
    Skipped,
    Approved,
    FlagToggled(bool),
    PreviewToggled(bool),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Fetches the moderator had to wait on with both buffers empty.
    pub cold_fetches: u32,
    /// Background fetches started.
    pub prefetches: u32,
    /// Times the secondary buffer became the primary.
    pub promotions: u32,
}

/// Mutable session state, owned by exactly one [`ModerationSession`].
#[derive(Debug)]
pub struct SessionState {
    primary: VecDeque<NormalizedPost>,
    prefetch: VecDeque<NormalizedPost>,
    pending: Option<JoinHandle<anyhow::Result<Vec<NormalizedPost>>>>,
    phase: Phase,
    served: u32,
    pressed: HashSet<Action>,
    flag_explicit: bool,
    small_preview: bool,
    annotation: String,
    caption: String,
    approved: u32,
    last_approved: Option<String>,
    stats: SessionStats,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            primary: VecDeque::new(),
            prefetch: VecDeque::new(),
            pending: None,
            phase: Phase::Locked,
            served: 0,
            pressed: HashSet::new(),
            flag_explicit: false,
            small_preview: false,
            annotation: String::new(),
            caption: String::new(),
            approved: 0,
            last_approved: None,
            stats: SessionStats::default(),
        }
    }
}

impl Drop for SessionState {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}

/// Human curation loop over a double-buffered candidate cache.
pub struct ModerationSession<B: CurationBackend, V: Viewer> {
    backend: Arc<B>,
    viewer: V,
    endpoint: String,
    token: Option<String>,
    state: SessionState,
}

impl<B: CurationBackend, V: Viewer> ModerationSession<B, V> {
    /// `endpoint` is the web service route prefix used for relayed images.
    pub fn new(backend: Arc<B>, viewer: V, endpoint: &str) -> Self {
        Self {
            backend,
            viewer,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: None,
            state: SessionState::default(),
        }
    }

    /// Verify the login, fill the cache and show the first item.
    ///
    /// # Errors
    ///
    /// [`SessionError::Unauthenticated`] without a valid login; fetch errors
    /// leave the session locked.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        let token = self
            .backend
            .verify()
            .await
            .map_err(SessionError::Fetch)?
            .ok_or(SessionError::Unauthenticated)?;
        self.token = Some(token);
        info!("Moderation session started");
        self.show_current().await
    }

    /// Record a key press. Releases only act after a matching press.
    pub fn key_down(&mut self, action: Action) {
        if self.state.phase == Phase::Idle {
            self.state.pressed.insert(action);
        }
    }

    /// Apply a key release.
    ///
    /// # Errors
    ///
    /// Approval validation and submit failures, and fetch failures while
    /// advancing.
    pub async fn key_up(&mut self, action: Action) -> Result<Transition, SessionError> {
        if self.state.phase == Phase::Locked || !self.state.pressed.remove(&action) {
            return Ok(Transition::Ignored);
        }

        match action {
            Action::Skip => {
                self.advance().await?;
                Ok(Transition::Skipped)
            }
            Action::Approve => {
                self.approve().await?;
                Ok(Transition::Approved)
            }
            Action::FlagExplicit => {
                self.state.flag_explicit = !self.state.flag_explicit;
                if !self.state.flag_explicit {
                    self.state.annotation.clear();
                }
                Ok(Transition::FlagToggled(self.state.flag_explicit))
            }
            Action::TogglePreview => {
                self.state.small_preview = !self.state.small_preview;
                self.render()?;
                Ok(Transition::PreviewToggled(self.state.small_preview))
            }
        }
    }

    /// The viewer finished loading (or failed to load) the current image.
    pub fn image_loaded(&mut self) {
        self.state.phase = Phase::Idle;

        if self.state.served >= PRELOAD_EVERY {
            let urls: Vec<String> = self
                .state
                .primary
                .iter()
                .take(PRELOAD_DEPTH)
                .filter_map(|post| self.full_url(post))
                .collect();
            debug!(count = urls.len(), "Preloading upcoming images");
            self.viewer.preload(&urls);
            self.state.served = 0;
        }
    }

    /// Optional text placed above the source link of the next approval.
    pub fn set_caption(&mut self, caption: &str) {
        caption.clone_into(&mut self.state.caption);
    }

    /// Reason attached to an explicit flag.
    pub fn set_annotation(&mut self, annotation: &str) {
        annotation.clone_into(&mut self.state.annotation);
    }

    #[must_use]
    pub fn current(&self) -> Option<&NormalizedPost> {
        self.state.primary.front()
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.state.phase
    }

    #[must_use]
    pub const fn flag_explicit(&self) -> bool {
        self.state.flag_explicit
    }

    #[must_use]
    pub const fn small_preview(&self) -> bool {
        self.state.small_preview
    }

    #[must_use]
    pub const fn approved(&self) -> u32 {
        self.state.approved
    }

    #[must_use]
    pub fn last_approved(&self) -> Option<&str> {
        self.state.last_approved.as_deref()
    }

    #[must_use]
    pub const fn stats(&self) -> SessionStats {
        self.state.stats
    }

    /// Items in the serving buffer, current included.
    #[must_use]
    pub fn primary_len(&self) -> usize {
        self.state.primary.len()
    }

    #[must_use]
    pub fn prefetch_len(&self) -> usize {
        self.state.prefetch.len()
    }

    #[must_use]
    pub fn viewer(&self) -> &V {
        &self.viewer
    }

    async fn approve(&mut self) -> Result<(), SessionError> {
        let head = self.current().cloned().ok_or(SessionError::NoCurrent)?;

        let annotation = self.state.annotation.clone();
        if self.state.flag_explicit && annotation.is_empty() {
            self.viewer.alert(MISSING_ANNOTATION_ALERT);
            return Err(SessionError::MissingAnnotation);
        }

        let mut message = head.message.clone();
        if !self.state.caption.is_empty() {
            message = format!("{}\n{message}", self.state.caption);
        }
        if self.state.flag_explicit {
            message = format!("{message}{ANNOTATION_DELIMITER}{annotation}");
        }

        let post = NewQueuedPost {
            post_id: head.post_id.clone(),
            author: head.author.clone(),
            author_link: head.author_link.clone(),
            message,
            attachments: head.attachments.clone(),
            provider: head.provider.clone(),
            is_explicit: self.state.flag_explicit,
            links: None,
        };
        let preview = self.full_url(&head);

        self.state.phase = Phase::Locked;
        if let Err(e) = self.backend.submit(&post).await {
            self.state.phase = Phase::Idle;
            warn!(post_id = %post.post_id, "Approval failed: {e:#}");
            self.viewer.alert("Failed to submit post.");
            return Err(SessionError::Submit(e));
        }

        self.state.approved += 1;
        self.state.last_approved = preview;
        info!(post_id = %post.post_id, approved = self.state.approved, "Approved post");

        self.advance().await
    }

    /// Drop the current item and show the next one.
    async fn advance(&mut self) -> Result<(), SessionError> {
        self.state.primary.pop_front();
        self.state.caption.clear();
        self.state.flag_explicit = false;
        self.state.annotation.clear();
        self.show_current().await
    }

    /// Show the head of the primary buffer, refilling and auto-skipping
    /// items without any image as needed.
    async fn show_current(&mut self) -> Result<(), SessionError> {
        self.state.phase = Phase::Locked;
        let mut refills = 0;

        loop {
            if self.state.primary.is_empty() {
                if refills == MAX_EMPTY_REFILLS {
                    warn!(refills, "No displayable posts after repeated refills");
                    self.viewer.alert(EMPTY_CACHE_ALERT);
                    return Err(SessionError::EmptyFetch);
                }
                refills += 1;
                self.refill().await?;
            }
            let has_image = self
                .state
                .primary
                .front()
                .map(|post| self.full_url(post).is_some());
            match has_image {
                Some(true) => break,
                Some(false) => {
                    if let Some(post) = self.state.primary.pop_front() {
                        debug!(post_id = %post.post_id, "Skipping post without image");
                    }
                }
                None => return Err(SessionError::EmptyFetch),
            }
        }

        self.state.served += 1;
        self.render()
    }

    fn render(&mut self) -> Result<(), SessionError> {
        let post = self.current().ok_or(SessionError::NoCurrent)?;
        let url = if self.state.small_preview && !post.smaller_sample.is_empty() {
            post.smaller_sample.clone()
        } else {
            self.full_url(post).ok_or(SessionError::NoCurrent)?
        };

        let metadata = ItemMetadata {
            provider: post
                .provider_name
                .clone()
                .unwrap_or_else(|| "No Provider".to_string()),
            page: post.pid,
            source: post.message.clone(),
            author: post.author.clone(),
            width: post.width,
            height: post.height,
            images_left: self.state.primary.len() + self.state.prefetch.len(),
            approved: self.state.approved,
            last_approved: self.state.last_approved.clone(),
        };

        self.state.phase = Phase::Locked;
        self.viewer.show(&url, &metadata);
        Ok(())
    }

    /// Refill an empty primary buffer.
    ///
    /// A warm secondary buffer is promoted; otherwise the caller waits on a
    /// cold fetch. Either way a background fetch is started for the next
    /// secondary buffer.
    async fn refill(&mut self) -> Result<(), SessionError> {
        let token = self.token.clone().ok_or(SessionError::Unauthenticated)?;

        if let Some(pending) = self.state.pending.take() {
            match pending.await {
                Ok(Ok(posts)) => self.state.prefetch.extend(posts),
                Ok(Err(e)) => warn!("Background fetch failed: {e:#}"),
                Err(e) => warn!("Background fetch task failed: {e}"),
            }
        }

        if self.state.prefetch.is_empty() {
            let posts = self
                .backend
                .fetch_posts(&token)
                .await
                .map_err(SessionError::Fetch)?;
            self.state.stats.cold_fetches += 1;
            if posts.is_empty() {
                return Err(SessionError::EmptyFetch);
            }
            debug!(count = posts.len(), "Cache filled");
            self.state.primary.extend(posts);
        } else {
            std::mem::swap(&mut self.state.primary, &mut self.state.prefetch);
            self.state.stats.promotions += 1;
            debug!(count = self.state.primary.len(), "Promoted prefetched cache");
        }

        let backend = Arc::clone(&self.backend);
        self.state.pending = Some(tokio::spawn(
            async move { backend.fetch_posts(&token).await },
        ));
        self.state.stats.prefetches += 1;
        Ok(())
    }

    /// Relayed full-resolution URL, if the post has any image.
    fn full_url(&self, post: &NormalizedPost) -> Option<String> {
        let source = Some(post.sample.as_str())
            .filter(|s| !s.is_empty())
            .or_else(|| post.attachments.first().map(String::as_str))
            .filter(|s| !s.is_empty())?;
        Some(format!(
            "{}/client/uncors?url={}",
            self.endpoint,
            urlencoding::encode(source)
        ))
    }
}
