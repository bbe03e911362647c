/// What the viewer shows next to the current image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemMetadata {
    pub provider: String,
    pub page: u32,
    pub source: String,
    pub author: String,
    pub width: u32,
    pub height: u32,
    pub images_left: usize,
    pub approved: u32,
    pub last_approved: Option<String>,
}

impl ItemMetadata {
    #[must_use]
    pub fn size(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Presentation surface driven by a moderation session.
///
/// `show` starts loading an image; the surface reports completion through
/// [`ModerationSession::image_loaded`](super::ModerationSession::image_loaded).
pub trait Viewer {
    fn show(&mut self, url: &str, metadata: &ItemMetadata);

    /// Warm the client cache; best effort.
    fn preload(&mut self, urls: &[String]);

    fn alert(&mut self, message: &str);
}
