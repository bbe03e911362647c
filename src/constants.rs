//! Shared constants used across the application.

/// Tag suffix appended to every published caption.
pub const DEFAULT_TAGS: &str = "#cute #moe #anime #artwork #mastoart #dotmoe";

/// Extra tag for boosted (artist of the month) posts.
pub const BOOSTED_TAG: &str = "#aotm";

/// Reserved post id marker for boosted items.
pub const BOOST_MARKER: &str = "aotm";

/// Failed items the publisher may abandon before it gives up for this run.
pub const MAX_TRIES: u32 = 3;

/// Separator between a curated message and its explicit-content annotation.
pub const ANNOTATION_DELIMITER: &str = "<>";

/// Content warning fallback when an explicit item has no annotation.
pub const DEFAULT_WARNING_REASON: &str = "Idk, looks suggestive to me.";

/// Images wider than this are downsized before upload.
pub const MAX_IMAGE_WIDTH: u32 = 3840;

/// Target width for downsized images.
pub const RESIZED_WIDTH: u32 = 2500;

/// Highest random page requested from booru providers.
pub const MAX_PROVIDER_PAGE: u32 = 8000;

/// Posts requested per provider page.
pub const PROVIDER_PAGE_SIZE: u32 = 20;

/// User agent for outbound requests.
pub const USER_AGENT: &str = concat!("dotmoe/", env!("CARGO_PKG_VERSION"));
