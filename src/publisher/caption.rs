use std::fmt::Write;

use crate::constants::{ANNOTATION_DELIMITER, BOOSTED_TAG, DEFAULT_WARNING_REASON};
use crate::db::LinkMap;

const UPSCALE_CREDIT: &str =
    "Upscaled by: [Real-CUGAN](https://github.com/bilibili/ailab/tree/main/Real-CUGAN)";

/// Everything needed to caption one queued post.
#[derive(Debug, Clone, Copy)]
pub struct CaptionInput<'a> {
    pub message: &'a str,
    pub author: &'a str,
    pub author_link: &'a str,
    pub provider: Option<&'a str>,
    pub boosted: bool,
    pub explicit: bool,
    pub upscaled: bool,
    pub links: Option<&'a LinkMap>,
    pub tags: &'a str,
}

/// Status text plus an optional content warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caption {
    pub status: String,
    pub spoiler_text: Option<String>,
}

/// Split a stored message into its public body and moderator annotation.
#[must_use]
pub fn split_annotation(message: &str) -> (&str, Option<&str>) {
    match message.split_once(ANNOTATION_DELIMITER) {
        Some((body, annotation)) => (body, Some(annotation.trim()).filter(|a| !a.is_empty())),
        None => (message, None),
    }
}

#[must_use]
pub fn compose(input: &CaptionInput<'_>) -> Caption {
    let (body, annotation) = split_annotation(input.message);

    let mut status = format!("{}\n\n", body.trim_end());
    if input.boosted {
        let _ = write!(
            status,
            "Artist of the Month (AOTM): [{}]({})",
            input.author, input.author_link
        );
    } else if let Some(provider) = input.provider {
        let _ = write!(
            status,
            "Posted by: [{} ({provider})]({})",
            input.author, input.author_link
        );
    } else {
        let _ = write!(status, "Posted by: [{}]({})", input.author, input.author_link);
    }

    if input.upscaled {
        status.push('\n');
        status.push_str(UPSCALE_CREDIT);
    }

    if input.boosted {
        if let Some(links) = input.links.filter(|l| !l.is_empty()) {
            for (name, url) in links {
                let _ = write!(status, "\n- [{name}]({url})");
            }
        }
    }

    status.push_str("\n\n");
    status.push_str(input.tags);
    if input.boosted {
        status.push(' ');
        status.push_str(BOOSTED_TAG);
    }

    let spoiler_text = input.explicit.then(|| {
        format!(
            "⚠️ Flagged as suggestive. Reason: {}",
            annotation.unwrap_or(DEFAULT_WARNING_REASON)
        )
    });

    Caption {
        status,
        spoiler_text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(message: &str) -> CaptionInput<'_> {
        CaptionInput {
            message,
            author: "Miku",
            author_link: "https://facebook.com/1",
            provider: None,
            boosted: false,
            explicit: false,
            upscaled: false,
            links: None,
            tags: "#moe",
        }
    }

    #[test]
    fn test_split_annotation() {
        assert_eq!(split_annotation("hi<>too lewd"), ("hi", Some("too lewd")));
        assert_eq!(split_annotation("hi<>"), ("hi", None));
        assert_eq!(split_annotation("hi"), ("hi", None));
    }

    #[test]
    fn test_default_caption() {
        let caption = compose(&input("Look at this"));
        assert_eq!(
            caption.status,
            "Look at this\n\nPosted by: [Miku](https://facebook.com/1)\n\n#moe"
        );
        assert_eq!(caption.spoiler_text, None);
    }

    #[test]
    fn test_provider_and_upscale_credit() {
        let caption = compose(&CaptionInput {
            provider: Some("Facebook"),
            upscaled: true,
            ..input("src")
        });
        assert!(caption
            .status
            .contains("Posted by: [Miku (Facebook)](https://facebook.com/1)\nUpscaled by: [Real-CUGAN]"));
    }

    #[test]
    fn test_boosted_caption_has_links_and_tag() {
        let links = LinkMap::from([
            ("Twitter".to_string(), "https://x.com/miku".to_string()),
            ("Pixiv".to_string(), "https://pixiv.net/u/1".to_string()),
        ]);
        let caption = compose(&CaptionInput {
            boosted: true,
            provider: Some("Pixiv"),
            links: Some(&links),
            ..input("AOTM!")
        });
        assert_eq!(
            caption.status,
            "AOTM!\n\nArtist of the Month (AOTM): [Miku](https://facebook.com/1)\n\
             - [Twitter](https://x.com/miku)\n- [Pixiv](https://pixiv.net/u/1)\n\n#moe #aotm"
        );
    }

    #[test]
    fn test_links_ignored_for_default_items() {
        let links = LinkMap::from([("Pixiv".to_string(), "https://pixiv.net/u/1".to_string())]);
        let caption = compose(&CaptionInput {
            links: Some(&links),
            ..input("x")
        });
        assert!(!caption.status.contains("- [Pixiv]"));
    }

    #[test]
    fn test_explicit_warning() {
        let flagged = compose(&CaptionInput {
            explicit: true,
            ..input("x<>swimsuit")
        });
        assert_eq!(
            flagged.spoiler_text.as_deref(),
            Some("⚠️ Flagged as suggestive. Reason: swimsuit")
        );
        assert!(!flagged.status.contains("swimsuit"));

        let unannotated = compose(&CaptionInput {
            explicit: true,
            ..input("x")
        });
        assert_eq!(
            unannotated.spoiler_text.as_deref(),
            Some("⚠️ Flagged as suggestive. Reason: Idk, looks suggestive to me.")
        );
    }
}
