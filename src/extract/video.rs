//! Video metadata from the identifier alone

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{FetchContext, Strategy, StrategyKind};
use crate::cache::cache_key;
use crate::error::ExtractError;
use crate::utils::normalized_host;

/// Path prefixes whose next segment is the video id
const ID_PATH_PREFIXES: &[&str] = &["shorts", "embed", "live", "v", "e"];

fn is_video_id(candidate: &str) -> bool {
    candidate.len() == 11
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Video id from watch, short-link, shorts, embed and live URL shapes.
#[must_use]
pub fn parse_video_id(url: &Url) -> Option<String> {
    let host = normalized_host(url)?;
    let mut segments = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect::<Vec<_>>())
        .unwrap_or_default()
        .into_iter();

    let candidate = if host == "youtu.be" {
        segments.next().map(str::to_string)
    } else {
        match segments.next() {
            Some("watch") => url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned()),
            Some(prefix) if ID_PATH_PREFIXES.contains(&prefix) => {
                segments.next().map(str::to_string)
            }
            _ => None,
        }
    };

    candidate.filter(|id| is_video_id(id))
}

/// Plain document for video-host URLs without an id (home, channel, feed).
fn render_unresolved(url: &Url) -> String {
    format!(
        "# Video\n\n\
         Could not extract a video id from {url}.\n"
    )
}

fn render(id: &str) -> String {
    format!(
        "# Video {id}\n\n\
         ![Video thumbnail](https://img.youtube.com/vi/{id}/hqdefault.jpg)\n\n\
         - Video ID: `{id}`\n\
         - Watch: https://www.youtube.com/watch?v={id}\n\
         - Embed: https://www.youtube.com/embed/{id}\n"
    )
}

pub struct VideoMetadataStrategy {
    ttl: Duration,
}

impl VideoMetadataStrategy {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }
}

#[async_trait]
impl Strategy for VideoMetadataStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::VideoMetadata
    }

    fn shared_cache_ttl(&self) -> Option<Duration> {
        None
    }

    async fn fetch(&self, url: &Url, ctx: &FetchContext<'_>) -> Result<String, ExtractError> {
        let Some(id) = parse_video_id(url) else {
            debug!(url = %url, "No video id in URL");
            return Ok(render_unresolved(url));
        };

        let key = cache_key(self.kind().name(), &id, false);
        ctx.cache
            .get_or_fetch(&key, self.ttl, ctx.bypass_cache, || async {
                Ok::<_, ExtractError>(render(&id))
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(url: &str) -> Option<String> {
        parse_video_id(&Url::parse(url).unwrap())
    }

    #[test]
    fn parses_supported_shapes() {
        let expected = Some("dQw4w9WgXcQ".to_string());
        assert_eq!(id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42"), expected);
        assert_eq!(id("https://youtu.be/dQw4w9WgXcQ?si=abc"), expected);
        assert_eq!(id("https://youtube.com/shorts/dQw4w9WgXcQ"), expected);
        assert_eq!(id("https://www.youtube.com/embed/dQw4w9WgXcQ"), expected);
        assert_eq!(id("https://m.youtube.com/live/dQw4w9WgXcQ"), expected);
    }

    #[test]
    fn rejects_non_video_paths() {
        assert_eq!(id("https://www.youtube.com/@channel"), None);
        assert_eq!(id("https://www.youtube.com/watch?v=short"), None);
        assert_eq!(id("https://www.youtube.com/feed/trending"), None);
    }

    #[test]
    fn missing_id_is_a_plain_document() {
        let doc = render_unresolved(&Url::parse("https://www.youtube.com/").unwrap());
        assert!(doc.starts_with("# Video"));
        assert!(doc.contains("Could not extract a video id from https://www.youtube.com/"));
        assert!(!crate::cache::is_error_body(&doc));
    }

    #[test]
    fn rendered_document_links_the_video() {
        let doc = render("dQw4w9WgXcQ");
        assert!(doc.starts_with("# Video dQw4w9WgXcQ"));
        assert!(doc.contains("watch?v=dQw4w9WgXcQ"));
        assert!(doc.contains("hqdefault.jpg"));
    }
}
