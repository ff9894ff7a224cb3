//! Same-site link discovery over a converted markdown body

use log::{debug, warn};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

use crate::utils::{canonicalize, is_same_site};

static MARKDOWN_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(!?)\[[^\]]{0,500}\]\(<?([^)\s>]{1,2000})>?(?:\s+"[^"]*")?\)"#)
        .expect("MARKDOWN_LINK: hardcoded regex is valid")
});

/// Extensions that point at assets rather than documents
const ASSET_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "bmp", "css", "js", "json", "xml", "pdf",
    "zip", "gz", "tar", "mp3", "mp4", "webm", "mov", "woff", "woff2", "ttf", "eot",
];

fn is_asset(url: &Url) -> bool {
    url.path()
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .is_some_and(|(_, ext)| ASSET_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Up to `max_links` unique same-site document links found in `markdown`,
/// in document order, excluding the seed itself.
///
/// Relative links are resolved against `seed`; fragments are dropped before
/// de-duplication.
#[must_use]
pub fn discover_links(seed: &Url, markdown: &str, max_links: usize) -> Vec<Url> {
    let seed_key = canonicalize(seed);
    let mut seen: HashSet<String> = HashSet::from([seed_key]);
    let mut links = Vec::new();

    for caps in MARKDOWN_LINK.captures_iter(markdown) {
        if links.len() >= max_links {
            break;
        }
        if caps.get(1).is_some_and(|bang| !bang.as_str().is_empty()) {
            continue;
        }
        let Some(href) = caps.get(2).map(|m| m.as_str()) else {
            continue;
        };

        let resolved = match seed.join(href) {
            Ok(url) => url,
            Err(e) => {
                warn!(target: "webdown::crawl", "Skipping unparseable link {href}: {e}");
                continue;
            }
        };
        if !matches!(resolved.scheme(), "http" | "https")
            || !is_same_site(seed, &resolved)
            || is_asset(&resolved)
        {
            continue;
        }

        let key = canonicalize(&resolved);
        if !seen.insert(key.clone()) {
            continue;
        }
        match Url::parse(&key) {
            Ok(url) => links.push(url),
            Err(e) => warn!(target: "webdown::crawl", "Skipping invalid canonical URL {key}: {e}"),
        }
    }

    debug!(
        target: "webdown::crawl",
        "Discovered {} same-site links on {seed}",
        links.len()
    );
    links
}
