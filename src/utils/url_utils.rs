//! URL helpers shared by validation, routing and crawl link discovery.

use url::Url;

/// Parse a caller-supplied identifier, accepting only absolute http(s) URLs.
#[must_use]
pub fn parse_http_url(raw: &str) -> Option<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    match Url::parse(trimmed) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some() => {
            Some(parsed)
        }
        _ => None,
    }
}

/// Host with a leading `www.` removed, lowercased.
#[must_use]
pub fn normalized_host(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(match host.strip_prefix("www.") {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => host,
    })
}

/// Whether two URLs point at the same site (host equality modulo `www.`).
#[must_use]
pub fn is_same_site(a: &Url, b: &Url) -> bool {
    match (normalized_host(a), normalized_host(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Canonical form used to de-duplicate crawl targets: fragment dropped,
/// trailing slash on non-root paths removed.
#[must_use]
pub fn canonicalize(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    let mut s = url.to_string();
    if url.path() != "/" && url.query().is_none() && s.ends_with('/') {
        s.pop();
    }
    s
}
