//! JavaScript evaluated inside rendered pages

/// Readiness snapshot polled while waiting for a page to settle
pub const READY_STATE_SCRIPT: &str = r"
    (() => ({
        readyState: document.readyState,
        imagesLoaded: Array.from(document.images).every(img => img.complete),
        bodyExists: document.body !== null
    }))()
";

/// Visible text of the body, used when structured extraction yields nothing
pub const BODY_TEXT_SCRIPT: &str = r"
    (() => document.body ? document.body.innerText : '')()
";

/// Scroll to the bottom to trigger lazy-loaded timeline content
pub const SCROLL_SCRIPT: &str = r"
    (() => {
        window.scrollTo(0, document.body ? document.body.scrollHeight : 0);
        return document.body ? document.body.scrollHeight : 0;
    })()
";

/// Profile header and up to 10 distinct post texts.
///
/// Posts are read from `article` elements, preferring the dedicated text
/// node when one exists. Very short fragments (buttons, counters) are skipped.
pub const PROFILE_POSTS_SCRIPT: &str = r#"
    (() => {
        const text = el => (el?.innerText || '').trim();
        const name = text(document.querySelector('[data-testid="UserName"]'))
            .split('\n')[0] || document.title || '';
        const bio = text(document.querySelector('[data-testid="UserDescription"]'));

        const seen = new Set();
        const posts = [];
        for (const article of document.querySelectorAll('article')) {
            const node = article.querySelector('[data-testid="tweetText"]') || article;
            const body = text(node).replace(/\n{3,}/g, '\n\n');
            if (body.length < 20 || seen.has(body)) continue;
            seen.add(body);
            posts.push(body);
            if (posts.length >= 10) break;
        }

        return { name, bio, posts };
    })()
"#;
