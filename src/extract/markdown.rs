//! Main content extraction and HTML to markdown conversion
//!
//! The rendered document is narrowed to its primary content container (first
//! match in [`CONTENT_SELECTORS`] order, else `<body>`), boilerplate elements
//! inside it are dropped, and the remaining HTML is converted with htmd.

use anyhow::{Context, Result};
use ego_tree::NodeId;
use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;

/// Maximum HTML input size accepted for conversion (10 MB)
pub(crate) const MAX_HTML_SIZE: usize = 10 * 1024 * 1024;

/// Maximum nesting depth serialized. Deeper subtrees are truncated.
const MAX_HTML_NESTING_DEPTH: usize = 100;

const CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role='main']",
    "#main-content",
    ".main-content",
    "#content",
    ".content",
    ".post-content",
    ".entry-content",
    "[itemprop='articleBody']",
    ".article-body",
    ".story-body",
];

const REMOVE_SELECTORS: &[&str] = &[
    "nav",
    "header",
    "footer",
    "aside",
    "script",
    "style",
    "noscript",
    "iframe",
    "form",
    ".sidebar",
    "#sidebar",
    ".navigation",
    ".menu",
    ".ads",
    ".advertisement",
    ".social-share",
    ".comments",
    "#comments",
    ".related-posts",
    ".cookie-notice",
    ".popup",
    ".modal",
];

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

static CONTENT_SELECTOR_LIST: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    CONTENT_SELECTORS
        .iter()
        .map(|s| Selector::parse(s).expect("BUG: hardcoded content selector is invalid"))
        .collect()
});

static REMOVE_SELECTOR_LIST: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    REMOVE_SELECTORS
        .iter()
        .map(|s| Selector::parse(s).expect("BUG: hardcoded removal selector is invalid"))
        .collect()
});

static BODY_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("body").expect("BUG: hardcoded CSS selector 'body' is invalid")
});

static TITLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("title").expect("BUG: hardcoded CSS selector 'title' is invalid")
});

static EXCESS_BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n{3,}").expect("EXCESS_BLANK_LINES: hardcoded regex is valid")
});

/// HTML of the primary content container with boilerplate removed.
///
/// Falls back to `<body>`, then to the input unchanged when the document has
/// no body element.
pub fn extract_main_content(html: &str) -> Result<String> {
    if html.len() > MAX_HTML_SIZE {
        anyhow::bail!(
            "HTML input too large: {} bytes (maximum {} bytes)",
            html.len(),
            MAX_HTML_SIZE
        );
    }

    let document = Html::parse_document(html);

    for selector in CONTENT_SELECTOR_LIST.iter() {
        if let Some(element) = document.select(selector).next() {
            return Ok(serialize_without_boilerplate(&element));
        }
    }

    if let Some(body) = document.select(&BODY_SELECTOR).next() {
        return Ok(serialize_without_boilerplate(&body));
    }

    Ok(html.to_string())
}

/// Text of the `<title>` element, trimmed. `None` when missing or blank.
#[must_use]
pub fn document_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Convert an HTML fragment to markdown.
pub fn html_to_markdown(html: &str) -> Result<String> {
    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "noscript", "iframe", "svg", "button"])
        .build();
    let markdown = converter
        .convert(html)
        .context("htmd failed to convert HTML")?;
    Ok(normalize_markdown(&markdown))
}

/// Collapse runs of blank lines and trim trailing whitespace per line.
fn normalize_markdown(markdown: &str) -> String {
    let trimmed_lines: Vec<&str> = markdown.lines().map(str::trim_end).collect();
    let joined = trimmed_lines.join("\n");
    EXCESS_BLANK_LINES
        .replace_all(joined.trim(), "\n\n")
        .into_owned()
}

fn serialize_without_boilerplate(element: &ElementRef) -> String {
    let mut to_remove: HashSet<NodeId> = HashSet::new();
    for selector in REMOVE_SELECTOR_LIST.iter() {
        for elem in element.select(selector) {
            to_remove.insert(elem.id());
        }
    }

    let mut output = String::new();
    serialize_children(element, &to_remove, &mut output, 0);
    output
}

fn serialize_children(
    element: &ElementRef,
    to_remove: &HashSet<NodeId>,
    output: &mut String,
    depth: usize,
) {
    if depth > MAX_HTML_NESTING_DEPTH {
        tracing::warn!(
            element = element.value().name(),
            limit = MAX_HTML_NESTING_DEPTH,
            "Maximum HTML nesting depth exceeded, truncating subtree"
        );
        return;
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => push_escaped(output, text),
            Node::Element(_) => {
                let Some(child_elem) = ElementRef::wrap(child) else {
                    continue;
                };
                if to_remove.contains(&child_elem.id()) {
                    continue;
                }

                let name = child_elem.value().name();
                output.push('<');
                output.push_str(name);
                for (attr, value) in child_elem.value().attrs() {
                    output.push(' ');
                    output.push_str(attr);
                    output.push_str("=\"");
                    push_escaped(output, value);
                    output.push('"');
                }
                output.push('>');

                if VOID_ELEMENTS.contains(&name) {
                    continue;
                }

                serialize_children(&child_elem, to_remove, output, depth + 1);

                output.push_str("</");
                output.push_str(name);
                output.push('>');
            }
            _ => {}
        }
    }
}

fn push_escaped(output: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '&' => output.push_str("&amp;"),
            '"' => output.push_str("&quot;"),
            c => output.push(c),
        }
    }
}
