//! One-hop crawl aggregation
//!
//! The seed is converted first. Its markdown supplies the same-site links,
//! which are capped, de-duplicated, and converted concurrently through the
//! same [`Converter`] pipeline as single pages. The outcome renders either
//! as an array of documents or as one combined markdown document.

mod links;

pub use links::discover_links;

use std::fmt::Write;
use tracing::info;
use url::Url;

use crate::metadata::heuristics::first_heading;
use crate::metadata::strip_first_heading;
use crate::orchestrator::{Caller, ConversionOptions, ConversionResult, Converter};
use crate::utils::constants::RELATED_SUBPAGES_HEADING;

/// Raw results of a crawl, seed first
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub seed: ConversionResult,
    pub subpages: Vec<ConversionResult>,
}

/// Convert `seed`, then every discovered same-site link (at most `max_links`).
///
/// A failed seed yields no subpages.
pub async fn crawl(
    converter: &Converter,
    seed: &Url,
    options: &ConversionOptions,
    caller: &Caller,
    max_links: usize,
) -> CrawlOutcome {
    let seed_result = converter.convert_one(seed, options, caller).await;
    if seed_result.is_error() {
        info!(url = %seed, status = seed_result.status_code(), "Crawl seed failed, skipping subpages");
        return CrawlOutcome {
            seed: seed_result,
            subpages: Vec::new(),
        };
    }

    let links = discover_links(seed, &seed_result.md, max_links);
    let sub_options = ConversionOptions {
        crawl_linked: false,
        ..*options
    };
    let subpages = converter.convert_many(&links, &sub_options, caller).await;
    info!(
        url = %seed,
        subpages = subpages.len(),
        failed = subpages.iter().filter(|r| r.is_error()).count(),
        "Crawl finished"
    );

    CrawlOutcome {
        seed: seed_result,
        subpages,
    }
}

impl CrawlOutcome {
    /// Every result annotated, seed first.
    #[must_use]
    pub fn into_documents(self) -> Vec<ConversionResult> {
        std::iter::once(self.seed)
            .chain(self.subpages)
            .map(ConversionResult::annotated)
            .collect()
    }

    /// The annotated seed followed by a related-subpages section with one
    /// subsection per successful subpage. The section is omitted when no
    /// subpage succeeded; a failed seed is returned as is.
    #[must_use]
    pub fn into_combined(self) -> ConversionResult {
        if self.seed.is_error() {
            return self.seed;
        }

        let mut combined = self.seed.annotated();
        let succeeded: Vec<&ConversionResult> =
            self.subpages.iter().filter(|r| !r.is_error()).collect();
        if succeeded.is_empty() {
            return combined;
        }

        let mut section = format!("\n{RELATED_SUBPAGES_HEADING}\n");
        for page in succeeded {
            let title = first_heading(&page.md).unwrap_or_else(|| page.url.clone());
            let _ = write!(
                section,
                "\n### {title}\n\nSource: {}\n\n{}\n",
                page.url,
                strip_first_heading(&page.md)
            );
        }
        combined.md.push_str(&section);
        combined
    }
}
