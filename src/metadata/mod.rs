//! Metadata annotation for extracted documents
//!
//! A successful body is wrapped as:
//!
//! ```text
//! ---
//! <yaml frontmatter>
//! ---
//!
//! <body>
//!
//! <!-- agent-directive:summarize {...} -->
//! ```
//!
//! Everything except `uniqueId` and the timestamps is a pure function of the
//! body, so identical bodies yield identical frontmatter up to those fields.

pub mod heuristics;

pub use heuristics::Purpose;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::utils::constants::{ENTITY_DIRECTIVE_MIN_CHARS, SUMMARIZE_DIRECTIVE_MIN_CHARS};

/// Frontmatter fields, serialized in this order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub unique_id: String,
    pub title: String,
    pub description: String,
    pub created_at: String,
    pub updated_at: String,
    pub source_uri: String,
    pub purpose: Purpose,
    pub audience: Vec<String>,
    pub tags: Vec<String>,
    pub reading_time_minutes: u32,
    pub images: Vec<String>,
    pub entities: Vec<String>,
}

impl DocumentMetadata {
    /// Derive metadata from `body`, stamping a fresh id and the current time.
    #[must_use]
    pub fn derive(body: &str, source_uri: &str) -> Self {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let purpose = heuristics::purpose(body);
        let entities = heuristics::entities(body);
        Self {
            unique_id: uuid::Uuid::new_v4().to_string(),
            title: heuristics::title(body),
            description: heuristics::description(body),
            created_at: now.clone(),
            updated_at: now,
            source_uri: source_uri.to_string(),
            purpose,
            audience: heuristics::audience(body),
            tags: heuristics::tags(body, purpose, &entities),
            reading_time_minutes: heuristics::reading_time_minutes(body),
            images: heuristics::images(body),
            entities,
        }
    }

    /// `---\n<yaml>---\n`
    ///
    /// Serialization of this plain struct cannot fail in practice; if it
    /// does the frontmatter degrades to the title alone.
    #[must_use]
    pub fn to_frontmatter(&self) -> String {
        match serde_yaml::to_string(self) {
            Ok(yaml) => format!("---\n{yaml}---\n"),
            Err(e) => {
                warn!("Frontmatter serialization failed: {e}");
                format!("---\ntitle: {:?}\n---\n", self.title)
            }
        }
    }
}

fn directive(name: &str, payload: &serde_json::Value) -> String {
    format!("<!-- agent-directive:{name} {payload} -->")
}

/// Directive blocks gated on the body length in characters.
#[must_use]
pub fn directives(body: &str, meta: &DocumentMetadata) -> Vec<String> {
    let length = body.chars().count();
    let mut blocks = Vec::new();

    if length > SUMMARIZE_DIRECTIVE_MIN_CHARS {
        blocks.push(directive(
            "summarize",
            &json!({
                "task": "summarize",
                "source": meta.source_uri,
                "title": meta.title,
                "maxWords": 200,
                "format": "bullet-points",
                "readingTimeMinutes": meta.reading_time_minutes,
            }),
        ));
    }
    if length > ENTITY_DIRECTIVE_MIN_CHARS {
        blocks.push(directive(
            "extract-entities",
            &json!({
                "task": "extract-entities",
                "source": meta.source_uri,
                "types": ["person", "organization", "technology", "location", "product"],
                "seedEntities": meta.entities,
            }),
        ));
    }
    blocks
}

/// Wrap `body` with frontmatter and trailing directive blocks.
#[must_use]
pub fn annotate(body: &str, source_uri: &str) -> String {
    let meta = DocumentMetadata::derive(body, source_uri);
    let mut out = format!("{}\n{}", meta.to_frontmatter(), body.trim_end());
    for block in directives(body, &meta) {
        out.push_str("\n\n");
        out.push_str(&block);
    }
    out.push('\n');
    out
}

/// `body` without its first top-level heading line, used when a subpage is
/// embedded under a heading of its own.
#[must_use]
pub fn strip_first_heading(body: &str) -> String {
    let mut stripped = false;
    let kept: Vec<&str> = body
        .lines()
        .filter(|line| {
            if !stripped && line.starts_with("# ") {
                stripped = true;
                return false;
            }
            true
        })
        .collect();
    kept.join("\n").trim().to_string()
}
