//! Content heuristics over extracted markdown
//!
//! Every function here is pure and deterministic; each writes one metadata
//! field and none depends on another's output except `tags`, which folds in
//! the purpose and entities.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::utils::truncate_with_ellipsis;

pub const DEFAULT_TITLE: &str = "Untitled Document";
pub const DESCRIPTION_MAX_CHARS: usize = 150;
pub const MAX_IMAGES: usize = 5;
pub const MAX_ENTITIES: usize = 10;
const WORDS_PER_MINUTE: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Purpose {
    Tutorial,
    Reference,
    Opinion,
    Analysis,
    Information,
}

impl Purpose {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tutorial => "tutorial",
            Self::Reference => "reference",
            Self::Opinion => "opinion",
            Self::Analysis => "analysis",
            Self::Information => "information",
        }
    }
}

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ms)^\s*(```|~~~).*?^\s*(```|~~~)[^\n]*$")
        .expect("FENCED_BLOCK: hardcoded regex is valid")
});

static IMAGE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"!\[[^\]]{0,200}\]\((https?://[^\s)]{1,2000})(?:\s+"[^"]*")?\)"#)
        .expect("IMAGE_REF: hardcoded regex is valid")
});

static INLINE_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"`([^`\n]{1,80})`").expect("INLINE_CODE: hardcoded regex is valid")
});

static CAPITALIZED_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)+\b")
        .expect("CAPITALIZED_PHRASE: hardcoded regex is valid")
});

static ACRONYM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z]{2,}\b").expect("ACRONYM: hardcoded regex is valid")
});

const ROMAN_NUMERALS: &[&str] = &[
    "II", "III", "IV", "VI", "VII", "VIII", "IX", "XI", "XII", "XIII", "XIV", "XV", "XX", "XL",
    "LX", "XC", "CD", "CM", "MM",
];

static PURPOSE_SIGNALS: LazyLock<Vec<(Purpose, Regex)>> = LazyLock::new(|| {
    [
        (
            Purpose::Tutorial,
            r"(?i)\b(tutorial|how to|step[- ]by[- ]step|step \d|getting started|walkthrough|learn how|guide)\b",
        ),
        (
            Purpose::Reference,
            r"(?i)\b(reference|api|documentation|specification|parameters?|syntax|cheat ?sheet|changelog)\b",
        ),
        (
            Purpose::Opinion,
            r"(?i)\b(i think|i believe|in my opinion|my take|i feel|we should|opinion|editorial)\b",
        ),
        (
            Purpose::Analysis,
            r"(?i)\b(analysis|analy[sz]e|comparison|compared|benchmark|data shows|findings|evaluation|case study)\b",
        ),
    ]
    .into_iter()
    .map(|(purpose, pattern)| {
        (
            purpose,
            Regex::new(pattern).expect("PURPOSE_SIGNALS: hardcoded regex is valid"),
        )
    })
    .collect()
});

static AUDIENCE_SIGNALS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        (
            "developer",
            r"(?i)\b(code|developers?|programming|api|sdk|function|compiler|library|debug|git)\b|```",
        ),
        (
            "designer",
            r"(?i)\b(design(ers?)?|ui|ux|typography|figma|wireframes?|layout|color palette)\b",
        ),
        (
            "manager",
            r"(?i)\b(managers?|management|roadmap|stakeholders?|budget|kpis?|roi|team lead)\b",
        ),
        (
            "beginner",
            r"(?i)\b(beginners?|introduction|getting started|basics|first steps|101|no experience)\b",
        ),
    ]
    .into_iter()
    .map(|(audience, pattern)| {
        (
            audience,
            Regex::new(pattern).expect("AUDIENCE_SIGNALS: hardcoded regex is valid"),
        )
    })
    .collect()
});

static DOMAIN_TAGS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("programming", r"(?i)\b(programming|source code|compiler|function|algorithm)\b"),
        ("web", r"(?i)\b(html|css|javascript|browser|http|frontend|web ?site)\b"),
        (
            "ai",
            r"(?i)\b(machine learning|artificial intelligence|neural network|llms?|deep learning|AI)\b",
        ),
        ("data", r"(?i)\b(database|sql|dataset|analytics|data pipeline)\b"),
        ("security", r"(?i)\b(security|vulnerabilit(y|ies)|encryption|authentication|exploit)\b"),
        ("devops", r"(?i)\b(docker|kubernetes|deployment|ci/cd|infrastructure)\b"),
        ("business", r"(?i)\b(revenue|startup|market share|business|pricing)\b"),
        ("science", r"(?i)\b(research|experiment|hypothesis|physics|biology)\b"),
    ]
    .into_iter()
    .map(|(tag, pattern)| {
        (
            tag,
            Regex::new(pattern).expect("DOMAIN_TAGS: hardcoded regex is valid"),
        )
    })
    .collect()
});

/// Entity names folded into tags when they match case-insensitively
const KNOWN_TECHNOLOGIES: &[&str] = &[
    "rust", "python", "javascript", "typescript", "go", "java", "kotlin", "swift", "c++", "react",
    "vue", "angular", "node.js", "docker", "kubernetes", "aws", "gcp", "azure", "linux", "sql",
    "postgresql", "mysql", "sqlite", "redis", "graphql", "html", "css", "git", "wasm",
    "webassembly", "tokio", "llm", "openai",
];

fn without_fenced_code(body: &str) -> String {
    FENCED_BLOCK.replace_all(body, "").into_owned()
}

/// Text of the first `# ` heading, or the placeholder.
#[must_use]
pub fn title(body: &str) -> String {
    first_heading(body).unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

/// Text of the first top-level heading outside code fences.
#[must_use]
pub fn first_heading(body: &str) -> Option<String> {
    let mut in_fence = false;
    for line in body.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if let Some(text) = line.strip_prefix("# ") {
            let text = text.trim().trim_end_matches('#').trim();
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
    }
    None
}

fn is_skipped_line(trimmed: &str) -> bool {
    trimmed.starts_with('#')
        || trimmed.starts_with('|')
        || trimmed.starts_with("![")
        || trimmed.starts_with("<!--")
        || trimmed.chars().all(|c| matches!(c, '-' | '*' | '_' | '=' | ' '))
}

/// First paragraph-like block, truncated to 150 characters.
#[must_use]
pub fn description(body: &str) -> String {
    let mut in_fence = false;
    let mut block: Vec<&str> = Vec::new();

    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            if !block.is_empty() {
                break;
            }
            continue;
        }
        if in_fence {
            continue;
        }
        if trimmed.is_empty() || is_skipped_line(trimmed) {
            if !block.is_empty() {
                break;
            }
            continue;
        }
        block.push(trimmed);
    }

    truncate_with_ellipsis(&block.join(" "), DESCRIPTION_MAX_CHARS)
}

/// `ceil(words / 200)`, at least one minute.
#[must_use]
pub fn reading_time_minutes(body: &str) -> u32 {
    let words = body.split_whitespace().count();
    let minutes = words.div_ceil(WORDS_PER_MINUTE).max(1);
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

/// Absolute http(s) image targets, first five in document order.
#[must_use]
pub fn images(body: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    IMAGE_REF
        .captures_iter(body)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .filter(|url| seen.insert(url.clone()))
        .take(MAX_IMAGES)
        .collect()
}

/// Inline code spans, Capitalized multi-word phrases and acronyms, in that
/// discovery order, deduplicated, first ten.
#[must_use]
pub fn entities(body: &str) -> Vec<String> {
    let text = without_fenced_code(body);
    let prose = INLINE_CODE.replace_all(&text, " ");

    let code = INLINE_CODE
        .captures_iter(&text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().trim().to_string()));
    let phrases = CAPITALIZED_PHRASE
        .find_iter(&prose)
        .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "));
    let acronyms = ACRONYM
        .find_iter(&prose)
        .map(|m| m.as_str().to_string())
        .filter(|a| !ROMAN_NUMERALS.contains(&a.as_str()));

    let mut seen = HashSet::new();
    code.chain(phrases)
        .chain(acronyms)
        .filter(|e| !e.is_empty() && seen.insert(e.clone()))
        .take(MAX_ENTITIES)
        .collect()
}

/// First matching category in priority order, else information.
#[must_use]
pub fn purpose(body: &str) -> Purpose {
    PURPOSE_SIGNALS
        .iter()
        .find(|(_, re)| re.is_match(body))
        .map_or(Purpose::Information, |(p, _)| *p)
}

/// Every matching audience group, else `general`.
#[must_use]
pub fn audience(body: &str) -> Vec<String> {
    let matched: Vec<String> = AUDIENCE_SIGNALS
        .iter()
        .filter(|(_, re)| re.is_match(body))
        .map(|(a, _)| (*a).to_string())
        .collect();
    if matched.is_empty() {
        vec!["general".to_string()]
    } else {
        matched
    }
}

/// Purpose, matching domain tags, then known technologies among the entities.
#[must_use]
pub fn tags(body: &str, purpose: Purpose, entities: &[String]) -> Vec<String> {
    let mut tags = vec![purpose.as_str().to_string()];
    for (tag, re) in DOMAIN_TAGS.iter() {
        if re.is_match(body) && !tags.iter().any(|t| t == tag) {
            tags.push((*tag).to_string());
        }
    }
    for entity in entities {
        let lower = entity.to_lowercase();
        if KNOWN_TECHNOLOGIES.contains(&lower.as_str()) && !tags.contains(&lower) {
            tags.push(lower);
        }
    }
    tags
}
