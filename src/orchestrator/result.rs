use serde::{Deserialize, Serialize};

use crate::metadata::annotate;

/// One converted identifier, as returned to callers.
///
/// `error`, `status` and `errorDetails` are only present on failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    pub url: String,
    pub md: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}

impl ConversionResult {
    #[must_use]
    pub fn success(url: impl Into<String>, md: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            md: md.into(),
            error: None,
            status: None,
            error_details: None,
        }
    }

    #[must_use]
    pub fn failure(
        url: impl Into<String>,
        md: impl Into<String>,
        status: u16,
        details: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            md: md.into(),
            error: Some(true),
            status: Some(status),
            error_details: Some(details.into()),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.unwrap_or(false)
    }

    /// HTTP-like status: the recorded one on failure, 200 otherwise.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status.unwrap_or(200)
    }

    /// Wrap a successful body with frontmatter and directives. Failures pass
    /// through untouched.
    #[must_use]
    pub fn annotated(mut self) -> Self {
        if !self.is_error() {
            self.md = annotate(&self.md, &self.url);
        }
        self
    }
}
