//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::search::ResultSource;

/// Search submitted from the HTML form.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchForm {
    #[serde(default)]
    pub subject: String,
}

/// Request to run a search through the JSON API.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    /// The subject to search news about
    pub subject: String,
}

/// Result of a search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    /// Subject actually searched (after trimming to the length limit)
    pub subject: String,

    /// Newsletter markdown, mock report, or input prompt
    pub markdown: String,

    /// Which path produced `markdown`
    pub source: ResultSource,
}

/// Current contents of the results pane.
#[derive(Debug, Clone, Serialize)]
pub struct ResultsResponse {
    /// Empty until the first search
    pub markdown: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    pub app_name: String,

    /// Whether both credentials are configured
    pub live_search: bool,

    /// Credentials that are not configured
    pub missing_credentials: Vec<String>,

    /// Maximum subject length, in characters
    pub subject_max_chars: usize,
}
