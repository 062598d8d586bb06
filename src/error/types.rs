use thiserror::Error;

/// Unified result type for the crate.
pub type Result<T> = std::result::Result<T, ViewError>;

/// Errors surfaced by views, collections and routers.
///
/// Lookup misses, duplicate registrations and unmatched fragments are not errors;
/// only misconfiguration and malformed input reach the caller.
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("missing required option `{0}`")]
    MissingOption(&'static str),
    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },
    #[error("invalid route `{route}`: {source}")]
    InvalidRoute {
        route: String,
        #[source]
        source: regex::Error,
    },
    #[error("history has already been started")]
    HistoryStarted,
    #[error("default placeholder selector is already configured")]
    PlaceholderDefaultLocked,
    #[error("model attributes must be a JSON object, got {0}")]
    NotAnObject(String),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl ViewError {
    pub fn invalid_selector(selector: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }
}
