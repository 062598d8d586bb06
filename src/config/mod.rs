use std::sync::OnceLock;

use serde_json::Value;

use crate::error::{Result, ViewError};
use crate::logging::{LogLevel, Logger, event_with_fields};
use crate::metrics::{SharedMetrics, ViewMetrics};

/// Tag emitted by placeholder markers and matched by the default selector.
pub const PLACEHOLDER_TAG: &str = "view";

/// Selector used to find placeholder markers when nothing else is configured.
pub const DEFAULT_PLACEHOLDER_SELECTOR: &str = "view";

static PLACEHOLDER_DEFAULT: OnceLock<String> = OnceLock::new();

/// Process-wide placeholder selector, read by every composite without an override.
pub fn default_placeholder_selector() -> &'static str {
    PLACEHOLDER_DEFAULT
        .get()
        .map(String::as_str)
        .unwrap_or(DEFAULT_PLACEHOLDER_SELECTOR)
}

/// Sets the process-wide placeholder selector. May only be called once, before
/// composites start placing children.
pub fn set_default_placeholder_selector(selector: impl Into<String>) -> Result<()> {
    PLACEHOLDER_DEFAULT
        .set(selector.into())
        .map_err(|_| ViewError::PlaceholderDefaultLocked)
}

/// Per-view configuration knobs.
#[derive(Clone, Debug, Default)]
pub struct ViewConfig {
    /// Overrides the process-wide placeholder selector for this view.
    pub placeholder_selector: Option<String>,
    /// Optional structured logger.
    pub logger: Option<Logger>,
    /// Optional shared counters.
    pub metrics: Option<SharedMetrics>,
}

impl ViewConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_placeholder_selector(mut self, selector: impl Into<String>) -> Self {
        self.placeholder_selector = Some(selector.into());
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Enable metrics collection if it has not already been configured.
    pub fn enable_metrics(&mut self) {
        if self.metrics.is_none() {
            self.metrics = Some(ViewMetrics::shared());
        }
    }

    pub fn placeholder_selector(&self) -> &str {
        match self.placeholder_selector.as_deref() {
            Some(selector) => selector,
            None => default_placeholder_selector(),
        }
    }

    /// The placeholder selector when it names a plain tag, e.g. `x-slot`.
    pub fn placeholder_tag(&self) -> Option<&str> {
        let selector = self.placeholder_selector();
        let bare = !selector.is_empty()
            && selector
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        bare.then_some(selector)
    }

    pub(crate) fn log<I>(&self, level: LogLevel, target: &str, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        if let Some(logger) = self.logger.as_ref() {
            if logger.enabled(level) {
                let _ = logger.log_event(event_with_fields(level, target, message, fields));
            }
        }
    }

    pub(crate) fn record(&self, update: impl FnOnce(&mut ViewMetrics)) {
        if let Some(metrics) = self.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                update(&mut guard);
            }
        }
    }
}
