#![forbid(unsafe_code)]

//! Tree model configuration.
//!
//! # Environment
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `ARBOR_MAX_CONCURRENCY` | `max_concurrency` | `2` |
//! | `ARBOR_LOADING_PLACEHOLDER` | `loading_placeholder` | `true` |
//! | `ARBOR_LOAD_ON_READ` | `load_on_read` | `true` |
//!
//! Unparseable values are ignored with a warning.

use std::env;

/// Default number of concurrent background computations.
pub const DEFAULT_MAX_CONCURRENCY: usize = 2;

/// Settings shared by the view model and the widget adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeModelConfig {
    /// Upper bound on concurrent domain computations.
    pub max_concurrency: usize,
    /// Show a transient child while a node's children load.
    pub loading_placeholder: bool,
    /// Main text of the loading placeholder.
    pub placeholder_text: String,
    /// Reading the children of an unloaded node starts loading them.
    pub load_on_read: bool,
    /// Recompute presentations of children kept across a reload.
    pub refresh_kept_children: bool,
    /// Name of the foreground thread.
    pub foreground_thread_name: String,
}

impl Default for TreeModelConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            loading_placeholder: true,
            placeholder_text: "loading…".to_string(),
            load_on_read: true,
            refresh_kept_children: true,
            foreground_thread_name: "arbor-foreground".to_string(),
        }
    }
}

impl TreeModelConfig {
    /// Defaults overridden by `ARBOR_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by values from `lookup`.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(value) = parse_var(&lookup, "ARBOR_MAX_CONCURRENCY", |v| {
            v.parse::<usize>().ok().filter(|n| *n > 0)
        }) {
            config.max_concurrency = value;
        }
        if let Some(value) = parse_var(&lookup, "ARBOR_LOADING_PLACEHOLDER", parse_bool) {
            config.loading_placeholder = value;
        }
        if let Some(value) = parse_var(&lookup, "ARBOR_LOAD_ON_READ", parse_bool) {
            config.load_on_read = value;
        }
        config
    }

    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    #[must_use]
    pub fn with_loading_placeholder(mut self, enabled: bool) -> Self {
        self.loading_placeholder = enabled;
        self
    }

    #[must_use]
    pub fn with_placeholder_text(mut self, text: impl Into<String>) -> Self {
        self.placeholder_text = text.into();
        self
    }

    #[must_use]
    pub fn with_load_on_read(mut self, enabled: bool) -> Self {
        self.load_on_read = enabled;
        self
    }

    #[must_use]
    pub fn with_refresh_kept_children(mut self, enabled: bool) -> Self {
        self.refresh_kept_children = enabled;
        self
    }

    #[must_use]
    pub fn with_foreground_thread_name(mut self, name: impl Into<String>) -> Self {
        self.foreground_thread_name = name.into();
        self
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let raw = lookup(key)?;
    let parsed = parse(raw.trim());
    if parsed.is_none() {
        tracing::warn!(key, value = %raw, "ignoring invalid configuration value");
    }
    parsed
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
