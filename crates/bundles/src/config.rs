//! Engine settings
//!
//! Settings are loaded from (in order of priority):
//! 1. Environment variables (`BUNDLES_DEBOUNCE_MS`, `BUNDLES_MAX_SENDERS`)
//! 2. `bundles.json` in the config directory
//! 3. Built-in defaults matching the host's current markup
//!
//! Every field has a default, so a settings file only needs the keys it
//! wants to change.

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::host::Selector;

/// Settings filename in the config directory
const SETTINGS_FILE: &str = "bundles.json";

/// Environment variable overriding the debounce window
pub const DEBOUNCE_ENV: &str = "BUNDLES_DEBOUNCE_MS";

/// Longest accepted debounce window
pub const MAX_DEBOUNCE_MS: u64 = 60_000;

/// Environment variable overriding the number of senders shown per bundle
pub const MAX_SENDERS_ENV: &str = "BUNDLES_MAX_SENDERS";

/// Where the host keeps the structure the engine reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSelectors {
    /// Marker the host shows while booting
    pub loading_marker: Selector,
    /// Region holding every message list, hidden copies included
    pub message_region: Selector,
    /// A single message list; only the rendered one is used
    pub list_container: Selector,
    /// A real message row
    pub row: Selector,
    /// Class present on unread rows
    pub unread_class: String,
    /// A label chip; its text is the label name, its inline style the colors
    pub label_chip: Selector,
    /// Sender name(s) of a row
    pub sender: Selector,
    /// Wrapper around the sender names, becomes the bundle name slot
    pub sender_region: Selector,
    /// Subject text of a row
    pub subject: Selector,
    /// Subject and snippet area, becomes the recent senders slot
    pub subject_region: Selector,
    /// Sent date cell, becomes the date slot
    pub date: Selector,
}

impl Default for HostSelectors {
    fn default() -> Self {
        Self {
            loading_marker: Selector::id("loading"),
            message_region: Selector::tag("div").with_class("AO"),
            list_container: Selector::tag("div").with_class("ae4"),
            row: Selector::tag("tr").with_class("zA"),
            unread_class: "zE".to_string(),
            label_chip: Selector::tag("div").with_class("ar"),
            sender: Selector::tag("span").with_class("yP"),
            sender_region: Selector::tag("div").with_class("yW"),
            subject: Selector::tag("span").with_class("bog"),
            subject_region: Selector::tag("div").with_class("y6"),
            date: Selector::tag("td").with_class("xW"),
        }
    }
}

/// What the template synthesizer strips from the cloned row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateRules {
    /// Attribute names removed everywhere in the clone
    pub strip_attributes: Vec<String>,
    /// Attribute name prefixes removed everywhere in the clone
    pub strip_attribute_prefixes: Vec<String>,
    /// Descendants carrying any of these classes are dropped
    pub strip_classes: Vec<String>,
    /// Tags rewritten to `div` so the host never sees a message row
    pub cell_tags: Vec<String>,
}

impl Default for TemplateRules {
    fn default() -> Self {
        let owned = |items: &[&str]| -> Vec<String> { items.iter().map(|s| s.to_string()).collect() };
        Self {
            strip_attributes: owned(&["id", "name", "role", "tabindex", "draggable", "email"]),
            strip_attribute_prefixes: owned(&["data-", "aria-", "js"]),
            strip_classes: owned(&[
                "bx0",   // thread message count
                "WA",    // importance marker
                "afn",   // hidden sender text for screen readers
                "ar",    // label chip
                "y2",    // snippet
                "brd",   // attachment icon
                "apU",   // star
                "bq4",   // hover toolbar
                "oZ-x3", // checkbox
            ]),
            cell_tags: owned(&["tr", "td"]),
        }
    }
}

/// Settings for the bundling engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundlerSettings {
    /// Quiet period before a cycle runs after the last mutation
    pub debounce_ms: u64,
    /// Senders listed on a bundle row, most recent first
    pub max_recent_senders: usize,
    /// Separator between listed senders
    pub sender_separator: String,
    pub selectors: HostSelectors,
    pub template: TemplateRules,
}

impl Default for BundlerSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            max_recent_senders: 3,
            sender_separator: ", ".to_string(),
            selectors: HostSelectors::default(),
            template: TemplateRules::default(),
        }
    }
}

impl BundlerSettings {
    /// Load settings from the config directory, then apply env overrides
    pub fn load() -> Result<Self> {
        let settings = if config::config_exists(SETTINGS_FILE) {
            debug!("Loading settings from {}", SETTINGS_FILE);
            config::load_json::<Self>(SETTINGS_FILE)?.validated()
        } else {
            Self::default()
        };
        Ok(settings.with_env_overrides())
    }

    /// Load settings from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let settings: Self = config::load_json_file(path)?;
        Ok(settings.validated())
    }

    /// Parse settings from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json).context("Failed to parse settings JSON")?;
        Ok(settings.validated())
    }

    /// Reset out-of-range values to their defaults
    fn validated(mut self) -> Self {
        if self.debounce_ms > MAX_DEBOUNCE_MS {
            let default = Self::default().debounce_ms;
            warn!(
                "debounce_ms {} exceeds {}ms; using {}ms",
                self.debounce_ms, MAX_DEBOUNCE_MS, default
            );
            self.debounce_ms = default;
        }
        self
    }

    /// Apply `BUNDLES_*` environment overrides; malformed values are ignored
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var(DEBOUNCE_ENV).ok().as_deref(),
            std::env::var(MAX_SENDERS_ENV).ok().as_deref(),
        )
    }

    fn with_overrides(mut self, debounce: Option<&str>, max_senders: Option<&str>) -> Self {
        if let Some(raw) = debounce {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms <= MAX_DEBOUNCE_MS => self.debounce_ms = ms,
                Ok(_) => warn!(
                    "Ignoring {}={:?}: above {}ms",
                    DEBOUNCE_ENV, raw, MAX_DEBOUNCE_MS
                ),
                Err(_) => warn!("Ignoring {}={:?}: not a number", DEBOUNCE_ENV, raw),
            }
        }
        if let Some(raw) = max_senders {
            match raw.trim().parse() {
                Ok(n) => self.max_recent_senders = n,
                Err(_) => warn!("Ignoring {}={:?}: not a number", MAX_SENDERS_ENV, raw),
            }
        }
        self
    }

    /// Debounce window, capped at [`MAX_DEBOUNCE_MS`]
    pub fn debounce_window(&self) -> chrono::Duration {
        let ms = self.debounce_ms.min(MAX_DEBOUNCE_MS);
        chrono::Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX))
    }
}
