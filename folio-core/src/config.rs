use serde::{Deserialize, Serialize};

use crate::markdown::DEFAULT_SYNTAX_THEME;

/// The `[site]` table of `folio.toml`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SiteConfig {
    /// Shown in the page header next to each page title.
    pub title: String,
    /// syntect theme used for fenced code blocks.
    pub syntax_theme: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Folio".into(),
            syntax_theme: DEFAULT_SYNTAX_THEME.into(),
        }
    }
}
