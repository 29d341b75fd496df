//! Tile URL templates.
//!
//! Templates use the `{z}`, `{x}` and `{y}` placeholders common to slippy-map
//! servers, e.g. `https://tile.example.org/{z}/{x}/{y}.png`.

use std::fmt;

use thiserror::Error;

use crate::coord::TileCoord;

const PLACEHOLDERS: [&str; 3] = ["{z}", "{x}", "{y}"];

/// Reasons a URL template is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template is missing the {0} placeholder")]
    MissingPlaceholder(&'static str),

    #[error("template must start with http:// or https://")]
    UnsupportedScheme,
}

/// A validated tile URL template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    raw: String,
}

impl UrlTemplate {
    /// Parses and validates a template string.
    pub fn parse(raw: impl Into<String>) -> Result<Self, TemplateError> {
        let raw = raw.into();

        if !(raw.starts_with("http://") || raw.starts_with("https://")) {
            return Err(TemplateError::UnsupportedScheme);
        }
        for placeholder in PLACEHOLDERS {
            if !raw.contains(placeholder) {
                return Err(TemplateError::MissingPlaceholder(placeholder));
            }
        }

        Ok(Self { raw })
    }

    /// Substitutes the tile coordinate into the template.
    pub fn render(&self, tile: &TileCoord) -> String {
        self.raw
            .replace("{z}", &tile.z.to_string())
            .replace("{x}", &tile.x.to_string())
            .replace("{y}", &tile.y.to_string())
    }

    /// Host portion of the template, used as a fallback server name.
    pub fn host(&self) -> &str {
        let rest = self
            .raw
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.raw);
        rest.split('/').next().unwrap_or(rest)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for UrlTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
