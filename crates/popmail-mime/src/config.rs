//! Parser configuration.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::charset::CharsetResolver;
use crate::date;
use crate::error::Result;

/// Settings shared by every parse entry point.
///
/// The default uses the global [`CharsetResolver`] and no extra date formats.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    resolver: Arc<CharsetResolver>,
    date_formats: Vec<String>,
}

impl ParserConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts building a configuration.
    #[must_use]
    pub fn builder() -> ParserConfigBuilder {
        ParserConfigBuilder::default()
    }

    /// Returns the charset resolver.
    #[must_use]
    pub fn resolver(&self) -> &CharsetResolver {
        &self.resolver
    }

    /// Returns the extra `chrono` formats tried for unusual dates.
    #[must_use]
    pub fn date_formats(&self) -> &[String] {
        &self.date_formats
    }

    /// Parses a date with the configured extra formats.
    ///
    /// # Errors
    ///
    /// See [`date::parse_date`].
    pub fn parse_date(&self, text: &str) -> Result<Option<DateTime<Utc>>> {
        date::parse_date_with_formats(text, &self.date_formats)
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`ParserConfig`].
#[derive(Debug, Default)]
pub struct ParserConfigBuilder {
    resolver: Option<Arc<CharsetResolver>>,
    date_formats: Vec<String>,
}

impl ParserConfigBuilder {
    /// Uses a private charset resolver instead of the global one.
    #[must_use]
    pub fn resolver(mut self, resolver: Arc<CharsetResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Adds a `chrono` format string tried when the built-in date rules find
    /// nothing, e.g. `"%Y-%m-%d %H:%M:%S"`.
    #[must_use]
    pub fn date_format(mut self, format: impl Into<String>) -> Self {
        self.date_formats.push(format.into());
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ParserConfig {
        ParserConfig {
            resolver: self.resolver.unwrap_or_else(CharsetResolver::global),
            date_formats: self.date_formats,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_default_uses_global_resolver() {
        let config = ParserConfig::default();
        assert!(std::ptr::eq(config.resolver(), &*CharsetResolver::global()));
        assert!(config.date_formats().is_empty());
    }

    #[test]
    fn test_builder() {
        let resolver = Arc::new(CharsetResolver::new());
        resolver.add_mapping("my-charset", encoding_rs::WINDOWS_1252);

        let config = ParserConfig::builder()
            .resolver(Arc::clone(&resolver))
            .date_format("%Y-%m-%d %H:%M:%S")
            .build();

        assert!(config.resolver().resolve("my-charset").is_ok());
        assert!(CharsetResolver::global().resolve("my-charset").is_err());
        assert_eq!(config.date_formats(), ["%Y-%m-%d %H:%M:%S".to_string()]);
    }
}
