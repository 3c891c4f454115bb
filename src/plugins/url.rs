//! URL matcher

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use super::{char_span, status_for};
use crate::error::Result;
use crate::plugin::{PassMode, Plugin, PluginContext, PluginResult};
use crate::types::{EntityCandidate, EntityKind};

static URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bhttps?://[^\s<>"']+|\bwww\.[^\s<>"']+"#).unwrap());

/// Detects http/https links and bare www hosts
pub struct UrlPlugin;

impl UrlPlugin {
    pub fn new() -> Self {
        Self
    }

    /// Split a matched URL into scheme and host
    fn parse(url: &str) -> (Option<&str>, &str) {
        let (scheme, rest) = match url.split_once("://") {
            Some((scheme, rest)) => (Some(scheme), rest),
            None => (None, url),
        };
        let host = rest
            .split(|c| c == '/' || c == '?' || c == '#')
            .next()
            .unwrap_or(rest);
        (scheme, host)
    }
}

impl Default for UrlPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for UrlPlugin {
    fn name(&self) -> &str {
        "url"
    }

    fn mode(&self) -> PassMode {
        PassMode::Realtime
    }

    async fn run(&self, ctx: &PluginContext) -> Result<PluginResult> {
        let mut upsert = Vec::new();

        for m in URL.find_iter(&ctx.window.text) {
            // Trailing sentence punctuation is part of the prose, not the URL
            let trimmed = m
                .as_str()
                .trim_end_matches(&['.', ',', ';', ':', '!', '?', ')'][..]);
            if trimmed.is_empty() {
                continue;
            }
            let byte_end = m.start() + trimmed.len();

            let (scheme, host) = Self::parse(trimmed);
            let normalized = trimmed.to_lowercase();
            let confidence = if scheme.is_some() { 0.95 } else { 0.85 };

            let span = char_span(&ctx.window, m.start(), byte_end);
            let key = format!("url:{}:{}:{}", normalized, span.start, span.end);

            upsert.push(
                EntityCandidate::new(key, EntityKind::Url, span, trimmed)
                    .with_value(json!({ "scheme": scheme, "host": host }))
                    .with_confidence(confidence)
                    .with_status(status_for(ctx.mode)),
            );
        }

        Ok(PluginResult::upsert(upsert))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::test_support::context;

    #[tokio::test]
    async fn test_https_url() {
        let plugin = UrlPlugin::new();
        let result = plugin
            .run(&context("see https://example.com/docs for details"))
            .await
            .unwrap();

        assert_eq!(result.upsert.len(), 1);
        let candidate = &result.upsert[0];
        assert_eq!(candidate.text, "https://example.com/docs");
        assert_eq!(candidate.value["scheme"], "https");
        assert_eq!(candidate.value["host"], "example.com");
        assert_eq!(candidate.confidence, 0.95);
    }

    #[tokio::test]
    async fn test_www_url_without_scheme() {
        let plugin = UrlPlugin::new();
        let result = plugin.run(&context("visit www.example.org now")).await.unwrap();

        assert_eq!(result.upsert.len(), 1);
        let candidate = &result.upsert[0];
        assert_eq!(candidate.value["scheme"], serde_json::Value::Null);
        assert_eq!(candidate.value["host"], "www.example.org");
        assert_eq!(candidate.confidence, 0.85);
    }

    #[tokio::test]
    async fn test_trailing_punctuation_trimmed() {
        let plugin = UrlPlugin::new();
        let result = plugin
            .run(&context("read https://example.com/a."))
            .await
            .unwrap();

        assert_eq!(result.upsert.len(), 1);
        assert_eq!(result.upsert[0].text, "https://example.com/a");
    }

    #[tokio::test]
    async fn test_plain_words_not_matched() {
        let plugin = UrlPlugin::new();
        let result = plugin
            .run(&context("no links in this sentence"))
            .await
            .unwrap();
        assert!(result.upsert.is_empty());
    }
}
