//! Phone number matcher
//!
//! Phone detection over prose is noisy, so candidates are validated after
//! the regex pass: a match needs 7 to 15 digits and must not butt up
//! against surrounding alphanumerics. International numbers with a leading
//! plus score higher than separator-only formats.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use super::{char_span, status_for};
use crate::error::Result;
use crate::plugin::{PassMode, Plugin, PluginContext, PluginResult};
use crate::types::{EntityCandidate, EntityKind};

static PHONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\+\d{1,3}[\s.-]?\(?\d{2,4}\)?[\s.-]?\d{3}[\s.-]?\d{2,4}|\+\d{7,15}\b|\(?\d{3}\)?[\s.-]\d{3}[\s.-]\d{4}\b")
        .unwrap()
});

/// Detects phone numbers in common written formats
pub struct PhonePlugin;

impl PhonePlugin {
    pub fn new() -> Self {
        Self
    }

    fn digits(raw: &str) -> String {
        raw.chars().filter(|c| c.is_ascii_digit()).collect()
    }
}

impl Default for PhonePlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for PhonePlugin {
    fn name(&self) -> &str {
        "phone"
    }

    fn mode(&self) -> PassMode {
        PassMode::Realtime
    }

    async fn run(&self, ctx: &PluginContext) -> Result<PluginResult> {
        let text = &ctx.window.text;
        let mut upsert = Vec::new();

        for m in PHONE.find_iter(text) {
            // Reject matches glued to surrounding word characters
            let preceded = text[..m.start()]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric());
            let followed = text[m.end()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric());
            if preceded || followed {
                continue;
            }

            let digits = Self::digits(m.as_str());
            if !(7..=15).contains(&digits.len()) {
                continue;
            }

            let international = m.as_str().starts_with('+');
            let confidence = if international { 0.85 } else { 0.8 };

            let span = char_span(&ctx.window, m.start(), m.end());
            let key = format!("phone:{}:{}:{}", digits, span.start, span.end);

            upsert.push(
                EntityCandidate::new(key, EntityKind::Phone, span, m.as_str())
                    .with_value(json!({ "digits": digits, "international": international }))
                    .with_confidence(confidence)
                    .with_status(status_for(ctx.mode)),
            );
        }

        Ok(PluginResult::upsert(upsert))
    }
}
