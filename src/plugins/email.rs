//! Email address matcher

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use super::{char_span, status_for};
use crate::error::Result;
use crate::plugin::{PassMode, Plugin, PluginContext, PluginResult};
use crate::types::{EntityCandidate, EntityKind};

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap());

const EMAIL_CONFIDENCE: f64 = 0.98;

/// Detects email addresses
pub struct EmailPlugin;

impl EmailPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EmailPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for EmailPlugin {
    fn name(&self) -> &str {
        "email"
    }

    fn mode(&self) -> PassMode {
        PassMode::Realtime
    }

    async fn run(&self, ctx: &PluginContext) -> Result<PluginResult> {
        let mut upsert = Vec::new();

        for m in EMAIL.find_iter(&ctx.window.text) {
            let address = m.as_str().to_lowercase();
            let (local, domain) = address.split_once('@').unwrap_or((address.as_str(), ""));

            let span = char_span(&ctx.window, m.start(), m.end());
            let key = format!("email:{}:{}:{}", address, span.start, span.end);

            upsert.push(
                EntityCandidate::new(key, EntityKind::Email, span, m.as_str())
                    .with_value(json!({ "local": local, "domain": domain }))
                    .with_confidence(EMAIL_CONFIDENCE)
                    .with_status(status_for(ctx.mode)),
            );
        }

        Ok(PluginResult::upsert(upsert))
    }
}
