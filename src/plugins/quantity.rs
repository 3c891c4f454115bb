//! Quantity matcher: numbers followed by measurement units

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;

use super::{char_span, status_for};
use crate::error::Result;
use crate::plugin::{PassMode, Plugin, PluginContext, PluginResult};
use crate::types::{EntityCandidate, EntityKind};

const QUANTITY_CONFIDENCE: f64 = 0.9;

/// Detects measurements like "10 km", "3.5 kg", or "20 mph"
pub struct QuantityPlugin {
    measure: Regex,
}

impl QuantityPlugin {
    pub fn new() -> Self {
        Self {
            measure: Regex::new(
                r"(?i)\b(\d+(?:\.\d+)?)\s*(km|mi|cm|mm|m|ft|yd|in|kg|lb|oz|g|ml|gal|l|mph|kph|ms|min|h|s)\b",
            )
            .unwrap(),
        }
    }
}

impl Default for QuantityPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for QuantityPlugin {
    fn name(&self) -> &str {
        "quantity"
    }

    fn mode(&self) -> PassMode {
        PassMode::Realtime
    }

    async fn run(&self, ctx: &PluginContext) -> Result<PluginResult> {
        let mut upsert = Vec::new();

        for caps in self.measure.captures_iter(&ctx.window.text) {
            let whole = caps.get(0).unwrap();
            let magnitude = caps.get(1).unwrap().as_str();
            let unit = caps.get(2).unwrap().as_str().to_lowercase();

            let span = char_span(&ctx.window, whole.start(), whole.end());
            let key = format!("quantity:{}:{}:{}:{}", magnitude, unit, span.start, span.end);

            upsert.push(
                EntityCandidate::new(key, EntityKind::Quantity, span, whole.as_str())
                    .with_value(json!({
                        "magnitude": magnitude.parse::<f64>().ok(),
                        "unit": unit,
                    }))
                    .with_confidence(QUANTITY_CONFIDENCE)
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
    use crate::types::Span;

    #[tokio::test]
    async fn test_detects_quantity_with_span() {
        let plugin = QuantityPlugin::new();
        let result = plugin.run(&context("convert 10 km to mi")).await.unwrap();

        assert_eq!(result.upsert.len(), 1);
        let candidate = &result.upsert[0];
        assert_eq!(candidate.kind, EntityKind::Quantity);
        assert_eq!(candidate.text, "10 km");
        assert_eq!(candidate.span, Span::new(8, 13));
        assert_eq!(candidate.key, "quantity:10:km:8:13");
        assert_eq!(candidate.value["magnitude"], 10.0);
        assert_eq!(candidate.value["unit"], "km");
    }

    #[tokio::test]
    async fn test_decimal_magnitude() {
        let plugin = QuantityPlugin::new();
        let result = plugin.run(&context("weighs 3.5 kg today")).await.unwrap();

        assert_eq!(result.upsert.len(), 1);
        assert_eq!(result.upsert[0].text, "3.5 kg");
        assert_eq!(result.upsert[0].value["magnitude"], 3.5);
    }

    #[tokio::test]
    async fn test_no_unit_no_match() {
        let plugin = QuantityPlugin::new();
        let result = plugin.run(&context("there are 10 reasons")).await.unwrap();
        assert!(result.upsert.is_empty());
    }

    #[tokio::test]
    async fn test_multiple_quantities() {
        let plugin = QuantityPlugin::new();
        let result = plugin.run(&context("ran 5 km then 3 mi")).await.unwrap();

        assert_eq!(result.upsert.len(), 2);
        assert_eq!(result.upsert[0].value["unit"], "km");
        assert_eq!(result.upsert[1].value["unit"], "mi");
    }

    #[tokio::test]
    async fn test_unit_case_normalized_in_key() {
        let plugin = QuantityPlugin::new();
        let result = plugin.run(&context("about 12 KM away")).await.unwrap();

        assert_eq!(result.upsert.len(), 1);
        assert!(result.upsert[0].key.contains(":km:"));
    }

    #[tokio::test]
    async fn test_window_offset_applied() {
        let plugin = QuantityPlugin::new();
        let mut ctx = context("10 km");
        ctx.window.offset = 42;
        let result = plugin.run(&ctx).await.unwrap();

        assert_eq!(result.upsert[0].span, Span::new(42, 47));
        assert_eq!(result.upsert[0].key, "quantity:10:km:42:47");
    }
}
