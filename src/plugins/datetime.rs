//! Date and time matcher
//!
//! Detects numeric dates, month-name dates, and clock times. Parseable
//! dates carry a normalized ISO form in the value payload; everything else
//! keeps the raw text only.

use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use serde_json::json;

use super::{char_span, status_for};
use crate::error::Result;
use crate::plugin::{PassMode, Plugin, PluginContext, PluginResult};
use crate::types::{EntityCandidate, EntityKind};

/// Detects dates ("2024-01-15", "Jan 15, 2024", "15/01/2024") and times
/// ("3:30 PM")
pub struct DateTimePlugin {
    patterns: DateTimePatterns,
}

struct DateTimePatterns {
    iso_date: Regex,
    slash_date: Regex,
    month_date: Regex,
    time: Regex,
}

impl DateTimePatterns {
    fn new() -> Self {
        Self {
            iso_date: Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").unwrap(),
            slash_date: Regex::new(r"\b\d{1,2}/\d{1,2}/\d{2,4}\b").unwrap(),
            month_date: Regex::new(
                r"\b(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\s+\d{1,2},?\s+\d{4}\b",
            )
            .unwrap(),
            time: Regex::new(r"\b\d{1,2}:\d{2}(?::\d{2})?(?:\s?(?:AM|PM|am|pm))?\b").unwrap(),
        }
    }
}

struct RawMatch {
    byte_start: usize,
    byte_end: usize,
    confidence: f64,
    iso: Option<String>,
}

impl DateTimePlugin {
    pub fn new() -> Self {
        Self {
            patterns: DateTimePatterns::new(),
        }
    }

    fn collect(&self, text: &str) -> Vec<RawMatch> {
        let mut matches = Vec::new();

        for m in self.patterns.iso_date.find_iter(text) {
            let iso = NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d")
                .ok()
                .map(|date| date.to_string());
            matches.push(RawMatch {
                byte_start: m.start(),
                byte_end: m.end(),
                confidence: 0.95,
                iso,
            });
        }

        for m in self.patterns.month_date.find_iter(text) {
            let iso = Self::parse_month_date(m.as_str());
            matches.push(RawMatch {
                byte_start: m.start(),
                byte_end: m.end(),
                confidence: 0.85,
                iso,
            });
        }

        for m in self.patterns.slash_date.find_iter(text) {
            matches.push(RawMatch {
                byte_start: m.start(),
                byte_end: m.end(),
                confidence: 0.8,
                iso: None,
            });
        }

        for m in self.patterns.time.find_iter(text) {
            matches.push(RawMatch {
                byte_start: m.start(),
                byte_end: m.end(),
                confidence: 0.85,
                iso: None,
            });
        }

        Self::resolve_overlaps(matches)
    }

    fn parse_month_date(raw: &str) -> Option<String> {
        let cleaned = raw.replace(',', "");
        for format in ["%b %d %Y", "%B %d %Y"] {
            if let Ok(date) = NaiveDate::parse_from_str(&cleaned, format) {
                return Some(date.to_string());
            }
        }
        None
    }

    /// Keep the highest-confidence match when spans overlap
    fn resolve_overlaps(mut matches: Vec<RawMatch>) -> Vec<RawMatch> {
        matches.sort_by(|a, b| {
            a.byte_start.cmp(&b.byte_start).then_with(|| {
                b.confidence
                    .partial_cmp(&a.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
        });

        let mut resolved: Vec<RawMatch> = Vec::new();
        for m in matches {
            if resolved
                .last()
                .map_or(true, |last| m.byte_start >= last.byte_end)
            {
                resolved.push(m);
            }
        }
        resolved
    }
}

impl Default for DateTimePlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for DateTimePlugin {
    fn name(&self) -> &str {
        "datetime"
    }

    fn mode(&self) -> PassMode {
        PassMode::Realtime
    }

    async fn run(&self, ctx: &PluginContext) -> Result<PluginResult> {
        let mut upsert = Vec::new();

        for m in self.collect(&ctx.window.text) {
            let raw = &ctx.window.text[m.byte_start..m.byte_end];
            let span = char_span(&ctx.window, m.byte_start, m.byte_end);
            let key = format!("datetime:{}:{}:{}", raw, span.start, span.end);

            upsert.push(
                EntityCandidate::new(key, EntityKind::DateTime, span, raw)
                    .with_value(json!({ "raw": raw, "iso": m.iso }))
                    .with_confidence(m.confidence)
                    .with_status(status_for(ctx.mode)),
            );
        }

        Ok(PluginResult::upsert(upsert))
    }
}
