//! Core data structures for entities and events
//!
//! Entities are keyed by a plugin-chosen deduplication string and carry an
//! engine-minted opaque id. All indices are character offsets into the fed
//! text, never byte offsets.

use serde::{Deserialize, Serialize};

/// Half-open character interval `[start, end)` in the full text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Length in characters
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Whether the span is a valid non-empty interval within a text of
    /// `text_len` characters
    pub fn in_bounds(&self, text_len: usize) -> bool {
        self.start < self.end && self.end <= text_len
    }
}

/// Entity classification
///
/// Closed enumeration; plugins producing shapes outside the built-in kinds
/// use `Custom` and attach their own `value` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Quantity,
    DateTime,
    Email,
    Phone,
    Url,
    Person,
    Place,
    Custom,
}

/// Lifecycle tag for an entity
///
/// `Provisional` entities come from a realtime pass and may be replaced;
/// `Confirmed` entities come from a commit pass and are stable until removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    Provisional,
    Confirmed,
}

/// Plugin output record, before the store assigns an id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityCandidate {
    /// Stable deduplication key under the plugin's control
    /// (e.g. `quantity:10:km:8:13`). Two candidates with the same key are
    /// the same logical entity instance.
    pub key: String,

    pub kind: EntityKind,

    pub span: Span,

    /// The matched text
    pub text: String,

    /// Opaque structured data owned by the producing plugin
    pub value: serde_json::Value,

    /// Confidence in [0, 1]
    pub confidence: f64,

    pub status: EntityStatus,
}

impl EntityCandidate {
    pub fn new(key: impl Into<String>, kind: EntityKind, span: Span, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind,
            span,
            text: text.into(),
            value: serde_json::Value::Null,
            confidence: 1.0,
            status: EntityStatus::Provisional,
        }
    }

    pub fn with_value(mut self, value: serde_json::Value) -> Self {
        self.value = value;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_status(mut self, status: EntityStatus) -> Self {
        self.status = status;
        self
    }
}

/// A stored candidate augmented with an engine-minted id
///
/// The id is opaque: consumers must not parse it. It stays stable across
/// updates of the same key and is never reused after removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub key: String,
    pub kind: EntityKind,
    pub span: Span,
    pub text: String,
    pub value: serde_json::Value,
    pub confidence: f64,
    pub status: EntityStatus,
}

impl Entity {
    pub(crate) fn from_candidate(id: String, candidate: &EntityCandidate) -> Self {
        Self {
            id,
            key: candidate.key.clone(),
            kind: candidate.kind,
            span: candidate.span,
            text: candidate.text.clone(),
            value: candidate.value.clone(),
            confidence: candidate.confidence,
            status: candidate.status,
        }
    }
}

/// Event on the `entity` channel: an entity was added or updated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityEvent {
    pub entity: Entity,
    /// False for the first report of a key, true for subsequent reports
    pub is_update: bool,
}

/// Event on the `remove` channel: a previously reported entity disappeared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveEvent {
    pub id: String,
    pub key: String,
}

/// Severity of a diagnostic event
///
/// `Info` marks lifecycle notices, `Warning` recoverable plugin or input
/// anomalies, `Error` a pass or handler fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
}

/// Event on the `diagnostic` channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    pub severity: DiagnosticSeverity,
    pub message: String,
    pub span: Option<Span>,
    pub source: Option<String>,
}

impl DiagnosticEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Warning, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Info, message)
    }

    fn with_severity(severity: DiagnosticSeverity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            span: None,
            source: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}
