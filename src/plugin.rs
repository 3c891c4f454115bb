//! Plugin contract
//!
//! A plugin is any matcher behind the [`Plugin`] trait: the built-in regex
//! matchers, user-defined detectors, and remote analyzers all look the same
//! to the engine. Plugins receive an immutable context snapshot, may suspend
//! on I/O, and return the candidates they currently see. Long-running
//! plugins should check the cancellation token at suspension points and may
//! stream candidates through the optional sink as they are discovered.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::buffer::Window;
use crate::error::Result;
use crate::types::{Entity, EntityCandidate};

/// The two analysis phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassMode {
    Realtime,
    Commit,
}

impl fmt::Display for PassMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassMode::Realtime => write!(f, "realtime"),
            PassMode::Commit => write!(f, "commit"),
        }
    }
}

/// Incremental candidate sink for streaming plugins
///
/// Each pushed candidate is upserted immediately and surfaced as an
/// `entity` event without waiting for the plugin to finish. The plugin must
/// still include every pushed candidate in its final [`PluginResult`] so
/// reconciliation can compute removals. Pushes after cancellation are
/// dropped.
#[derive(Clone)]
pub struct EntitySink {
    deliver: Arc<dyn Fn(EntityCandidate) + Send + Sync>,
}

impl EntitySink {
    pub(crate) fn new(deliver: impl Fn(EntityCandidate) + Send + Sync + 'static) -> Self {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    pub fn push(&self, candidate: EntityCandidate) {
        (self.deliver)(candidate);
    }
}

impl fmt::Debug for EntitySink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitySink").finish_non_exhaustive()
    }
}

/// Immutable snapshot handed to a plugin for one run
#[derive(Debug, Clone)]
pub struct PluginContext {
    /// Full buffer text
    pub text: String,

    /// Cursor-centered slice; bounded analysis should stay inside it
    pub window: Window,

    /// Absolute cursor position in characters
    pub cursor: usize,

    /// Phase this run belongs to
    pub mode: PassMode,

    /// Current store snapshot
    pub entities: Vec<Entity>,

    /// Optional incremental sink for streaming plugins
    pub sink: Option<EntitySink>,

    /// Cancellation signal; a newer pass or destroy cancels this run
    pub cancel: CancellationToken,
}

/// Candidates produced by one plugin run
#[derive(Debug, Clone, Default)]
pub struct PluginResult {
    /// Candidates that should exist, keyed for deduplication
    pub upsert: Vec<EntityCandidate>,

    /// Keys the plugin explicitly retracts
    pub remove: Vec<String>,
}

impl PluginResult {
    pub fn upsert(candidates: Vec<EntityCandidate>) -> Self {
        Self {
            upsert: candidates,
            remove: Vec::new(),
        }
    }
}

/// A recognizer plugin
///
/// `mode` decides which phase runs the plugin: realtime plugins run in both
/// phases (the confirming pass re-runs them so provisional spans get
/// confirmed), commit plugins only in the commit phase. Lower `priority`
/// runs earlier; ties keep registration order.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn mode(&self) -> PassMode;

    fn priority(&self) -> i32 {
        100
    }

    async fn run(&self, ctx: &PluginContext) -> Result<PluginResult>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntityKind, Span};
    use std::sync::Mutex;

    struct NullPlugin;

    #[async_trait]
    impl Plugin for NullPlugin {
        fn name(&self) -> &str {
            "null"
        }

        fn mode(&self) -> PassMode {
            PassMode::Realtime
        }

        async fn run(&self, _ctx: &PluginContext) -> Result<PluginResult> {
            Ok(PluginResult::default())
        }
    }

    #[test]
    fn test_default_priority() {
        assert_eq!(NullPlugin.priority(), 100);
    }

    #[test]
    fn test_sink_delivers() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = Arc::clone(&received);
        let sink = EntitySink::new(move |candidate| {
            received_clone.lock().unwrap().push(candidate.key.clone());
        });

        sink.push(EntityCandidate::new(
            "k",
            EntityKind::Custom,
            Span::new(0, 1),
            "x",
        ));
        assert_eq!(*received.lock().unwrap(), vec!["k"]);
    }
}
