//! Plugin orchestration
//!
//! Runs the plugins registered for a phase in priority order, one at a
//! time, and folds their results into a single candidate set. A failing
//! plugin contributes an empty result and is reported as a fault; it never
//! aborts the run.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::Thresholds;
use crate::plugin::{PassMode, Plugin, PluginContext, PluginResult};
use crate::types::EntityCandidate;

/// A plugin failure recovered during a run
#[derive(Debug, Clone)]
pub struct PluginFault {
    pub plugin: String,
    pub message: String,
}

/// Merged outcome of one run
#[derive(Debug, Clone, Default)]
pub struct RunnerResult {
    /// Merged candidates that met the phase threshold
    pub upsert: Vec<EntityCandidate>,

    /// Keys explicitly retracted by plugins, in sorted order
    pub remove: Vec<String>,

    /// Faults recovered from failing plugins
    pub faults: Vec<PluginFault>,
}

/// Executes registered plugins and merges their candidate sets
pub struct PluginRunner {
    realtime: Vec<Arc<dyn Plugin>>,
    commit: Vec<Arc<dyn Plugin>>,
    thresholds: Thresholds,
}

impl PluginRunner {
    /// Partition plugins by mode and order each partition by ascending
    /// priority, registration order breaking ties
    pub fn new(plugins: Vec<Arc<dyn Plugin>>, thresholds: Thresholds) -> Self {
        let mut realtime = Vec::new();
        let mut commit = Vec::new();
        for plugin in plugins {
            match plugin.mode() {
                PassMode::Realtime => realtime.push(plugin),
                PassMode::Commit => commit.push(plugin),
            }
        }
        realtime.sort_by_key(|plugin| plugin.priority());
        commit.sort_by_key(|plugin| plugin.priority());

        Self {
            realtime,
            commit,
            thresholds,
        }
    }

    /// Plugins participating in the given phase
    ///
    /// The commit phase re-runs realtime plugins ahead of commit plugins so
    /// provisional spans get re-detected and confirmed.
    fn plugins_for(&self, mode: PassMode) -> Vec<&Arc<dyn Plugin>> {
        match mode {
            PassMode::Realtime => self.realtime.iter().collect(),
            PassMode::Commit => self.realtime.iter().chain(self.commit.iter()).collect(),
        }
    }

    /// Run one phase over the context
    ///
    /// Plugins run sequentially; each is awaited before the next starts.
    /// Merging walks results in order: later candidates override earlier
    /// ones with the same key, and a retracted key drops out of the merged
    /// set entirely. The merged candidates are then filtered by the phase's
    /// confidence threshold.
    pub async fn run(&self, mode: PassMode, ctx: &PluginContext) -> RunnerResult {
        let mut order: Vec<String> = Vec::new();
        let mut by_key: HashMap<String, EntityCandidate> = HashMap::new();
        let mut retracted: HashSet<String> = HashSet::new();
        let mut faults = Vec::new();

        for plugin in self.plugins_for(mode) {
            if ctx.cancel.is_cancelled() {
                debug!(%mode, "run cancelled; skipping remaining plugins");
                break;
            }

            let result = match plugin.run(ctx).await {
                Ok(result) => result,
                Err(err) => {
                    warn!(plugin = plugin.name(), error = %err, "plugin run failed");
                    faults.push(PluginFault {
                        plugin: plugin.name().to_string(),
                        message: err.to_string(),
                    });
                    PluginResult::default()
                }
            };

            for candidate in result.upsert {
                if !by_key.contains_key(&candidate.key) {
                    order.push(candidate.key.clone());
                }
                by_key.insert(candidate.key.clone(), candidate);
            }
            retracted.extend(result.remove);
        }

        let threshold = match mode {
            PassMode::Realtime => self.thresholds.realtime,
            PassMode::Commit => self.thresholds.commit,
        };

        let upsert: Vec<EntityCandidate> = order
            .iter()
            .filter(|key| !retracted.contains(*key))
            .filter_map(|key| by_key.remove(key))
            .filter(|candidate| candidate.confidence >= threshold)
            .collect();

        let mut remove: Vec<String> = retracted.into_iter().collect();
        remove.sort();

        RunnerResult {
            upsert,
            remove,
            faults,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Window;
    use crate::error::RecognizerError;
    use crate::types::{EntityKind, Span};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    fn context(mode: PassMode) -> PluginContext {
        PluginContext {
            text: "some text".to_string(),
            window: Window {
                text: "some text".to_string(),
                offset: 0,
            },
            cursor: 0,
            mode,
            entities: Vec::new(),
            sink: None,
            cancel: CancellationToken::new(),
        }
    }

    fn candidate(key: &str, confidence: f64) -> EntityCandidate {
        EntityCandidate::new(key, EntityKind::Custom, Span::new(0, 4), "some")
            .with_confidence(confidence)
    }

    struct FixedPlugin {
        name: &'static str,
        mode: PassMode,
        priority: i32,
        result: PluginResult,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Plugin for FixedPlugin {
        fn name(&self) -> &str {
            self.name
        }

        fn mode(&self) -> PassMode {
            self.mode
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        async fn run(&self, _ctx: &PluginContext) -> crate::error::Result<PluginResult> {
            self.calls.lock().unwrap().push(self.name);
            Ok(self.result.clone())
        }
    }

    struct FailingPlugin;

    #[async_trait]
    impl Plugin for FailingPlugin {
        fn name(&self) -> &str {
            "broken"
        }

        fn mode(&self) -> PassMode {
            PassMode::Realtime
        }

        async fn run(&self, _ctx: &PluginContext) -> crate::error::Result<PluginResult> {
            Err(RecognizerError::Other("synthetic failure".to_string()))
        }
    }

    fn fixed(
        name: &'static str,
        mode: PassMode,
        priority: i32,
        result: PluginResult,
        calls: &Arc<Mutex<Vec<&'static str>>>,
    ) -> Arc<dyn Plugin> {
        Arc::new(FixedPlugin {
            name,
            mode,
            priority,
            result,
            calls: Arc::clone(calls),
        })
    }

    #[tokio::test]
    async fn test_priority_order_with_insertion_ties() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let runner = PluginRunner::new(
            vec![
                fixed("late", PassMode::Realtime, 200, PluginResult::default(), &calls),
                fixed("first-tie", PassMode::Realtime, 100, PluginResult::default(), &calls),
                fixed("second-tie", PassMode::Realtime, 100, PluginResult::default(), &calls),
                fixed("early", PassMode::Realtime, 10, PluginResult::default(), &calls),
            ],
            Thresholds::default(),
        );

        runner.run(PassMode::Realtime, &context(PassMode::Realtime)).await;
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["early", "first-tie", "second-tie", "late"]
        );
    }

    #[tokio::test]
    async fn test_commit_phase_reruns_realtime_plugins() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let runner = PluginRunner::new(
            vec![
                fixed("confirming", PassMode::Commit, 100, PluginResult::default(), &calls),
                fixed("fast", PassMode::Realtime, 100, PluginResult::default(), &calls),
            ],
            Thresholds::default(),
        );

        runner.run(PassMode::Commit, &context(PassMode::Commit)).await;
        assert_eq!(*calls.lock().unwrap(), vec!["fast", "confirming"]);

        calls.lock().unwrap().clear();
        runner.run(PassMode::Realtime, &context(PassMode::Realtime)).await;
        assert_eq!(*calls.lock().unwrap(), vec!["fast"]);
    }

    #[tokio::test]
    async fn test_later_result_overrides_earlier_key() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let runner = PluginRunner::new(
            vec![
                fixed(
                    "a",
                    PassMode::Realtime,
                    10,
                    PluginResult::upsert(vec![candidate("k", 0.85), candidate("other", 0.9)]),
                    &calls,
                ),
                fixed(
                    "b",
                    PassMode::Realtime,
                    20,
                    PluginResult::upsert(vec![candidate("k", 0.95)]),
                    &calls,
                ),
            ],
            Thresholds::default(),
        );

        let result = runner.run(PassMode::Realtime, &context(PassMode::Realtime)).await;
        assert_eq!(result.upsert.len(), 2);
        // First-seen position is kept, later confidence wins
        assert_eq!(result.upsert[0].key, "k");
        assert_eq!(result.upsert[0].confidence, 0.95);
        assert_eq!(result.upsert[1].key, "other");
    }

    #[tokio::test]
    async fn test_retracted_key_dropped_from_merge() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let runner = PluginRunner::new(
            vec![
                fixed(
                    "producer",
                    PassMode::Realtime,
                    10,
                    PluginResult::upsert(vec![candidate("gone", 0.9), candidate("kept", 0.9)]),
                    &calls,
                ),
                fixed(
                    "retractor",
                    PassMode::Realtime,
                    20,
                    PluginResult {
                        upsert: Vec::new(),
                        remove: vec!["gone".to_string()],
                    },
                    &calls,
                ),
            ],
            Thresholds::default(),
        );

        let result = runner.run(PassMode::Realtime, &context(PassMode::Realtime)).await;
        assert_eq!(result.upsert.len(), 1);
        assert_eq!(result.upsert[0].key, "kept");
        assert_eq!(result.remove, vec!["gone".to_string()]);
    }

    #[tokio::test]
    async fn test_threshold_depends_on_phase() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let result = PluginResult::upsert(vec![candidate("strong", 0.9), candidate("weak", 0.6)]);
        let runner = PluginRunner::new(
            vec![fixed("matcher", PassMode::Realtime, 100, result, &calls)],
            Thresholds::default(),
        );

        let realtime = runner.run(PassMode::Realtime, &context(PassMode::Realtime)).await;
        assert_eq!(realtime.upsert.len(), 1);
        assert_eq!(realtime.upsert[0].key, "strong");

        let commit = runner.run(PassMode::Commit, &context(PassMode::Commit)).await;
        assert_eq!(commit.upsert.len(), 2);
    }

    #[tokio::test]
    async fn test_failing_plugin_recovered_as_fault() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let runner = PluginRunner::new(
            vec![
                Arc::new(FailingPlugin) as Arc<dyn Plugin>,
                fixed(
                    "survivor",
                    PassMode::Realtime,
                    200,
                    PluginResult::upsert(vec![candidate("k", 0.9)]),
                    &calls,
                ),
            ],
            Thresholds::default(),
        );

        let result = runner.run(PassMode::Realtime, &context(PassMode::Realtime)).await;
        assert_eq!(result.upsert.len(), 1);
        assert_eq!(result.faults.len(), 1);
        assert_eq!(result.faults[0].plugin, "broken");
        assert!(result.faults[0].message.contains("synthetic failure"));
    }

    #[tokio::test]
    async fn test_cancelled_context_short_circuits() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let runner = PluginRunner::new(
            vec![fixed(
                "matcher",
                PassMode::Realtime,
                100,
                PluginResult::upsert(vec![candidate("k", 0.9)]),
                &calls,
            )],
            Thresholds::default(),
        );

        let ctx = context(PassMode::Realtime);
        ctx.cancel.cancel();
        let result = runner.run(PassMode::Realtime, &ctx).await;
        assert!(result.upsert.is_empty());
        assert!(calls.lock().unwrap().is_empty());
    }
}
