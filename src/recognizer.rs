//! Recognizer composition root
//!
//! Wires buffer, scheduler, runner, store, and emitter into the public
//! engine. Feeds update the buffer and arm the debounce timers; fired
//! timers spawn analysis passes; passes reconcile plugin candidates into
//! the store and translate the diff into events.
//!
//! ## Concurrency
//!
//! Passes run as spawned Tokio tasks. A newer pass of the same phase
//! cancels the previous one's token, and a pass re-checks its token after
//! the plugin run so a superseded pass never reconciles. Reconciliation and
//! event emission happen in one synchronous stretch under a dispatch lock,
//! so each pass's event batch is contiguous: all removes, then adds, then
//! updates.
//!
//! ## Example
//!
//! ```no_run
//! use argus::{plugins, Recognizer, FeedInput};
//!
//! # async fn demo() {
//! let recognizer = Recognizer::new(plugins::standard_plugins());
//! recognizer.on_entity(|event| {
//!     println!("{:?} {}", event.entity.kind, event.entity.text);
//! });
//! recognizer.feed(FeedInput::text("convert 10 km to mi"));
//! # }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::buffer::Buffer;
use crate::config::{RecognizerConfig, ScheduleConfig, Thresholds};
use crate::emitter::{Emitter, SubscriptionId};
use crate::error::Result;
use crate::plugin::{EntitySink, PassMode, Plugin, PluginContext};
use crate::runner::PluginRunner;
use crate::scheduler::Scheduler;
use crate::store::EntityStore;
use crate::types::{
    DiagnosticEvent, Entity, EntityCandidate, EntityEvent, EntityStatus, RemoveEvent,
};

/// Why a commit was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitReason {
    Enter,
    Blur,
    Timeout,
    Manual,
}

impl fmt::Display for CommitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitReason::Enter => write!(f, "enter"),
            CommitReason::Blur => write!(f, "blur"),
            CommitReason::Timeout => write!(f, "timeout"),
            CommitReason::Manual => write!(f, "manual"),
        }
    }
}

/// Feed metadata
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedMeta {
    /// IME composition state, when the client tracks it
    pub composing: Option<bool>,
}

/// One buffer snapshot from the client
#[derive(Debug, Clone)]
pub struct FeedInput {
    pub text: String,

    /// Cursor position in characters; defaults to the end of the text
    pub cursor: Option<usize>,

    pub meta: Option<FeedMeta>,
}

impl FeedInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            cursor: None,
            meta: None,
        }
    }

    pub fn with_cursor(mut self, cursor: usize) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn composing(mut self, composing: bool) -> Self {
        self.meta = Some(FeedMeta {
            composing: Some(composing),
        });
        self
    }
}

/// Snapshot of the engine state
#[derive(Debug, Clone)]
pub struct RecognizerState {
    pub text: String,
    pub revision: u64,
    pub entities: Vec<Entity>,
    pub pending_commit: bool,
}

#[derive(Default)]
struct PassTokens {
    realtime: Option<CancellationToken>,
    commit: Option<CancellationToken>,
}

struct Shared {
    config: RecognizerConfig,
    buffer: Mutex<Buffer>,
    store: Mutex<EntityStore>,
    emitter: Emitter,
    runner: PluginRunner,
    scheduler: Scheduler,
    passes: Mutex<PassTokens>,
    // Held across reconcile + emit so pass batches stay contiguous
    dispatch: Mutex<()>,
    destroyed: AtomicBool,
}

/// Incremental semantic recognizer for streaming text
///
/// Create one per input surface, feed it buffer snapshots as the user
/// types, and subscribe to the event channels. All public operations are
/// no-ops after [`destroy`](Recognizer::destroy). Construction and feeding
/// require a Tokio runtime context.
pub struct Recognizer {
    shared: Arc<Shared>,
}

impl Recognizer {
    /// Create a recognizer with default configuration
    pub fn new(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        Self::builder().plugins(plugins).build()
    }

    pub fn builder() -> RecognizerBuilder {
        RecognizerBuilder::new()
    }

    fn with_config(plugins: Vec<Arc<dyn Plugin>>, config: RecognizerConfig) -> Self {
        let shared = Arc::new_cyclic(|weak: &Weak<Shared>| {
            let realtime_weak = weak.clone();
            let commit_weak = weak.clone();
            let scheduler = Scheduler::new(
                config.schedule,
                Arc::new(move || Shared::spawn_pass(&realtime_weak, PassMode::Realtime)),
                Arc::new(move || Shared::spawn_pass(&commit_weak, PassMode::Commit)),
            );

            Shared {
                runner: PluginRunner::new(plugins, config.thresholds),
                buffer: Mutex::new(Buffer::new()),
                store: Mutex::new(EntityStore::new()),
                emitter: Emitter::new(),
                scheduler,
                passes: Mutex::new(PassTokens::default()),
                dispatch: Mutex::new(()),
                destroyed: AtomicBool::new(false),
                config,
            }
        });

        Self { shared }
    }

    /// Accept a buffer snapshot
    ///
    /// Arms the debounce timers when the text changed. Composition metadata
    /// gates scheduling: the feed that starts composition returns early,
    /// later feeds keep the buffer current while the gate holds, and the
    /// feed that ends composition resumes analysis.
    pub fn feed(&self, input: FeedInput) {
        let shared = &self.shared;
        if shared.destroyed.load(Ordering::SeqCst) {
            return;
        }

        if let Some(meta) = &input.meta {
            if let Some(composing) = meta.composing {
                let was_composing = shared.scheduler.is_composing();
                shared.scheduler.set_composing(composing);
                if composing && !was_composing {
                    return;
                }
            }
        }

        let changed = shared
            .buffer
            .lock()
            .unwrap()
            .update(&input.text, input.cursor);
        if changed {
            shared.scheduler.schedule_analysis();
        }
    }

    /// Cancel pending timers and run the commit phase immediately
    pub fn commit(&self, reason: CommitReason) {
        let shared = &self.shared;
        if shared.destroyed.load(Ordering::SeqCst) {
            return;
        }

        shared.emitter.emit_diagnostic(
            &DiagnosticEvent::info(format!("Commit triggered: {reason}")).with_source("recognizer"),
        );
        shared.scheduler.force_commit();
    }

    /// Snapshot of the current text, revision, entities, and whether a
    /// commit timer is pending
    pub fn state(&self) -> RecognizerState {
        let shared = &self.shared;
        let (text, revision) = {
            let buffer = shared.buffer.lock().unwrap();
            (buffer.text().to_string(), buffer.revision())
        };

        RecognizerState {
            text,
            revision,
            entities: shared.store.lock().unwrap().get_all(),
            pending_commit: shared.scheduler.is_pending_commit(),
        }
    }

    pub fn on_entity(
        &self,
        handler: impl FnMut(&EntityEvent) + Send + 'static,
    ) -> SubscriptionId {
        if self.shared.destroyed.load(Ordering::SeqCst) {
            return SubscriptionId::default();
        }
        self.shared.emitter.on_entity(handler)
    }

    pub fn on_remove(
        &self,
        handler: impl FnMut(&RemoveEvent) + Send + 'static,
    ) -> SubscriptionId {
        if self.shared.destroyed.load(Ordering::SeqCst) {
            return SubscriptionId::default();
        }
        self.shared.emitter.on_remove(handler)
    }

    pub fn on_diagnostic(
        &self,
        handler: impl FnMut(&DiagnosticEvent) + Send + 'static,
    ) -> SubscriptionId {
        if self.shared.destroyed.load(Ordering::SeqCst) {
            return SubscriptionId::default();
        }
        self.shared.emitter.on_diagnostic(handler)
    }

    pub fn off_entity(&self, id: SubscriptionId) -> bool {
        self.shared.emitter.off_entity(id)
    }

    pub fn off_remove(&self, id: SubscriptionId) -> bool {
        self.shared.emitter.off_remove(id)
    }

    pub fn off_diagnostic(&self, id: SubscriptionId) -> bool {
        self.shared.emitter.off_diagnostic(id)
    }

    /// Tear down the recognizer
    ///
    /// Cancels outstanding passes and timers, drops all listeners, clears
    /// the store, and resets the buffer. Idempotent; every public operation
    /// afterwards is a no-op.
    pub fn destroy(&self) {
        let shared = &self.shared;
        if shared.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        {
            let mut passes = shared.passes.lock().unwrap();
            if let Some(token) = passes.realtime.take() {
                token.cancel();
            }
            if let Some(token) = passes.commit.take() {
                token.cancel();
            }
        }

        shared.scheduler.destroy();
        shared.emitter.remove_all(None);
        shared.store.lock().unwrap().clear();
        shared.buffer.lock().unwrap().reset();
    }
}

impl Drop for Recognizer {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl Shared {
    fn spawn_pass(weak: &Weak<Shared>, mode: PassMode) {
        if let Some(shared) = weak.upgrade() {
            tokio::spawn(async move {
                Shared::run_pass(shared, mode).await;
            });
        }
    }

    async fn run_pass(shared: Arc<Shared>, mode: PassMode) {
        if shared.destroyed.load(Ordering::SeqCst) {
            return;
        }

        // Supersede any in-flight pass of the same phase
        let token = CancellationToken::new();
        {
            let mut passes = shared.passes.lock().unwrap();
            let slot = match mode {
                PassMode::Realtime => &mut passes.realtime,
                PassMode::Commit => &mut passes.commit,
            };
            if let Some(previous) = slot.replace(token.clone()) {
                previous.cancel();
            }
        }

        if let Err(err) = Self::execute_pass(&shared, mode, &token).await {
            error!(%mode, error = %err, "analysis pass failed");
            if !shared.destroyed.load(Ordering::SeqCst) {
                shared.emitter.emit_diagnostic(
                    &DiagnosticEvent::error(format!("{mode} pass failed: {err}"))
                        .with_source("recognizer"),
                );
            }
        }
    }

    async fn execute_pass(
        shared: &Arc<Shared>,
        mode: PassMode,
        token: &CancellationToken,
    ) -> Result<()> {
        let (text, cursor, window, revision) = {
            let buffer = shared.buffer.lock().unwrap();
            (
                buffer.text().to_string(),
                buffer.cursor(),
                buffer.window(shared.config.window_size),
                buffer.revision(),
            )
        };
        let entities = shared.store.lock().unwrap().get_all();

        let sink = {
            let weak = Arc::downgrade(shared);
            let sink_token = token.clone();
            EntitySink::new(move |candidate| {
                if let Some(shared) = weak.upgrade() {
                    shared.streamed_upsert(candidate, &sink_token);
                }
            })
        };

        let ctx = PluginContext {
            text,
            window,
            cursor,
            mode,
            entities,
            sink: Some(sink),
            cancel: token.clone(),
        };

        let result = shared.runner.run(mode, &ctx).await;

        if shared.destroyed.load(Ordering::SeqCst) || token.is_cancelled() {
            debug!(%mode, "pass superseded; discarding result");
            return Ok(());
        }

        for fault in &result.faults {
            shared.emitter.emit_diagnostic(
                &DiagnosticEvent::warning(format!("Plugin failed: {}", fault.message))
                    .with_source(fault.plugin.clone()),
            );
        }

        let mut candidates = result.upsert;
        if mode == PassMode::Commit {
            for candidate in &mut candidates {
                candidate.status = EntityStatus::Confirmed;
            }
        }

        // The buffer may have advanced while plugins were suspended. The
        // results are still reconciled best-effort, with spans clamped to
        // the current text so out-of-range spans never surface.
        let current_len = {
            let buffer = shared.buffer.lock().unwrap();
            if buffer.revision() != revision {
                debug!(%mode, revision, "buffer advanced during pass; clamping spans");
            }
            buffer.len_chars()
        };
        candidates.retain_mut(|candidate| {
            candidate.span.end = candidate.span.end.min(current_len);
            candidate.span.start < candidate.span.end
        });

        let _dispatch = shared.dispatch.lock().unwrap();
        let diff = shared.store.lock().unwrap().reconcile(&candidates);

        if shared.destroyed.load(Ordering::SeqCst) {
            return Ok(());
        }

        for entity in &diff.removed {
            shared.emitter.emit_remove(&RemoveEvent {
                id: entity.id.clone(),
                key: entity.key.clone(),
            });
        }
        for entity in diff.added {
            shared.emitter.emit_entity(&EntityEvent {
                entity,
                is_update: false,
            });
        }
        for entity in diff.updated {
            shared.emitter.emit_entity(&EntityEvent {
                entity,
                is_update: true,
            });
        }

        if mode == PassMode::Commit {
            let promoted = shared.store.lock().unwrap().confirm_all();
            for entity in promoted {
                shared.emitter.emit_entity(&EntityEvent {
                    entity,
                    is_update: true,
                });
            }
        }

        Ok(())
    }

    /// Immediate single-candidate upsert from a streaming plugin
    fn streamed_upsert(&self, mut candidate: EntityCandidate, token: &CancellationToken) {
        if self.destroyed.load(Ordering::SeqCst) || token.is_cancelled() {
            return;
        }

        let current_len = self.buffer.lock().unwrap().len_chars();
        candidate.span.end = candidate.span.end.min(current_len);
        if candidate.span.is_empty() {
            return;
        }

        let _dispatch = self.dispatch.lock().unwrap();
        let diff = self
            .store
            .lock()
            .unwrap()
            .upsert(std::slice::from_ref(&candidate));
        for entity in diff.added {
            self.emitter.emit_entity(&EntityEvent {
                entity,
                is_update: false,
            });
        }
        for entity in diff.updated {
            self.emitter.emit_entity(&EntityEvent {
                entity,
                is_update: true,
            });
        }
    }
}

/// Builder for [`Recognizer`]
pub struct RecognizerBuilder {
    plugins: Vec<Arc<dyn Plugin>>,
    config: RecognizerConfig,
}

impl RecognizerBuilder {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
            config: RecognizerConfig::default(),
        }
    }

    /// Register a plugin
    pub fn plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    /// Register a batch of plugins, keeping their order
    pub fn plugins(mut self, plugins: Vec<Arc<dyn Plugin>>) -> Self {
        self.plugins.extend(plugins);
        self
    }

    pub fn schedule(mut self, schedule: ScheduleConfig) -> Self {
        self.config.schedule = schedule;
        self
    }

    pub fn thresholds(mut self, thresholds: Thresholds) -> Self {
        self.config.thresholds = thresholds;
        self
    }

    pub fn window_size(mut self, window_size: usize) -> Self {
        self.config.window_size = window_size;
        self
    }

    pub fn build(self) -> Recognizer {
        Recognizer::with_config(self.plugins, self.config)
    }
}

impl Default for RecognizerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
