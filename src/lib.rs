//! Argus - Incremental Semantic Recognizer for Streaming Text
//!
//! A recognizer engine in the spirit of a language server, but for
//! natural-language entities: quantities, dates, emails, URLs, phone
//! numbers, and arbitrary user-defined kinds. A client feeds buffer
//! snapshots (full text plus cursor position) as the user types; the engine
//! emits a stream of structured events describing the current entity set.
//!
//! # Architecture
//!
//! Five cooperating components behind one composition root:
//! - **Buffer**: text, cursor, and revision tracking with cursor-centered
//!   analysis windows that bound per-keystroke cost
//! - **Store**: key-indexed entity table with stable identities and
//!   add/update/remove reconciliation diffs
//! - **Emitter**: per-channel subscription registry with fault isolation
//! - **Scheduler**: debounced dual timers (fast provisional pass, slower
//!   confirming pass) with an IME composition gate
//! - **Runner**: plugin orchestration with priority ordering, threshold
//!   filtering, result merging, and cancellation
//!
//! Determinism holds: the same sequence of feed/commit inputs produces the
//! same event sequence.
//!
//! # Example
//!
//! ```no_run
//! use argus::{plugins, FeedInput, Recognizer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let recognizer = Recognizer::new(plugins::standard_plugins());
//!
//!     recognizer.on_entity(|event| {
//!         let entity = &event.entity;
//!         println!("{:?} '{}' at {}..{}", entity.kind, entity.text,
//!             entity.span.start, entity.span.end);
//!     });
//!
//!     recognizer.feed(FeedInput::text("convert 10 km to mi").with_cursor(18));
//!     tokio::time::sleep(std::time::Duration::from_millis(200)).await;
//! }
//! ```

pub mod buffer;
pub mod config;
pub mod emitter;
pub mod error;
pub mod plugin;
pub mod plugins;
pub mod recognizer;
pub mod runner;
pub mod scheduler;
pub mod store;
pub mod types;

// Re-export the public surface
pub use buffer::{Buffer, Window};
pub use config::{RecognizerConfig, ScheduleConfig, Thresholds};
pub use emitter::{EventChannel, SubscriptionId};
pub use error::{RecognizerError, Result};
pub use plugin::{EntitySink, PassMode, Plugin, PluginContext, PluginResult};
pub use recognizer::{
    CommitReason, FeedInput, FeedMeta, Recognizer, RecognizerBuilder, RecognizerState,
};
pub use store::{EntityStore, ReconcileDiff, UpsertDiff};
pub use types::{
    DiagnosticEvent, DiagnosticSeverity, Entity, EntityCandidate, EntityEvent, EntityKind,
    EntityStatus, RemoveEvent, Span,
};
