//! Configuration for the recognizer engine

use serde::{Deserialize, Serialize};

/// Debounce intervals for the two analysis phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Quiescence before the fast provisional pass fires, in milliseconds
    pub realtime_ms: u64,

    /// Quiescence before the confirming pass fires, in milliseconds
    pub commit_after_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            realtime_ms: 150,
            commit_after_ms: 700,
        }
    }
}

/// Minimum confidence a merged candidate needs to survive a pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub realtime: f64,
    pub commit: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            realtime: 0.8,
            commit: 0.5,
        }
    }
}

/// Full recognizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizerConfig {
    pub schedule: ScheduleConfig,

    pub thresholds: Thresholds,

    /// Size of the cursor-centered analysis window, in characters
    pub window_size: usize,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            schedule: ScheduleConfig::default(),
            thresholds: Thresholds::default(),
            window_size: 500,
        }
    }
}
