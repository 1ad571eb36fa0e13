//! Core configuration for cadence-animation-core.

use cadence_interp_core::InterpSettings;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::layers::N_MAX;

/// Frame timing, interpolation window and animation feature switches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds per simulation tick.
    pub tick_interval: f32,
    /// Requested interpolation window in seconds.
    pub interp: f32,
    /// Interpolation window expressed in snapshot intervals; the larger of the two wins.
    pub interp_ratio: f32,
    /// Snapshots received per second.
    pub update_rate: f32,
    /// When off, every object snaps to its newest samples each frame.
    pub interpolation_enabled: bool,
    /// Upper bound on concurrent overlay layers per object (at most 15).
    pub max_layers: usize,
    /// Backward cycle jump (in cycles) treated as a loop wrap by the event dispatcher.
    pub loop_wrap_threshold: f32,
    /// Cross-fade base sequence changes instead of cutting.
    pub maintain_sequence_transitions: bool,
    /// Shared sample history settings.
    pub history: InterpSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_interval: 1.0 / 64.0,
            interp: 0.03125,
            interp_ratio: 2.0,
            update_rate: 64.0,
            interpolation_enabled: true,
            max_layers: N_MAX,
            loop_wrap_threshold: 0.5,
            maintain_sequence_transitions: true,
            history: InterpSettings::default(),
        }
    }
}

impl Config {
    pub fn with_tick_interval(mut self, seconds: f32) -> Self {
        self.tick_interval = seconds;
        self
    }

    pub fn with_interp(mut self, interp: f32, ratio: f32, update_rate: f32) -> Self {
        self.interp = interp;
        self.interp_ratio = ratio;
        self.update_rate = update_rate;
        self
    }

    pub fn with_interpolation(mut self, enabled: bool) -> Self {
        self.interpolation_enabled = enabled;
        self
    }

    pub fn with_loop_wrap_threshold(mut self, threshold: f32) -> Self {
        self.loop_wrap_threshold = threshold;
        self
    }

    pub fn with_sequence_transitions(mut self, enabled: bool) -> Self {
        self.maintain_sequence_transitions = enabled;
        self
    }

    pub fn with_history(mut self, history: InterpSettings) -> Self {
        self.history = history;
        self
    }

    /// Whole ticks in `seconds`, rounded to nearest.
    #[inline]
    pub fn time_to_ticks(&self, seconds: f32) -> i32 {
        (0.5 + seconds / self.tick_interval) as i32
    }

    /// How far behind `now` networked objects are rendered. Predicted objects run
    /// one tick behind their own simulation clock.
    pub fn interpolation_amount(&self, predicted: bool) -> f32 {
        if predicted {
            return self.tick_interval;
        }
        let window = self.interp.max(self.interp_ratio / self.update_rate);
        self.tick_interval * (self.time_to_ticks(window) + 1) as f32
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if !(self.tick_interval > 0.0) {
            return Err(CoreError::InvalidConfig {
                reason: "tick_interval must be positive".into(),
            });
        }
        if !(self.update_rate > 0.0) {
            return Err(CoreError::InvalidConfig {
                reason: "update_rate must be positive".into(),
            });
        }
        if !(self.interp >= 0.0) || !(self.interp_ratio >= 0.0) {
            return Err(CoreError::InvalidConfig {
                reason: "interp and interp_ratio must be non-negative".into(),
            });
        }
        if self.max_layers == 0 || self.max_layers > N_MAX {
            return Err(CoreError::InvalidConfig {
                reason: format!("max_layers must be in 1..={N_MAX}, got {}", self.max_layers),
            });
        }
        if !(self.loop_wrap_threshold > 0.0 && self.loop_wrap_threshold < 1.0) {
            return Err(CoreError::InvalidConfig {
                reason: "loop_wrap_threshold must be inside (0, 1)".into(),
            });
        }
        self.history.validate()?;
        Ok(())
    }
}
