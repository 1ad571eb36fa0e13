//! Tunables shared by every sample history.

use serde::{Deserialize, Serialize};

use crate::error::{InterpError, InterpResult};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpSettings {
    /// Samples retained per variable. Three-point interpolation needs at least 3.
    pub history_capacity: usize,
    /// Global switch for extrapolating past the newest sample.
    pub allow_extrapolation: bool,
    /// Maximum seconds a value is projected past its newest sample.
    pub max_extrapolation: f32,
    /// Seconds of history kept beyond the interpolation window.
    pub extra_history: f32,
}

impl Default for InterpSettings {
    fn default() -> Self {
        Self {
            history_capacity: 32,
            allow_extrapolation: true,
            max_extrapolation: 0.25,
            extra_history: 0.05,
        }
    }
}

impl InterpSettings {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn with_extrapolation(mut self, allow: bool, max_seconds: f32) -> Self {
        self.allow_extrapolation = allow;
        self.max_extrapolation = max_seconds;
        self
    }

    pub fn validate(&self) -> InterpResult<()> {
        if self.history_capacity < 3 {
            return Err(InterpError::InvalidSetting {
                reason: format!(
                    "history_capacity must be at least 3, got {}",
                    self.history_capacity
                ),
            });
        }
        if !(self.max_extrapolation >= 0.0) {
            return Err(InterpError::InvalidSetting {
                reason: "max_extrapolation must be a non-negative number".into(),
            });
        }
        if !(self.extra_history >= 0.0) {
            return Err(InterpError::InvalidSetting {
                reason: "extra_history must be a non-negative number".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(InterpSettings::default().validate().is_ok());
    }

    #[test]
    fn small_capacity_is_rejected() {
        let s = InterpSettings::default().with_capacity(2);
        assert!(matches!(
            s.validate(),
            Err(InterpError::InvalidSetting { .. })
        ));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let s: InterpSettings = serde_json::from_str(r#"{"max_extrapolation":0.1}"#).unwrap();
        assert_eq!(s.history_capacity, 32);
        assert!((s.max_extrapolation - 0.1).abs() < 1e-6);
    }
}
