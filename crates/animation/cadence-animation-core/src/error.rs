//! Error types for the animation core

use cadence_interp_core::InterpError;
use serde::{Deserialize, Serialize};

use crate::ids::{ObjectId, SkeletonId};

/// Failures at the API boundary. Per-frame work never returns these; it degrades
/// and reports through [`FrameDiagnostics`](crate::outputs::FrameDiagnostics) instead.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum CoreError {
    #[error("Object not found: {id:?}")]
    ObjectNotFound { id: ObjectId },

    #[error("Skeleton not found: {id:?}")]
    SkeletonNotFound { id: SkeletonId },

    #[error("Object {id:?} has no skeleton bound")]
    NoSkeleton { id: ObjectId },

    #[error("Layer count {requested} exceeds maximum {max}")]
    TooManyLayers { requested: usize, max: usize },

    #[error("Layer slot {slot} out of range (object has {count} layers)")]
    LayerOutOfRange { slot: usize, count: usize },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Invalid skeleton: {reason}")]
    InvalidSkeleton { reason: String },

    #[error(transparent)]
    Interp(#[from] InterpError),
}

impl CoreError {
    /// Check if this is a recoverable error
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::ObjectNotFound { .. } | Self::LayerOutOfRange { .. } => true,
            Self::Interp(e) => e.is_recoverable(),
            _ => false,
        }
    }

    /// Get error category for logging
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::ObjectNotFound { .. } | Self::SkeletonNotFound { .. } => "lookup",
            Self::NoSkeleton { .. } => "binding",
            Self::TooManyLayers { .. } | Self::LayerOutOfRange { .. } => "layers",
            Self::InvalidConfig { .. } => "config",
            Self::InvalidSkeleton { .. } => "data",
            Self::Interp(e) => e.category(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidSkeleton {
            reason: err.to_string(),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let e = CoreError::ObjectNotFound { id: ObjectId(3) };
        assert_eq!(e.category(), "lookup");
        assert!(e.is_recoverable());

        let e = CoreError::TooManyLayers {
            requested: 20,
            max: 15,
        };
        assert_eq!(e.category(), "layers");
        assert!(!e.is_recoverable());
    }

    #[test]
    fn test_interp_errors_wrap() {
        let e: CoreError = InterpError::VariableNotFound {
            name: "origin".into(),
        }
        .into();
        assert_eq!(e.category(), "registry");
        assert_eq!(e.to_string(), "Variable not found: origin");
    }
}
