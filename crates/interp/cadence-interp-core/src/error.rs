//! Error types for sample histories and the variable registry

use serde::{Deserialize, Serialize};

use crate::value::ValueKind;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum InterpError {
    /// No variable registered under this name
    #[error("Variable not found: {name}")]
    VariableNotFound { name: String },

    /// Written value does not match the registered kind
    #[error("Value kind mismatch for {name}: expected {expected:?}, got {actual:?}")]
    KindMismatch {
        name: String,
        expected: ValueKind,
        actual: ValueKind,
    },

    /// Settings rejected by validation
    #[error("Invalid interpolation setting: {reason}")]
    InvalidSetting { reason: String },
}

impl InterpError {
    /// Kind mismatches are caller bugs; a missing variable may simply not be registered yet.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::VariableNotFound { .. })
    }

    /// Get error category for logging
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::VariableNotFound { .. } => "registry",
            Self::KindMismatch { .. } => "validation",
            Self::InvalidSetting { .. } => "config",
        }
    }
}

pub type InterpResult<T> = Result<T, InterpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let missing = InterpError::VariableNotFound {
            name: "origin".into(),
        };
        assert_eq!(missing.category(), "registry");
        assert!(missing.is_recoverable());

        let mismatch = InterpError::KindMismatch {
            name: "origin".into(),
            expected: ValueKind::Vec3,
            actual: ValueKind::Float,
        };
        assert_eq!(mismatch.category(), "validation");
        assert!(!mismatch.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let e = InterpError::VariableNotFound {
            name: "cycle".into(),
        };
        assert_eq!(e.to_string(), "Variable not found: cycle");
    }
}
