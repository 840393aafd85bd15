//! Construction error taxonomy.
//!
//! Validation reasons carry only static field names and numbers, so a
//! rejected request never touches the heap.

use std::path::PathBuf;
use thiserror::Error;

/// Why a construction request was rejected before any allocation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidReason {
    #[error("{field} must be strictly positive")]
    NonPositive { field: &'static str },

    #[error("{field} = {value} outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{low} must be strictly less than {high}")]
    Unordered {
        low: &'static str,
        high: &'static str,
    },

    #[error("{field} must not exceed {limit}")]
    Incompatible {
        field: &'static str,
        limit: &'static str,
    },

    #[error("{field} = {value} is not a power of two")]
    NotPowerOfTwo { field: &'static str, value: usize },

    #[error("{field} = {value} is not supported")]
    Unsupported { field: &'static str, value: f64 },

    #[error("{field} is not a finite number")]
    NotFinite { field: &'static str },

    #[error("path is empty")]
    EmptyPath,
}

/// Failure of a constructor. No handle escapes and nothing stays allocated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstructionError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(InvalidReason),

    #[error("resource exhausted while acquiring {what} ({bytes} bytes)")]
    ResourceExhausted { what: &'static str, bytes: usize },

    #[error("unrecognized {family} variant {selector:?}")]
    UnrecognizedVariant {
        family: &'static str,
        selector: String,
    },

    #[error("external capability failed for {path:?}: {reason}")]
    ExternalCapability { path: PathBuf, reason: String },
}

impl ConstructionError {
    /// True for deterministic failures the caller controls through its request.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidParameter(_) | Self::UnrecognizedVariant { .. }
        )
    }

    /// True when the system could not provide memory for a step.
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, Self::ResourceExhausted { .. })
    }

    /// The validation reason, if this is an `InvalidParameter` failure.
    pub fn reason(&self) -> Option<&InvalidReason> {
        match self {
            Self::InvalidParameter(reason) => Some(reason),
            _ => None,
        }
    }
}

impl From<InvalidReason> for ConstructionError {
    fn from(reason: InvalidReason) -> Self {
        Self::InvalidParameter(reason)
    }
}
