//! Error types for qntensors.

use thiserror::Error;

/// Errors that can occur in block-sparse tensor operations.
#[derive(Debug, Error)]
pub enum TensorError {
    /// Inconsistent metadata (e.g. label and extent lists of unequal length).
    #[error("shape error: {message}")]
    Shape { message: String },

    /// Incompatible extents between two operands.
    #[error("shape mismatch: expected extent {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Quantum labels fail the selection or group-inverse rule.
    #[error("symmetry mismatch: {message}")]
    SymmetryMismatch { message: String },

    /// Attempt to materialize a block forbidden by the selection rule.
    #[error("block {block:?} is not allowed by the selection rule")]
    BlockNotAllowed { block: Vec<usize> },

    /// Block position out of range for a mode.
    #[error("index out of range: position {index} exceeds {dim_size} blocks")]
    IndexOutOfRange { index: usize, dim_size: usize },

    /// Wrong number of modes provided.
    #[error("wrong number of modes: expected {expected}, got {actual}")]
    WrongNumberOfModes { expected: usize, actual: usize },

    /// Invalid permutation.
    #[error("invalid permutation {perm:?} for tensor with {ndim} modes")]
    InvalidPermutation { perm: Vec<usize>, ndim: usize },

    /// Dense SVD kernel failure.
    #[error("SVD error: {message}")]
    Svd { message: String },

    /// Worker-pool construction failure.
    #[error("thread pool error: {message}")]
    ThreadPool { message: String },
}

impl TensorError {
    pub(crate) fn shape(message: impl Into<String>) -> Self {
        TensorError::Shape {
            message: message.into(),
        }
    }

    pub(crate) fn symmetry(message: impl Into<String>) -> Self {
        TensorError::SymmetryMismatch {
            message: message.into(),
        }
    }
}
