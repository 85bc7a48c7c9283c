//! Error types for allocator operations.

use thiserror::Error;

use crate::store::StoreError;

/// Errors returned by allocator operations.
///
/// Running out of teams is not an error: selection returns an empty batch.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AllocatorError {
    /// Malformed input rejected before touching any state.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A judge with the same (case-insensitive) name is already registered.
    #[error("judge already exists: {0}")]
    JudgeExists(String),

    /// The judge has not been registered.
    #[error("unknown judge: {0}")]
    UnknownJudge(String),

    /// The judge holds no active batch.
    #[error("judge {0} has no active batch")]
    NoActiveBatch(String),

    /// Submission attempted before every slot has a score.
    #[error("batch for judge {judge} is missing {missing} score(s)")]
    IncompleteBatch { judge: String, missing: usize },

    /// The batch is mid-submission and cannot change.
    #[error("batch for judge {0} is being submitted")]
    BatchBusy(String),

    /// The score store or judge registry failed.
    #[error("score store error: {0}")]
    Store(#[from] StoreError),

    /// A batch submission was only partly stored.
    ///
    /// `committed` pairs were stored and recorded; `pending` pairs stay in
    /// the active batch for retry.
    #[error("submission for judge {judge} incomplete ({committed} committed, {pending} pending): {message}")]
    Transport {
        judge: String,
        committed: usize,
        pending: usize,
        message: String,
    },
}

impl AllocatorError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Returns true if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Store(_) | Self::Transport { .. } | Self::BatchBusy(_)
        )
    }
}
