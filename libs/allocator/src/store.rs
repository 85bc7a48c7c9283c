//! Collaborator interfaces for durable scores and the judge roster.
//!
//! The allocator never persists anything itself. Completed evaluations go
//! through a [`ScoreStore`], judge registrations through a
//! [`JudgeRegistry`]. Implementations may be remote, so every call is async
//! and fallible.
//!
//! A score store may also keep the team range so a reconfigured universe
//! survives a restart. Stores that do not override those methods leave the
//! configured range in effect.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Evaluation, TeamRange};

/// Errors reported by a collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The backend refused the write.
    #[error("store rejected request: {0}")]
    Rejected(String),

    /// The judge already exists in the registry.
    #[error("judge already registered: {0}")]
    Duplicate(String),
}

/// A score row as the backend returns it.
///
/// Fields are kept raw; rows that do not parse are skipped when the ledger
/// is rebuilt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub team: String,
    pub judge: String,
    pub score: Option<f64>,
}

impl From<&Evaluation> for ScoreRecord {
    fn from(evaluation: &Evaluation) -> Self {
        Self {
            team: evaluation.team.to_string(),
            judge: evaluation.judge.to_string(),
            score: Some(evaluation.score),
        }
    }
}

/// Durable store of submitted scores.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Full evaluation history.
    async fn list_scores(&self) -> Result<Vec<ScoreRecord>, StoreError>;

    /// Upsert one evaluation; re-scoring a pair overwrites it.
    async fn record_score(&self, evaluation: &Evaluation) -> Result<(), StoreError>;

    /// Delete every stored score.
    async fn clear_scores(&self) -> Result<(), StoreError>;

    /// The team range saved by the last reconfiguration, if any.
    async fn load_team_range(&self) -> Result<Option<TeamRange>, StoreError> {
        Ok(None)
    }

    /// Save the team range, replacing any earlier one.
    async fn save_team_range(&self, _range: TeamRange) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Registry of judge names.
#[async_trait]
pub trait JudgeRegistry: Send + Sync {
    async fn list_judges(&self) -> Result<Vec<String>, StoreError>;

    /// Register a name. Case-insensitive duplicates return
    /// [`StoreError::Duplicate`].
    async fn register_judge(&self, name: &str) -> Result<(), StoreError>;
}
