//! In-memory score store and judge registry.
//!
//! Used when the service runs without a database, and by tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::store::{JudgeRegistry, ScoreRecord, ScoreStore, StoreError};
use crate::types::{Evaluation, TeamRange};

/// Volatile implementation of both collaborator traits.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    /// (judge key, team) -> record, so re-scoring overwrites.
    scores: RwLock<BTreeMap<(String, u32), ScoreRecord>>,
    /// judge key -> display name.
    judges: RwLock<BTreeMap<String, String>>,
    team_range: RwLock<Option<TeamRange>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored scores.
    pub async fn len(&self) -> usize {
        self.scores.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.scores.read().await.is_empty()
    }
}

#[async_trait]
impl ScoreStore for InMemoryStore {
    async fn list_scores(&self) -> Result<Vec<ScoreRecord>, StoreError> {
        Ok(self.scores.read().await.values().cloned().collect())
    }

    async fn record_score(&self, evaluation: &Evaluation) -> Result<(), StoreError> {
        let key = (evaluation.judge.key().to_string(), evaluation.team.number());
        let replaced = self
            .scores
            .write()
            .await
            .insert(key, ScoreRecord::from(evaluation))
            .is_some();
        debug!(
            judge = %evaluation.judge,
            team = %evaluation.team,
            replaced,
            "Stored score"
        );
        Ok(())
    }

    async fn clear_scores(&self) -> Result<(), StoreError> {
        self.scores.write().await.clear();
        Ok(())
    }

    async fn load_team_range(&self) -> Result<Option<TeamRange>, StoreError> {
        Ok(*self.team_range.read().await)
    }

    async fn save_team_range(&self, range: TeamRange) -> Result<(), StoreError> {
        *self.team_range.write().await = Some(range);
        Ok(())
    }
}

#[async_trait]
impl JudgeRegistry for InMemoryStore {
    async fn list_judges(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.judges.read().await.values().cloned().collect())
    }

    async fn register_judge(&self, name: &str) -> Result<(), StoreError> {
        let mut judges = self.judges.write().await;
        let key = name.trim().to_lowercase();
        if judges.contains_key(&key) {
            return Err(StoreError::Duplicate(name.to_string()));
        }
        judges.insert(key, name.trim().to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JudgeName, TeamId};

    #[tokio::test]
    async fn test_rescoring_overwrites() {
        let store = InMemoryStore::new();
        let judge = JudgeName::parse("Ada").unwrap();

        store
            .record_score(&Evaluation::new(judge.clone(), TeamId::new(4), 1.0))
            .await
            .unwrap();
        store
            .record_score(&Evaluation::new(
                JudgeName::parse("ADA").unwrap(),
                TeamId::new(4),
                2.5,
            ))
            .await
            .unwrap();

        let scores = store.list_scores().await.unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].score, Some(2.5));
        assert_eq!(scores[0].team, "Team 4");
    }

    #[tokio::test]
    async fn test_team_range_kept_across_clears() {
        let store = InMemoryStore::new();
        assert_eq!(store.load_team_range().await.unwrap(), None);

        let range = TeamRange::new(1, 20).unwrap();
        store.save_team_range(range).await.unwrap();
        store.clear_scores().await.unwrap();
        assert_eq!(store.load_team_range().await.unwrap(), Some(range));
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let store = InMemoryStore::new();
        store.register_judge("Grace").await.unwrap();
        let err = store.register_judge("grace").await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        assert_eq!(store.list_judges().await.unwrap(), vec!["Grace"]);
    }
}
