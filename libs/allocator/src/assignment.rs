//! Assignment table: each judge's active, not yet submitted batch.
//!
//! Per-judge lifecycle:
//!
//! ```text
//! Idle --select--> Assigned --submit--> Submitting --all stored--> Idle
//!                     ^                     |
//!                     +----some failed------+
//! Assigned --abandon--> Idle
//! ```

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::types::{JudgeName, TeamId};

/// Where a judge is in the batch lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgeState {
    Idle,
    Assigned,
    Submitting,
}

/// A judge's current batch and the scores entered so far.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveBatch {
    judge: JudgeName,
    teams: Vec<TeamId>,
    scores: Vec<Option<f64>>,
    state: JudgeState,
    /// Team universe generation the batch was drawn from.
    #[serde(skip)]
    epoch: u64,
}

impl ActiveBatch {
    pub fn new(judge: JudgeName, teams: Vec<TeamId>, epoch: u64) -> Self {
        let scores = vec![None; teams.len()];
        Self {
            judge,
            teams,
            scores,
            state: JudgeState::Assigned,
            epoch,
        }
    }

    /// The "nothing left to assign" result. Never installed in the table.
    pub fn exhausted(judge: JudgeName, epoch: u64) -> Self {
        Self {
            judge,
            teams: Vec::new(),
            scores: Vec::new(),
            state: JudgeState::Idle,
            epoch,
        }
    }

    pub fn judge(&self) -> &JudgeName {
        &self.judge
    }

    pub fn teams(&self) -> &[TeamId] {
        &self.teams
    }

    pub fn scores(&self) -> &[Option<f64>] {
        &self.scores
    }

    pub fn state(&self) -> JudgeState {
        self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    /// Number of slots still without a score.
    pub fn missing(&self) -> usize {
        self.scores.iter().filter(|s| s.is_none()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.missing() == 0
    }

    /// Set or clear the pending score at `index`. Returns false if the index
    /// is out of bounds.
    pub fn set_score(&mut self, index: usize, score: Option<f64>) -> bool {
        match self.scores.get_mut(index) {
            Some(slot) => {
                *slot = score;
                true
            }
            None => false,
        }
    }

    /// `(team, score)` for every filled slot.
    pub fn entries(&self) -> Vec<(TeamId, f64)> {
        self.teams
            .iter()
            .zip(&self.scores)
            .filter_map(|(team, score)| score.map(|s| (*team, s)))
            .collect()
    }

    pub(crate) fn set_state(&mut self, state: JudgeState) {
        self.state = state;
    }

    /// Drop the slots for `committed` teams, keeping the rest pending.
    pub(crate) fn remove_teams(&mut self, committed: &HashSet<TeamId>) {
        let (teams, scores): (Vec<_>, Vec<_>) = self
            .teams
            .iter()
            .zip(&self.scores)
            .filter(|(team, _)| !committed.contains(*team))
            .map(|(team, score)| (*team, *score))
            .unzip();
        self.teams = teams;
        self.scores = scores;
    }
}

/// Judge -> active batch.
#[derive(Debug, Clone, Default)]
pub struct AssignmentTable {
    batches: HashMap<JudgeName, ActiveBatch>,
}

impl AssignmentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, judge: &JudgeName) -> Option<&ActiveBatch> {
        self.batches.get(judge)
    }

    pub fn get_mut(&mut self, judge: &JudgeName) -> Option<&mut ActiveBatch> {
        self.batches.get_mut(judge)
    }

    pub fn state_of(&self, judge: &JudgeName) -> JudgeState {
        self.batches
            .get(judge)
            .map_or(JudgeState::Idle, ActiveBatch::state)
    }

    /// Install a batch for its judge, replacing any previous one.
    pub fn install(&mut self, batch: ActiveBatch) -> &ActiveBatch {
        let judge = batch.judge.clone();
        self.batches.insert(judge.clone(), batch);
        &self.batches[&judge]
    }

    pub fn remove(&mut self, judge: &JudgeName) -> Option<ActiveBatch> {
        self.batches.remove(judge)
    }

    pub fn clear(&mut self) {
        self.batches.clear();
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Teams held by every judge except `judge`.
    pub fn locked_teams_excluding(&self, judge: &JudgeName) -> HashSet<TeamId> {
        self.batches
            .iter()
            .filter(|(holder, _)| *holder != judge)
            .flat_map(|(_, batch)| batch.teams.iter().copied())
            .collect()
    }
}
