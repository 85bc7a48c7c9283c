//! The allocator service shared by every judge session.
//!
//! All mutable state (team universe, coverage ledger, assignment table,
//! judge roster, random source) lives behind one async mutex. Each lifecycle
//! transition runs as a single critical section so concurrent selections
//! never act on stale coverage. Collaborator calls are never awaited while
//! the lock is held: a slow score store delays only the judge submitting.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::assignment::{ActiveBatch, AssignmentTable, JudgeState};
use crate::config::AllocatorConfig;
use crate::error::AllocatorError;
use crate::filter::{filter_candidates, CandidateRequest};
use crate::ledger::{CoverageLedger, TeamStanding};
use crate::random::RandomSource;
use crate::selector::{select_batch, SelectionPolicy};
use crate::store::{JudgeRegistry, ScoreRecord, ScoreStore, StoreError};
use crate::types::{Evaluation, JudgeName, ScoreRange, TeamId, TeamRange};

/// Result of a fully stored batch submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitReceipt {
    pub judge: JudgeName,
    pub committed: Vec<Evaluation>,
    /// False when the team range was reconfigured or the scores cleared
    /// while the scores were in flight; the scores are stored but the reset
    /// ledger does not count them.
    pub ledger_updated: bool,
}

/// Coverage count for one team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TeamCoverage {
    pub team: TeamId,
    pub coverage: usize,
}

struct AllocatorState {
    universe: TeamRange,
    ledger: CoverageLedger,
    table: AssignmentTable,
    roster: BTreeSet<JudgeName>,
    /// Bumped on every destructive reset so in-flight submissions can tell
    /// their batch was discarded.
    epoch: u64,
    rng: Box<dyn RandomSource>,
}

/// Fair-coverage batch allocator.
pub struct Allocator {
    policy: SelectionPolicy,
    score_range: ScoreRange,
    max_teams: usize,
    scores: Arc<dyn ScoreStore>,
    judges: Arc<dyn JudgeRegistry>,
    state: Mutex<AllocatorState>,
}

impl Allocator {
    /// Create an allocator with empty history.
    pub fn new(
        config: AllocatorConfig,
        scores: Arc<dyn ScoreStore>,
        judges: Arc<dyn JudgeRegistry>,
        rng: Box<dyn RandomSource>,
    ) -> Result<Self, AllocatorError> {
        config.validate()?;
        Ok(Self {
            policy: config.policy(),
            score_range: config.score_range,
            max_teams: config.max_teams,
            scores,
            judges,
            state: Mutex::new(AllocatorState {
                universe: config.team_range,
                ledger: CoverageLedger::new(),
                table: AssignmentTable::new(),
                roster: BTreeSet::new(),
                epoch: 0,
                rng,
            }),
        })
    }

    /// Create an allocator, restore the saved team range and rebuild its
    /// ledger and roster from the collaborators.
    pub async fn bootstrap(
        config: AllocatorConfig,
        scores: Arc<dyn ScoreStore>,
        judges: Arc<dyn JudgeRegistry>,
        rng: Box<dyn RandomSource>,
    ) -> Result<Self, AllocatorError> {
        let allocator = Self::new(config, scores, judges, rng)?;
        allocator.restore_team_range().await?;
        allocator.rebuild().await?;
        Ok(allocator)
    }

    /// Adopt the team range saved by an earlier reconfiguration.
    ///
    /// A saved range over the size limit is ignored.
    async fn restore_team_range(&self) -> Result<(), AllocatorError> {
        let Some(range) = self.scores.load_team_range().await? else {
            return Ok(());
        };
        if let Err(e) = range.check_size(self.max_teams) {
            warn!(error = %e, "Ignoring saved team range");
            return Ok(());
        }

        self.state.lock().await.universe = range;
        info!(start = range.start(), end = range.end(), "Restored saved team range");
        Ok(())
    }

    /// Reload the evaluation history and judge roster.
    ///
    /// Active batches are kept.
    #[instrument(skip(self))]
    pub async fn rebuild(&self) -> Result<(), AllocatorError> {
        let records = self.scores.list_scores().await?;
        let names = self.judges.list_judges().await?;

        let evaluations = parse_records(records);
        let mut roster: BTreeSet<JudgeName> = names
            .iter()
            .filter_map(|name| JudgeName::parse(name).ok())
            .collect();
        roster.extend(evaluations.iter().map(|e| e.judge.clone()));

        let ledger = CoverageLedger::rebuild(&evaluations);

        let mut state = self.state.lock().await;
        state.ledger = ledger;
        state.roster.extend(roster);
        info!(
            evaluations = state.ledger.len(),
            judges = state.roster.len(),
            "Rebuilt coverage ledger"
        );
        Ok(())
    }

    pub fn batch_size(&self) -> usize {
        self.policy.batch_size
    }

    pub fn score_range(&self) -> ScoreRange {
        self.score_range
    }

    // =========================================================================
    // Judges
    // =========================================================================

    /// Registered judges, sorted case-insensitively.
    pub async fn list_judges(&self) -> Vec<JudgeName> {
        self.state.lock().await.roster.iter().cloned().collect()
    }

    /// Register a new judge.
    ///
    /// A case-insensitive duplicate fails with [`AllocatorError::JudgeExists`];
    /// the existing judge stays selectable.
    #[instrument(skip(self))]
    pub async fn register_judge(&self, name: &str) -> Result<JudgeName, AllocatorError> {
        let judge = JudgeName::parse(name)?;

        if self.state.lock().await.roster.contains(&judge) {
            return Err(AllocatorError::JudgeExists(judge.to_string()));
        }

        match self.judges.register_judge(judge.as_str()).await {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => {
                self.state.lock().await.roster.insert(judge.clone());
                return Err(AllocatorError::JudgeExists(judge.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        if !self.state.lock().await.roster.insert(judge.clone()) {
            return Err(AllocatorError::JudgeExists(judge.to_string()));
        }

        info!(judge = %judge, "Registered judge");
        Ok(judge)
    }

    // =========================================================================
    // Batch lifecycle
    // =========================================================================

    /// Return the judge's active batch, drawing a new one if they have none.
    ///
    /// An empty batch in state [`JudgeState::Idle`] means there is nothing
    /// left to assign; it is not stored.
    #[instrument(skip(self))]
    pub async fn select_judge(&self, name: &str) -> Result<ActiveBatch, AllocatorError> {
        let judge = JudgeName::parse(name)?;
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        if !state.roster.contains(&judge) {
            return Err(AllocatorError::UnknownJudge(judge.to_string()));
        }

        if let Some(batch) = state.table.get(&judge) {
            debug!(judge = %judge, teams = batch.len(), "Reusing active batch");
            return Ok(batch.clone());
        }

        let locked = state.table.locked_teams_excluding(&judge);
        let candidates = filter_candidates(
            CandidateRequest {
                universe: &state.universe,
                seen: state.ledger.seen_set(&judge),
                locked: &locked,
                batch_size: self.policy.batch_size,
            },
            &state.ledger,
            &mut *state.rng,
        );
        let teams = select_batch(&candidates, self.policy, &mut *state.rng);

        if teams.is_empty() {
            warn!(judge = %judge, "No teams available to assign");
            return Ok(ActiveBatch::exhausted(judge, state.epoch));
        }

        let rescored = candidates
            .iter()
            .filter(|c| c.rescore && teams.contains(&c.team))
            .count();
        info!(
            judge = %judge,
            teams = ?teams.iter().map(TeamId::number).collect::<Vec<_>>(),
            rescored,
            "Assigned batch"
        );

        let batch = ActiveBatch::new(judge, teams, state.epoch);
        Ok(state.table.install(batch).clone())
    }

    /// Set (or clear, with `None`) the pending score at `index`.
    ///
    /// Out-of-range values are ignored and reported as `Ok(false)`.
    #[instrument(skip(self))]
    pub async fn record_score_input(
        &self,
        name: &str,
        index: usize,
        value: Option<f64>,
    ) -> Result<bool, AllocatorError> {
        let judge = JudgeName::parse(name)?;
        let mut state = self.state.lock().await;
        let batch = state
            .table
            .get_mut(&judge)
            .ok_or_else(|| AllocatorError::NoActiveBatch(judge.to_string()))?;

        if batch.state() == JudgeState::Submitting {
            return Err(AllocatorError::BatchBusy(judge.to_string()));
        }
        if index >= batch.len() {
            return Err(AllocatorError::validation(format!(
                "score slot {index} out of bounds for a batch of {}",
                batch.len()
            )));
        }
        if let Some(score) = value {
            if !self.score_range.contains(score) {
                debug!(judge = %judge, index, score, "Ignoring out-of-range score input");
                return Ok(false);
            }
        }

        batch.set_score(index, value);
        Ok(true)
    }

    /// Store every pending score of the judge's batch.
    ///
    /// Partial commit: scores the store accepted are recorded in the ledger
    /// and leave the batch; rejected ones stay pending with their values and
    /// the batch returns to `Assigned`. Any failure is reported as
    /// [`AllocatorError::Transport`].
    #[instrument(skip(self))]
    pub async fn submit(&self, name: &str) -> Result<SubmitReceipt, AllocatorError> {
        let judge = JudgeName::parse(name)?;

        let (entries, epoch) = {
            let mut state = self.state.lock().await;
            let batch = state
                .table
                .get_mut(&judge)
                .ok_or_else(|| AllocatorError::NoActiveBatch(judge.to_string()))?;
            if batch.state() == JudgeState::Submitting {
                return Err(AllocatorError::BatchBusy(judge.to_string()));
            }
            if !batch.is_complete() {
                return Err(AllocatorError::IncompleteBatch {
                    judge: judge.to_string(),
                    missing: batch.missing(),
                });
            }
            batch.set_state(JudgeState::Submitting);
            (batch.entries(), batch.epoch())
        };

        let evaluations: Vec<Evaluation> = entries
            .into_iter()
            .map(|(team, score)| Evaluation::new(judge.clone(), team, score))
            .collect();
        let results = join_all(evaluations.iter().map(|e| self.scores.record_score(e))).await;

        let mut committed = Vec::new();
        let mut failures = Vec::new();
        for (evaluation, result) in evaluations.into_iter().zip(results) {
            match result {
                Ok(()) => committed.push(evaluation),
                Err(e) => {
                    warn!(judge = %judge, team = %evaluation.team, error = %e, "Score submission failed");
                    failures.push(e);
                }
            }
        }

        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let ledger_updated = state.epoch == epoch;
        if ledger_updated {
            for evaluation in &committed {
                state.ledger.record_evaluation(evaluation);
            }
        } else {
            warn!(judge = %judge, "Coverage was reset during submission; skipping ledger update");
        }

        let stored: HashSet<TeamId> = committed.iter().map(|e| e.team).collect();
        let same_batch = state
            .table
            .get(&judge)
            .is_some_and(|b| b.epoch() == epoch && b.state() == JudgeState::Submitting);
        if same_batch {
            let finished = match state.table.get_mut(&judge) {
                Some(batch) => {
                    batch.remove_teams(&stored);
                    batch.set_state(JudgeState::Assigned);
                    batch.is_empty()
                }
                None => false,
            };
            if finished {
                state.table.remove(&judge);
            }
        }

        if let Some(first) = failures.first() {
            return Err(AllocatorError::Transport {
                judge: judge.to_string(),
                committed: committed.len(),
                pending: failures.len(),
                message: first.to_string(),
            });
        }

        info!(judge = %judge, committed = committed.len(), "Batch submitted");
        Ok(SubmitReceipt {
            judge,
            committed,
            ledger_updated,
        })
    }

    /// Drop the judge's batch without recording anything.
    ///
    /// Returns false if the judge held no batch.
    #[instrument(skip(self))]
    pub async fn abandon(&self, name: &str) -> Result<bool, AllocatorError> {
        let judge = JudgeName::parse(name)?;
        let mut state = self.state.lock().await;

        match state.table.state_of(&judge) {
            JudgeState::Idle => Ok(false),
            JudgeState::Submitting => Err(AllocatorError::BatchBusy(judge.to_string())),
            JudgeState::Assigned => {
                state.table.remove(&judge);
                info!(judge = %judge, "Abandoned batch");
                Ok(true)
            }
        }
    }

    pub async fn active_batch(&self, name: &str) -> Result<Option<ActiveBatch>, AllocatorError> {
        let judge = JudgeName::parse(name)?;
        Ok(self.state.lock().await.table.get(&judge).cloned())
    }

    pub async fn judge_state(&self, name: &str) -> Result<JudgeState, AllocatorError> {
        let judge = JudgeName::parse(name)?;
        Ok(self.state.lock().await.table.state_of(&judge))
    }

    // =========================================================================
    // Team universe
    // =========================================================================

    pub async fn team_range(&self) -> TeamRange {
        self.state.lock().await.universe
    }

    /// Replace the team universe, discarding every batch and all coverage.
    ///
    /// The range is saved through the score store first; nothing changes if
    /// that fails.
    #[instrument(skip(self))]
    pub async fn reconfigure_range(&self, start: u32, end: u32) -> Result<TeamRange, AllocatorError> {
        let range = TeamRange::new(start, end)?;
        range.check_size(self.max_teams)?;
        self.scores.save_team_range(range).await?;

        let mut state = self.state.lock().await;

        let discarded = state.table.len();
        state.universe = range;
        state.table.clear();
        state.ledger.clear();
        state.epoch += 1;

        info!(start, end, discarded_batches = discarded, "Team range reconfigured");
        Ok(range)
    }

    // =========================================================================
    // Scores
    // =========================================================================

    /// Record a single evaluation outside of any batch.
    ///
    /// The team must belong to the current universe.
    #[instrument(skip(self))]
    pub async fn record_score(
        &self,
        name: &str,
        team: TeamId,
        score: f64,
    ) -> Result<Evaluation, AllocatorError> {
        let judge = JudgeName::parse(name)?;
        let score = self.score_range.check(score)?;
        let evaluation = Evaluation::new(judge, team, score);

        let epoch = {
            let state = self.state.lock().await;
            if !state.universe.contains(team) {
                return Err(AllocatorError::validation(format!(
                    "{team} is outside the team range {}..={}",
                    state.universe.start(),
                    state.universe.end()
                )));
            }
            state.epoch
        };
        self.scores.record_score(&evaluation).await?;

        let mut state = self.state.lock().await;
        if state.epoch == epoch {
            state.ledger.record_evaluation(&evaluation);
        }
        state.roster.insert(evaluation.judge.clone());
        Ok(evaluation)
    }

    /// Full evaluation history from the score store.
    pub async fn list_scores(&self) -> Result<Vec<ScoreRecord>, AllocatorError> {
        Ok(self.scores.list_scores().await?)
    }

    /// Delete all stored scores and reset coverage and batches.
    ///
    /// Judges and the team range are kept.
    #[instrument(skip(self))]
    pub async fn clear_scores(&self) -> Result<(), AllocatorError> {
        self.scores.clear_scores().await?;

        let mut state = self.state.lock().await;
        state.ledger.clear();
        state.table.clear();
        state.epoch += 1;
        info!("Cleared all scores");
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn coverage(&self) -> Vec<TeamCoverage> {
        let state = self.state.lock().await;
        state
            .ledger
            .coverage(&state.universe)
            .into_iter()
            .map(|(team, coverage)| TeamCoverage { team, coverage })
            .collect()
    }

    pub async fn coverage_spread(&self) -> usize {
        let state = self.state.lock().await;
        state.ledger.coverage_spread(&state.universe)
    }

    pub async fn standings(&self) -> Vec<TeamStanding> {
        let state = self.state.lock().await;
        state.ledger.standings(&state.universe)
    }

    /// Teams the judge has evaluated, ascending.
    pub async fn seen_set(&self, name: &str) -> Result<Vec<TeamId>, AllocatorError> {
        let judge = JudgeName::parse(name)?;
        let state = self.state.lock().await;
        Ok(state.ledger.seen_set(&judge).iter().copied().collect())
    }
}

/// Convert raw store rows, skipping ones that cannot be counted.
fn parse_records(records: Vec<ScoreRecord>) -> Vec<Evaluation> {
    records
        .into_iter()
        .filter_map(|record| {
            let Some(score) = record.score else {
                debug!(judge = %record.judge, team = %record.team, "Skipping unscored record");
                return None;
            };
            let parsed = JudgeName::parse(&record.judge)
                .and_then(|judge| record.team.parse::<TeamId>().map(|team| (judge, team)));
            match parsed {
                Ok((judge, team)) => Some(Evaluation::new(judge, team, score)),
                Err(e) => {
                    warn!(judge = %record.judge, team = %record.team, error = %e, "Skipping malformed score record");
                    None
                }
            }
        })
        .collect()
}
