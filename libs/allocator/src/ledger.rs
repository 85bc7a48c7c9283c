//! Coverage ledger: who has evaluated what.
//!
//! The ledger is a fold over completed evaluations. Coverage counts are read
//! straight off the per-team judge index, so they cannot drift from the
//! evaluations themselves, and rebuilding from any ordering of the same
//! history yields the same ledger.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::types::{Evaluation, JudgeName, TeamId, TeamRange};

static NO_TEAMS: BTreeSet<TeamId> = BTreeSet::new();

/// Per-team summary for the results view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamStanding {
    pub team: TeamId,
    /// Distinct judges with a recorded score.
    pub coverage: usize,
    /// Mean of recorded scores; `None` before the first evaluation.
    pub average: Option<f64>,
    /// Judge display name -> score.
    pub scores: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default)]
pub struct CoverageLedger {
    by_team: HashMap<TeamId, BTreeMap<JudgeName, f64>>,
    seen: HashMap<JudgeName, BTreeSet<TeamId>>,
    evaluations: usize,
}

impl CoverageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a full evaluation history.
    pub fn rebuild<'a, I>(evaluations: I) -> Self
    where
        I: IntoIterator<Item = &'a Evaluation>,
    {
        let mut ledger = Self::new();
        for evaluation in evaluations {
            ledger.record_evaluation(evaluation);
        }
        ledger
    }

    /// Upsert an evaluation. Returns true if the `(judge, team)` pair is new.
    pub fn record_evaluation(&mut self, evaluation: &Evaluation) -> bool {
        let judges = self.by_team.entry(evaluation.team).or_default();
        let is_new = judges
            .insert(evaluation.judge.clone(), evaluation.score)
            .is_none();

        if is_new {
            self.evaluations += 1;
            self.seen
                .entry(evaluation.judge.clone())
                .or_default()
                .insert(evaluation.team);
        }
        is_new
    }

    /// Number of distinct judges who evaluated `team`.
    pub fn coverage_count(&self, team: TeamId) -> usize {
        self.by_team.get(&team).map_or(0, BTreeMap::len)
    }

    /// Teams `judge` has evaluated.
    pub fn seen_set(&self, judge: &JudgeName) -> &BTreeSet<TeamId> {
        self.seen.get(judge).unwrap_or(&NO_TEAMS)
    }

    /// Total distinct `(judge, team)` pairs.
    pub fn len(&self) -> usize {
        self.evaluations
    }

    pub fn is_empty(&self) -> bool {
        self.evaluations == 0
    }

    pub fn clear(&mut self) {
        self.by_team.clear();
        self.seen.clear();
        self.evaluations = 0;
    }

    /// Coverage count for every team in `range`.
    pub fn coverage(&self, range: &TeamRange) -> Vec<(TeamId, usize)> {
        range
            .teams()
            .map(|team| (team, self.coverage_count(team)))
            .collect()
    }

    /// `max - min` coverage across `range`.
    pub fn coverage_spread(&self, range: &TeamRange) -> usize {
        let counts = range.teams().map(|team| self.coverage_count(team));
        let (min, max) = counts.fold((usize::MAX, 0), |(lo, hi), c| (lo.min(c), hi.max(c)));
        max.saturating_sub(min)
    }

    /// Results table rows for every team in `range`.
    pub fn standings(&self, range: &TeamRange) -> Vec<TeamStanding> {
        range
            .teams()
            .map(|team| {
                let scores: BTreeMap<String, f64> = self
                    .by_team
                    .get(&team)
                    .map(|judges| {
                        judges
                            .iter()
                            .map(|(judge, score)| (judge.to_string(), *score))
                            .collect()
                    })
                    .unwrap_or_default();
                let average = if scores.is_empty() {
                    None
                } else {
                    Some(scores.values().sum::<f64>() / scores.len() as f64)
                };
                TeamStanding {
                    team,
                    coverage: scores.len(),
                    average,
                    scores,
                }
            })
            .collect()
    }
}
