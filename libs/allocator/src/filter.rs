//! Candidate filtering for a judge's next batch.
//!
//! Order of preference:
//! 1. teams the judge has not seen and nobody else holds,
//! 2. unseen teams currently held in another judge's unsubmitted batch,
//! 3. a random sample of already-seen teams (rescoring), free ones first.
//!
//! Tiers 2 and 3 are only drawn on to reach the batch size. Exclusivity
//! on held teams is advisory: an unseen held team always beats a rescore.

use std::collections::{BTreeSet, HashSet};

use rand::seq::SliceRandom;
use rand::Rng;

use crate::ledger::CoverageLedger;
use crate::types::{TeamId, TeamRange};

/// A team eligible for selection, annotated with its current coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub team: TeamId,
    pub coverage: usize,
    /// The judge already evaluated this team (rescoring fallback).
    pub rescore: bool,
}

/// Inputs for one filtering pass.
#[derive(Debug, Clone, Copy)]
pub struct CandidateRequest<'a> {
    pub universe: &'a TeamRange,
    /// Teams the requesting judge has evaluated.
    pub seen: &'a BTreeSet<TeamId>,
    /// Teams held in other judges' active batches.
    pub locked: &'a HashSet<TeamId>,
    pub batch_size: usize,
}

/// Compute the candidate set for one judge.
pub fn filter_candidates<R>(
    request: CandidateRequest<'_>,
    ledger: &CoverageLedger,
    rng: &mut R,
) -> Vec<Candidate>
where
    R: Rng + ?Sized,
{
    let k = request.batch_size;
    if k == 0 {
        return Vec::new();
    }

    let (unseen, seen): (Vec<TeamId>, Vec<TeamId>) = request
        .universe
        .teams()
        .partition(|team| !request.seen.contains(team));

    let mut picked: Vec<(TeamId, bool)> = Vec::with_capacity(unseen.len().max(k));

    if unseen.len() >= k {
        let (free, mut held): (Vec<TeamId>, Vec<TeamId>) = unseen
            .into_iter()
            .partition(|team| !request.locked.contains(team));
        let shortfall = k.saturating_sub(free.len());
        picked.extend(free.into_iter().map(|team| (team, false)));
        if shortfall > 0 {
            held.shuffle(rng);
            picked.extend(held.into_iter().take(shortfall).map(|team| (team, false)));
        }
    } else {
        let mut shortfall = k - unseen.len();
        picked.extend(unseen.into_iter().map(|team| (team, false)));

        let (mut free, mut held): (Vec<TeamId>, Vec<TeamId>) = seen
            .into_iter()
            .partition(|team| !request.locked.contains(team));
        free.shuffle(rng);
        held.shuffle(rng);

        for team in free.into_iter().chain(held) {
            if shortfall == 0 {
                break;
            }
            picked.push((team, true));
            shortfall -= 1;
        }
    }

    picked
        .into_iter()
        .map(|(team, rescore)| Candidate {
            team,
            coverage: ledger.coverage_count(team),
            rescore,
        })
        .collect()
}
