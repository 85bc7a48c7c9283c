//! Batch selection: least-judged first, numerically close when possible.
//!
//! # Policy
//!
//! 1. Candidates are ranked by coverage, ties broken randomly (shuffle, then
//!    a stable sort on coverage). Random ties keep low-numbered teams from
//!    being favoured systematically.
//! 2. If the least-covered tier alone can fill the batch, the batch comes
//!    from that tier: a locality window inside the tier if one exists,
//!    otherwise the first K of the shuffled tier.
//! 3. Otherwise a locality window is searched among teams within one
//!    coverage step of the minimum, then among all candidates. A window is
//!    every candidate within `W` of an anchor; the first anchor (in rank
//!    order) whose window holds K candidates supplies its K least-covered.
//! 4. Failing that, the K least-covered candidates are taken.
//!
//! The anchor scan tries every candidate and is quadratic in the candidate
//! count.
//!
//! Batches are returned sorted by team number.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::filter::Candidate;
use crate::types::TeamId;

/// Selection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionPolicy {
    /// Teams per batch (K).
    pub batch_size: usize,
    /// Locality window half-width (W).
    pub window: u32,
}

/// Pick up to `policy.batch_size` teams from `candidates`.
///
/// Returns fewer than K teams only when fewer than K candidates exist, and an
/// empty batch when there are none.
pub fn select_batch<R>(
    candidates: &[Candidate],
    policy: SelectionPolicy,
    rng: &mut R,
) -> Vec<TeamId>
where
    R: Rng + ?Sized,
{
    let k = policy.batch_size;
    if candidates.is_empty() || k == 0 {
        return Vec::new();
    }

    let ranked = rank(candidates, rng);
    if ranked.len() <= k {
        return sorted(ranked.iter().map(|c| c.team));
    }

    let min = ranked[0].coverage;
    let lowest = tier(&ranked, min);

    let chosen = if lowest.len() >= k {
        locality_window(lowest, k, policy.window).unwrap_or_else(|| lowest[..k].to_vec())
    } else {
        let near = tier(&ranked, min + 1);
        locality_window(near, k, policy.window)
            .or_else(|| locality_window(&ranked, k, policy.window))
            .unwrap_or_else(|| ranked[..k].to_vec())
    };

    sorted(chosen.into_iter().map(|c| c.team))
}

/// Shuffle, then stable-sort by coverage.
fn rank<R>(candidates: &[Candidate], rng: &mut R) -> Vec<Candidate>
where
    R: Rng + ?Sized,
{
    let mut ranked = candidates.to_vec();
    ranked.shuffle(rng);
    ranked.sort_by_key(|c| c.coverage);
    ranked
}

/// Prefix of `ranked` with coverage at most `max_coverage`.
fn tier(ranked: &[Candidate], max_coverage: usize) -> &[Candidate] {
    let end = ranked.partition_point(|c| c.coverage <= max_coverage);
    &ranked[..end]
}

/// First anchor whose window holds at least `k` candidates.
///
/// `pool` must be in rank order; the window keeps that order so its first
/// `k` members are the least covered.
fn locality_window(pool: &[Candidate], k: usize, window: u32) -> Option<Vec<Candidate>> {
    pool.iter().find_map(|anchor| {
        let members: Vec<Candidate> = pool
            .iter()
            .filter(|c| c.team.distance(anchor.team) <= window)
            .take(k)
            .copied()
            .collect();
        (members.len() >= k).then_some(members)
    })
}

fn sorted(teams: impl Iterator<Item = TeamId>) -> Vec<TeamId> {
    let mut teams: Vec<TeamId> = teams.collect();
    teams.sort_unstable();
    teams
}
