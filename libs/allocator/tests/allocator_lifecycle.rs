//! Allocator lifecycle tests against in-memory and failing collaborators.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jury_allocator::{
    random_source, Allocator, AllocatorConfig, AllocatorError, Evaluation, InMemoryStore,
    JudgeName, JudgeRegistry, JudgeState, ScoreRange, ScoreRecord, ScoreStore, StoreError,
    SubmitReceipt, TeamId, TeamRange,
};
use tokio::sync::{Mutex, Notify, Semaphore};

fn config(start: u32, end: u32) -> AllocatorConfig {
    AllocatorConfig {
        team_range: TeamRange::new(start, end).unwrap(),
        batch_size: 5,
        window: 7,
        score_range: ScoreRange::default(),
        max_teams: 1_000,
    }
}

async fn allocator_with<S>(start: u32, end: u32, store: Arc<S>, seed: u64) -> Allocator
where
    S: ScoreStore + JudgeRegistry + 'static,
{
    Allocator::bootstrap(
        config(start, end),
        store.clone(),
        store,
        random_source(Some(seed)),
    )
    .await
    .unwrap()
}

async fn allocator(start: u32, end: u32) -> (Allocator, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    (allocator_with(start, end, store.clone(), 17).await, store)
}

fn numbers(teams: &[TeamId]) -> BTreeSet<u32> {
    teams.iter().map(TeamId::number).collect()
}

async fn fill_and_submit(allocator: &Allocator, judge: &str) -> Vec<TeamId> {
    let batch = allocator.select_judge(judge).await.unwrap();
    for index in 0..batch.len() {
        assert!(allocator
            .record_score_input(judge, index, Some(2.0))
            .await
            .unwrap());
    }
    allocator.submit(judge).await.unwrap();
    batch.teams().to_vec()
}

/// Score store that fails writes for chosen teams until healed.
#[derive(Default)]
struct FlakyStore {
    inner: InMemoryStore,
    failing: Mutex<HashSet<TeamId>>,
}

impl FlakyStore {
    async fn fail_team(&self, team: TeamId) {
        self.failing.lock().await.insert(team);
    }

    async fn heal(&self) {
        self.failing.lock().await.clear();
    }
}

#[async_trait]
impl ScoreStore for FlakyStore {
    async fn list_scores(&self) -> Result<Vec<ScoreRecord>, StoreError> {
        self.inner.list_scores().await
    }

    async fn record_score(&self, evaluation: &Evaluation) -> Result<(), StoreError> {
        if self.failing.lock().await.contains(&evaluation.team) {
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        self.inner.record_score(evaluation).await
    }

    async fn clear_scores(&self) -> Result<(), StoreError> {
        self.inner.clear_scores().await
    }
}

#[async_trait]
impl JudgeRegistry for FlakyStore {
    async fn list_judges(&self) -> Result<Vec<String>, StoreError> {
        self.inner.list_judges().await
    }

    async fn register_judge(&self, name: &str) -> Result<(), StoreError> {
        self.inner.register_judge(name).await
    }
}

/// Score store whose writes wait for a release permit.
struct GatedStore {
    inner: InMemoryStore,
    entered: Notify,
    release: Semaphore,
}

impl GatedStore {
    fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            entered: Notify::new(),
            release: Semaphore::new(0),
        }
    }
}

#[async_trait]
impl ScoreStore for GatedStore {
    async fn list_scores(&self) -> Result<Vec<ScoreRecord>, StoreError> {
        self.inner.list_scores().await
    }

    async fn record_score(&self, evaluation: &Evaluation) -> Result<(), StoreError> {
        self.entered.notify_one();
        let _permit = self
            .release
            .acquire()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        self.inner.record_score(evaluation).await
    }

    async fn clear_scores(&self) -> Result<(), StoreError> {
        self.inner.clear_scores().await
    }
}

#[async_trait]
impl JudgeRegistry for GatedStore {
    async fn list_judges(&self) -> Result<Vec<String>, StoreError> {
        self.inner.list_judges().await
    }

    async fn register_judge(&self, name: &str) -> Result<(), StoreError> {
        self.inner.register_judge(name).await
    }
}

#[tokio::test]
async fn test_reselection_returns_same_batch() {
    let (allocator, _) = allocator(1, 40).await;
    allocator.register_judge("Ada").await.unwrap();

    let first = allocator.select_judge("Ada").await.unwrap();
    let second = allocator.select_judge("ada").await.unwrap();

    assert_eq!(first.len(), 5);
    assert_eq!(first.teams(), second.teams());
    assert_eq!(allocator.judge_state("ADA").await.unwrap(), JudgeState::Assigned);
}

#[tokio::test]
async fn test_unknown_judge_cannot_select() {
    let (allocator, _) = allocator(1, 10).await;
    let err = allocator.select_judge("ghost").await.unwrap_err();
    assert!(matches!(err, AllocatorError::UnknownJudge(_)));
}

#[tokio::test]
async fn test_duplicate_registration_is_a_collision() {
    let (allocator, _) = allocator(1, 10).await;
    allocator.register_judge("Grace").await.unwrap();

    let err = allocator.register_judge("  grace ").await.unwrap_err();
    assert!(matches!(err, AllocatorError::JudgeExists(_)));

    let judges = allocator.list_judges().await;
    assert_eq!(judges.len(), 1);
    assert_eq!(judges[0].as_str(), "Grace");
    assert!(allocator.select_judge("grace").await.is_ok());
}

#[tokio::test]
async fn test_empty_judge_name_rejected() {
    let (allocator, _) = allocator(1, 10).await;
    let err = allocator.register_judge("   ").await.unwrap_err();
    assert!(matches!(err, AllocatorError::Validation(_)));
}

#[tokio::test]
async fn test_rescoring_fallback_scenario() {
    let (allocator, _) = allocator(1, 10).await;
    allocator.register_judge("J").await.unwrap();
    for team in 1..=6 {
        allocator
            .record_score("J", TeamId::new(team), 1.0)
            .await
            .unwrap();
    }

    let batch = allocator.select_judge("J").await.unwrap();
    let picked = numbers(batch.teams());

    assert_eq!(picked.len(), 5);
    assert!(picked.is_superset(&(7..=10).collect()));
    assert_eq!(picked.iter().filter(|n| **n <= 6).count(), 1);
}

#[tokio::test]
async fn test_small_universe_yields_short_batch() {
    let (allocator, _) = allocator(1, 4).await;
    allocator.register_judge("Ada").await.unwrap();

    let batch = allocator.select_judge("Ada").await.unwrap();
    assert_eq!(numbers(batch.teams()), (1..=4).collect());
}

#[tokio::test]
async fn test_no_repeat_until_unseen_runs_out() {
    let (allocator, _) = allocator(1, 12).await;
    allocator.register_judge("Ada").await.unwrap();

    let mut seen = BTreeSet::new();
    for _ in 0..4 {
        let unseen_before = 12 - seen.len();
        let teams = fill_and_submit(&allocator, "Ada").await;
        assert_eq!(teams.len(), 5);

        let repeats = teams.iter().filter(|t| seen.contains(&t.number())).count();
        if unseen_before >= 5 {
            assert_eq!(repeats, 0);
        } else {
            assert_eq!(repeats, 5 - unseen_before);
        }
        seen.extend(teams.iter().map(TeamId::number));
    }

    let seen_set = allocator.seen_set("ada").await.unwrap();
    assert_eq!(seen_set.len(), 12);
}

#[tokio::test]
async fn test_out_of_range_input_ignored_and_incomplete_submit_rejected() {
    let (allocator, store) = allocator(1, 20).await;
    allocator.register_judge("Ada").await.unwrap();
    allocator.select_judge("Ada").await.unwrap();

    assert!(!allocator
        .record_score_input("Ada", 0, Some(3.5))
        .await
        .unwrap());
    assert!(!allocator
        .record_score_input("Ada", 0, Some(f64::NAN))
        .await
        .unwrap());
    assert!(allocator
        .record_score_input("Ada", 0, Some(1.5))
        .await
        .unwrap());
    assert!(matches!(
        allocator.record_score_input("Ada", 9, Some(1.0)).await,
        Err(AllocatorError::Validation(_))
    ));

    let err = allocator.submit("Ada").await.unwrap_err();
    assert_eq!(
        err,
        AllocatorError::IncompleteBatch {
            judge: "Ada".to_string(),
            missing: 4
        }
    );
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_successful_submit_updates_ledger_and_clears_batch() {
    let (allocator, store) = allocator(1, 20).await;
    allocator.register_judge("Ada").await.unwrap();

    let teams = fill_and_submit(&allocator, "Ada").await;

    assert_eq!(allocator.judge_state("Ada").await.unwrap(), JudgeState::Idle);
    assert_eq!(store.len().await, 5);
    let coverage = allocator.coverage().await;
    for entry in coverage {
        let expected = usize::from(teams.contains(&entry.team));
        assert_eq!(entry.coverage, expected);
    }
}

#[tokio::test]
async fn test_failed_post_commits_the_rest() {
    let store = Arc::new(FlakyStore::default());
    let allocator = allocator_with(1, 20, store.clone(), 5).await;
    allocator.register_judge("Ada").await.unwrap();

    let batch = allocator.select_judge("Ada").await.unwrap();
    let failing = batch.teams()[2];
    store.fail_team(failing).await;
    for index in 0..5 {
        allocator
            .record_score_input("Ada", index, Some(index as f64 * 0.5))
            .await
            .unwrap();
    }

    let err = allocator.submit("Ada").await.unwrap_err();
    assert!(matches!(
        err,
        AllocatorError::Transport {
            committed: 4,
            pending: 1,
            ..
        }
    ));
    assert!(err.is_retryable());

    let remaining = allocator.active_batch("Ada").await.unwrap().unwrap();
    assert_eq!(remaining.teams(), &[failing]);
    assert_eq!(remaining.scores(), &[Some(1.0)]);
    assert_eq!(remaining.state(), JudgeState::Assigned);
    assert_eq!(store.inner.len().await, 4);

    let seen = allocator.seen_set("Ada").await.unwrap();
    assert_eq!(seen.len(), 4);
    assert!(!seen.contains(&failing));

    store.heal().await;
    let receipt = allocator.submit("Ada").await.unwrap();
    assert_eq!(receipt.committed.len(), 1);
    assert!(receipt.ledger_updated);
    assert_eq!(allocator.judge_state("Ada").await.unwrap(), JudgeState::Idle);
    assert_eq!(allocator.seen_set("Ada").await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_concurrent_judges_get_disjoint_batches() {
    let (allocator, _) = allocator(1, 40).await;
    let allocator = Arc::new(allocator);
    let names: Vec<String> = (0..8).map(|i| format!("judge-{i}")).collect();
    for name in &names {
        allocator.register_judge(name).await.unwrap();
    }

    let handles: Vec<_> = names
        .iter()
        .cloned()
        .map(|name| {
            let allocator = allocator.clone();
            tokio::spawn(async move { allocator.select_judge(&name).await })
        })
        .collect();

    let mut all = HashSet::new();
    for handle in handles {
        let batch = handle.await.unwrap().unwrap();
        assert_eq!(batch.len(), 5);
        for team in batch.teams() {
            assert!(all.insert(*team), "team {team} handed to two judges");
        }
    }
    assert_eq!(all.len(), 40);
}

#[tokio::test]
async fn test_abandon_releases_teams() {
    let (allocator, _) = allocator(1, 10).await;
    for name in ["a", "b", "c"] {
        allocator.register_judge(name).await.unwrap();
    }

    let a = numbers(allocator.select_judge("a").await.unwrap().teams());
    let b = numbers(allocator.select_judge("b").await.unwrap().teams());
    assert!(a.is_disjoint(&b));

    assert!(allocator.abandon("a").await.unwrap());
    assert!(!allocator.abandon("a").await.unwrap());
    assert_eq!(allocator.judge_state("a").await.unwrap(), JudgeState::Idle);

    let c = numbers(allocator.select_judge("c").await.unwrap().teams());
    assert_eq!(c, a);
    assert!(allocator.seen_set("a").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reconfigure_range_clears_state() {
    let (allocator, _) = allocator(1, 20).await;
    allocator.register_judge("Ada").await.unwrap();
    allocator.register_judge("Bob").await.unwrap();
    fill_and_submit(&allocator, "Ada").await;
    allocator.select_judge("Bob").await.unwrap();

    let range = allocator.reconfigure_range(30, 45).await.unwrap();
    assert_eq!(range, TeamRange::new(30, 45).unwrap());

    assert!(allocator.coverage().await.iter().all(|c| c.coverage == 0));
    assert!(allocator.seen_set("Ada").await.unwrap().is_empty());
    assert!(allocator.active_batch("Bob").await.unwrap().is_none());
    assert_eq!(allocator.coverage().await.len(), 16);

    let batch = allocator.select_judge("Bob").await.unwrap();
    assert!(batch.teams().iter().all(|t| (30..=45).contains(&t.number())));

    assert!(matches!(
        allocator.reconfigure_range(9, 3).await,
        Err(AllocatorError::Validation(_))
    ));
    assert_eq!(allocator.team_range().await, range);
}

#[tokio::test]
async fn test_submission_does_not_block_other_judges() {
    let store = Arc::new(GatedStore::new());
    let allocator = Arc::new(allocator_with(1, 30, store.clone(), 3).await);
    allocator.register_judge("slow").await.unwrap();
    allocator.register_judge("fast").await.unwrap();

    let batch = allocator.select_judge("slow").await.unwrap();
    for index in 0..batch.len() {
        allocator
            .record_score_input("slow", index, Some(1.0))
            .await
            .unwrap();
    }

    let submitting = {
        let allocator = allocator.clone();
        tokio::spawn(async move { allocator.submit("slow").await })
    };
    store.entered.notified().await;

    let other = tokio::time::timeout(Duration::from_secs(1), allocator.select_judge("fast"))
        .await
        .expect("selection blocked behind a submission")
        .unwrap();
    assert_eq!(other.len(), 5);
    assert_eq!(
        allocator.judge_state("slow").await.unwrap(),
        JudgeState::Submitting
    );
    assert!(matches!(
        allocator.abandon("slow").await,
        Err(AllocatorError::BatchBusy(_))
    ));

    store.release.add_permits(batch.len());
    let receipt = tokio::time::timeout(Duration::from_secs(1), submitting)
        .await
        .expect("submission never finished")
        .unwrap()
        .unwrap();
    assert_eq!(receipt.committed.len(), 5);
}

/// Start a gated submission for `judge` and wait until its writes are
/// parked in the store.
async fn start_gated_submit(
    allocator: &Arc<Allocator>,
    store: &GatedStore,
    judge: &str,
) -> (usize, tokio::task::JoinHandle<Result<SubmitReceipt, AllocatorError>>) {
    let batch = allocator.select_judge(judge).await.unwrap();
    for index in 0..batch.len() {
        allocator
            .record_score_input(judge, index, Some(2.0))
            .await
            .unwrap();
    }
    let handle = {
        let allocator = allocator.clone();
        let judge = judge.to_string();
        tokio::spawn(async move { allocator.submit(&judge).await })
    };
    store.entered.notified().await;
    (batch.len(), handle)
}

#[tokio::test]
async fn test_range_reset_during_submit_skips_ledger_and_keeps_new_batch() {
    let store = Arc::new(GatedStore::new());
    let allocator = Arc::new(allocator_with(1, 30, store.clone(), 5).await);
    allocator.register_judge("Ada").await.unwrap();

    let (pending, submitting) = start_gated_submit(&allocator, &store, "Ada").await;

    allocator.reconfigure_range(1, 20).await.unwrap();
    let fresh = allocator.select_judge("Ada").await.unwrap();
    assert_eq!(fresh.state(), JudgeState::Assigned);

    store.release.add_permits(pending);
    let receipt = tokio::time::timeout(Duration::from_secs(1), submitting)
        .await
        .expect("submission never finished")
        .unwrap()
        .unwrap();

    assert!(!receipt.ledger_updated);
    assert_eq!(receipt.committed.len(), pending);
    assert_eq!(store.inner.len().await, pending);
    assert_eq!(allocator.coverage_spread().await, 0);
    assert!(allocator.coverage().await.iter().all(|c| c.coverage == 0));
    assert!(allocator.seen_set("Ada").await.unwrap().is_empty());

    let kept = allocator.active_batch("Ada").await.unwrap().unwrap();
    assert_eq!(kept.teams(), fresh.teams());
    assert_eq!(kept.state(), JudgeState::Assigned);
    assert_eq!(kept.missing(), kept.len());
}

#[tokio::test]
async fn test_clear_during_submit_skips_ledger_update() {
    let store = Arc::new(GatedStore::new());
    let allocator = Arc::new(allocator_with(1, 30, store.clone(), 9).await);
    allocator.register_judge("Ada").await.unwrap();

    let (pending, submitting) = start_gated_submit(&allocator, &store, "Ada").await;

    allocator.clear_scores().await.unwrap();
    assert!(allocator.active_batch("Ada").await.unwrap().is_none());

    store.release.add_permits(pending);
    let receipt = tokio::time::timeout(Duration::from_secs(1), submitting)
        .await
        .expect("submission never finished")
        .unwrap()
        .unwrap();

    assert!(!receipt.ledger_updated);
    assert_eq!(allocator.coverage_spread().await, 0);
    assert!(allocator.seen_set("Ada").await.unwrap().is_empty());
    assert!(allocator.active_batch("Ada").await.unwrap().is_none());
    assert_eq!(
        allocator.judge_state("Ada").await.unwrap(),
        JudgeState::Idle
    );
}

#[tokio::test]
async fn test_oversized_range_rejected() {
    let (allocator, store) = allocator(1, 20).await;

    for end in [u32::MAX, 1_001] {
        assert!(matches!(
            allocator.reconfigure_range(1, end).await,
            Err(AllocatorError::Validation(_))
        ));
    }
    assert_eq!(allocator.team_range().await, TeamRange::new(1, 20).unwrap());
    assert_eq!(store.load_team_range().await.unwrap(), None);

    let range = allocator.reconfigure_range(1, 1_000).await.unwrap();
    assert_eq!(range.len(), 1_000);
}

#[tokio::test]
async fn test_reconfigured_range_survives_restart() {
    let (allocator, store) = allocator(1, 20).await;
    allocator.reconfigure_range(30, 45).await.unwrap();
    drop(allocator);

    let restarted = allocator_with(1, 20, store.clone(), 2).await;
    assert_eq!(restarted.team_range().await, TeamRange::new(30, 45).unwrap());
    assert_eq!(restarted.coverage().await.len(), 16);

    // A saved range over the limit leaves the configured one in effect.
    store
        .save_team_range(TeamRange::new(1, 5_000).unwrap())
        .await
        .unwrap();
    let restarted = allocator_with(1, 20, store, 2).await;
    assert_eq!(restarted.team_range().await, TeamRange::new(1, 20).unwrap());
}

#[tokio::test]
async fn test_direct_score_outside_range_rejected() {
    let (allocator, store) = allocator(1, 10).await;
    allocator.register_judge("Ada").await.unwrap();

    let err = allocator
        .record_score("Ada", TeamId::new(25), 2.0)
        .await
        .unwrap_err();
    assert!(matches!(err, AllocatorError::Validation(_)));
    assert!(store.is_empty().await);
    assert!(allocator.seen_set("Ada").await.unwrap().is_empty());

    allocator
        .record_score("Ada", TeamId::new(10), 2.0)
        .await
        .unwrap();
    assert_eq!(allocator.seen_set("Ada").await.unwrap(), vec![TeamId::new(10)]);
}

#[tokio::test]
async fn test_coverage_converges_as_judges_work() {
    let (allocator, _) = allocator(1, 30).await;
    let judges: Vec<String> = (0..6).map(|i| format!("judge-{i}")).collect();
    for judge in &judges {
        allocator.register_judge(judge).await.unwrap();
    }

    for _round in 0..6 {
        for judge in &judges {
            fill_and_submit(&allocator, judge).await;
        }
        assert!(allocator.coverage_spread().await <= 4);
    }

    // Every judge has now seen every team exactly once.
    assert_eq!(allocator.coverage_spread().await, 0);
    assert!(allocator.coverage().await.iter().all(|c| c.coverage == 6));
}

#[tokio::test]
async fn test_bootstrap_rebuilds_from_history() {
    let store = Arc::new(InMemoryStore::new());
    store.register_judge("Ada").await.unwrap();
    for team in [51, 52, 53] {
        store
            .record_score(&Evaluation::new(
                JudgeName::parse("Ada").unwrap(),
                TeamId::new(team),
                2.0,
            ))
            .await
            .unwrap();
    }
    store
        .record_score(&Evaluation::new(
            JudgeName::parse("Bob").unwrap(),
            TeamId::new(51),
            1.0,
        ))
        .await
        .unwrap();

    let allocator = allocator_with(51, 99, store, 1).await;

    let judges: Vec<String> = allocator
        .list_judges()
        .await
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(judges, vec!["Ada", "Bob"]);

    let standings = allocator.standings().await;
    assert_eq!(standings[0].coverage, 2);
    assert_eq!(standings[0].average, Some(1.5));
    assert_eq!(
        allocator.seen_set("ada").await.unwrap(),
        vec![TeamId::new(51), TeamId::new(52), TeamId::new(53)]
    );
}

#[tokio::test]
async fn test_clear_scores_resets_history_but_keeps_judges() {
    let (allocator, store) = allocator(1, 20).await;
    allocator.register_judge("Ada").await.unwrap();
    fill_and_submit(&allocator, "Ada").await;

    allocator.clear_scores().await.unwrap();

    assert!(store.is_empty().await);
    assert_eq!(allocator.coverage_spread().await, 0);
    assert_eq!(allocator.list_judges().await.len(), 1);
    assert!(allocator.list_scores().await.unwrap().is_empty());
}
