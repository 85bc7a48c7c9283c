//! Allocator tuning knobs.

use crate::error::AllocatorError;
use crate::selector::SelectionPolicy;
use crate::types::{ScoreRange, TeamRange, DEFAULT_TEAM_RANGE};

/// Default teams per batch.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Default locality window half-width.
pub const DEFAULT_LOCALITY_WINDOW: u32 = 7;

/// Default upper bound on the number of teams in the universe.
pub const DEFAULT_MAX_TEAMS: usize = 10_000;

/// Allocator configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocatorConfig {
    /// Initial team universe; replaced by `reconfigure_range`.
    pub team_range: TeamRange,

    /// Teams per batch (K).
    pub batch_size: usize,

    /// Locality window half-width (W).
    pub window: u32,

    /// Accepted score bounds.
    pub score_range: ScoreRange,

    /// Largest team universe accepted, at startup or on reconfiguration.
    pub max_teams: usize,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            team_range: DEFAULT_TEAM_RANGE,
            batch_size: DEFAULT_BATCH_SIZE,
            window: DEFAULT_LOCALITY_WINDOW,
            score_range: ScoreRange::default(),
            max_teams: DEFAULT_MAX_TEAMS,
        }
    }
}

impl AllocatorConfig {
    /// Check every field, returning the first problem found.
    pub fn validate(&self) -> Result<(), AllocatorError> {
        if self.batch_size == 0 {
            return Err(AllocatorError::validation("batch size must be at least 1"));
        }
        self.check_range(&self.team_range)?;
        ScoreRange::new(self.score_range.min, self.score_range.max)?;
        Ok(())
    }

    /// Check a team universe against the configured size limit.
    pub fn check_range(&self, range: &TeamRange) -> Result<(), AllocatorError> {
        range.check_size(self.max_teams)
    }

    pub fn policy(&self) -> SelectionPolicy {
        SelectionPolicy {
            batch_size: self.batch_size,
            window: self.window,
        }
    }
}
