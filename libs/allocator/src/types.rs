//! Identity and value types shared by every allocator component.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AllocatorError;

// =============================================================================
// Teams
// =============================================================================

/// A team, identified by its number.
///
/// Displayed (and stored by the score backend) as `"Team {number}"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TeamId(u32);

impl TeamId {
    /// Display prefix used by the score backend.
    pub const PREFIX: &'static str = "Team";

    pub const fn new(number: u32) -> Self {
        Self(number)
    }

    pub const fn number(&self) -> u32 {
        self.0
    }

    /// Absolute numeric distance between two teams.
    pub fn distance(&self, other: TeamId) -> u32 {
        self.0.abs_diff(other.0)
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", Self::PREFIX, self.0)
    }
}

impl FromStr for TeamId {
    type Err = AllocatorError;

    /// Accepts `"Team 51"` or a bare `"51"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix(Self::PREFIX)
            .map(str::trim_start)
            .unwrap_or(trimmed);

        digits
            .parse::<u32>()
            .map(TeamId)
            .map_err(|_| AllocatorError::validation(format!("invalid team identifier '{s}'")))
    }
}

impl Serialize for TeamId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TeamId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Default team range for a fresh deployment.
pub const DEFAULT_TEAM_RANGE: TeamRange = TeamRange { start: 51, end: 99 };

/// The inclusive range of team numbers currently being judged.
///
/// Always `1 <= start <= end`; construct through [`TeamRange::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TeamRange {
    start: u32,
    end: u32,
}

impl TeamRange {
    /// Create a validated range. Team numbers start at 1.
    pub fn new(start: u32, end: u32) -> Result<Self, AllocatorError> {
        if start == 0 {
            return Err(AllocatorError::validation(
                "team range must start at 1 or above",
            ));
        }
        if end < start {
            return Err(AllocatorError::validation(format!(
                "team range end ({end}) is before start ({start})"
            )));
        }
        Ok(Self { start, end })
    }

    pub const fn start(&self) -> u32 {
        self.start
    }

    pub const fn end(&self) -> u32 {
        self.end
    }

    /// Reject ranges holding more than `max_teams` teams.
    pub fn check_size(&self, max_teams: usize) -> Result<(), AllocatorError> {
        if self.len() > max_teams {
            return Err(AllocatorError::validation(format!(
                "team range {}..={} holds {} teams; the limit is {max_teams}",
                self.start,
                self.end,
                self.len()
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        (self.end - self.start) as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, team: TeamId) -> bool {
        (self.start..=self.end).contains(&team.number())
    }

    pub fn teams(&self) -> impl Iterator<Item = TeamId> {
        (self.start..=self.end).map(TeamId::new)
    }
}

// =============================================================================
// Judges
// =============================================================================

/// A judge's display name.
///
/// Equality and hashing are case-insensitive so `"Alice"` and `"alice"` are
/// the same judge; the spelling used at construction is kept for display.
#[derive(Debug, Clone)]
pub struct JudgeName {
    display: String,
    key: String,
}

impl JudgeName {
    /// Parse a judge name, trimming surrounding whitespace.
    pub fn parse(raw: &str) -> Result<Self, AllocatorError> {
        let display = raw.trim();
        if display.is_empty() {
            return Err(AllocatorError::validation("judge name cannot be empty"));
        }
        Ok(Self {
            display: display.to_string(),
            key: display.to_lowercase(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.display
    }

    /// Lowercased comparison key.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl PartialEq for JudgeName {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for JudgeName {}

impl Hash for JudgeName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for JudgeName {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for JudgeName {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for JudgeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

impl FromStr for JudgeName {
    type Err = AllocatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for JudgeName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.display)
    }
}

impl<'de> Deserialize<'de> for JudgeName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Scores
// =============================================================================

/// Inclusive bounds for a valid score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreRange {
    pub min: f64,
    pub max: f64,
}

impl Default for ScoreRange {
    fn default() -> Self {
        Self { min: 0.0, max: 3.0 }
    }
}

impl ScoreRange {
    pub fn new(min: f64, max: f64) -> Result<Self, AllocatorError> {
        if !min.is_finite() || !max.is_finite() {
            return Err(AllocatorError::validation("score bounds must be finite"));
        }
        if max < min {
            return Err(AllocatorError::validation(format!(
                "score range max ({max}) is below min ({min})"
            )));
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, score: f64) -> bool {
        score.is_finite() && score >= self.min && score <= self.max
    }

    /// Reject a score outside the range.
    pub fn check(&self, score: f64) -> Result<f64, AllocatorError> {
        if self.contains(score) {
            Ok(score)
        } else {
            Err(AllocatorError::validation(format!(
                "score must be between {} and {}",
                self.min, self.max
            )))
        }
    }
}

/// A completed `(judge, team, score)` evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub judge: JudgeName,
    pub team: TeamId,
    pub score: f64,
}

impl Evaluation {
    pub fn new(judge: JudgeName, team: TeamId, score: f64) -> Self {
        Self { judge, team, score }
    }
}
