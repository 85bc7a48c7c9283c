//! # jury-allocator
//!
//! Fair-coverage batch allocation of teams to judges.
//!
//! Judges ask for small batches of teams to evaluate. The allocator keeps
//! every team's evaluation count level, avoids showing a judge the same team
//! twice unless nothing else is left, and keeps concurrently active judges
//! off each other's unsubmitted teams where it can.
//!
//! ## Components
//!
//! - [`CoverageLedger`]: who has evaluated what (fold over evaluations).
//! - [`filter_candidates`]: teams eligible for a judge's next batch.
//! - [`select_batch`]: least-covered first, random ties, numeric locality.
//! - [`AssignmentTable`]: each judge's active batch and its lifecycle.
//! - [`Allocator`]: the shared service tying them together.
//!
//! Durable storage is delegated to a [`ScoreStore`] and a [`JudgeRegistry`].

mod assignment;
mod config;
mod error;
mod filter;
mod ledger;
mod memory;
mod random;
mod selector;
mod service;
mod store;
mod types;

pub use assignment::{ActiveBatch, AssignmentTable, JudgeState};
pub use config::{
    AllocatorConfig, DEFAULT_BATCH_SIZE, DEFAULT_LOCALITY_WINDOW, DEFAULT_MAX_TEAMS,
};
pub use error::AllocatorError;
pub use filter::{filter_candidates, Candidate, CandidateRequest};
pub use ledger::{CoverageLedger, TeamStanding};
pub use memory::InMemoryStore;
pub use random::{random_source, RandomSource};
pub use selector::{select_batch, SelectionPolicy};
pub use service::{Allocator, SubmitReceipt, TeamCoverage};
pub use store::{JudgeRegistry, ScoreRecord, ScoreStore, StoreError};
pub use types::{Evaluation, JudgeName, ScoreRange, TeamId, TeamRange, DEFAULT_TEAM_RANGE};
