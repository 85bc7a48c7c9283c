//! Injectable randomness for tie-breaking and rescoring samples.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// Source of randomness owned by the allocator.
///
/// Any `RngCore + Send` qualifies, so tests can inject a seeded generator and
/// get reproducible batches.
pub trait RandomSource: RngCore + Send {}

impl<T: RngCore + Send> RandomSource for T {}

/// Boxed generator: seeded when `seed` is given, OS-seeded otherwise.
pub fn random_source(seed: Option<u64>) -> Box<dyn RandomSource> {
    match seed {
        Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
        None => Box::new(StdRng::from_os_rng()),
    }
}
