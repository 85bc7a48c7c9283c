//! Application state shared across request handlers.

use std::sync::Arc;

use jury_allocator::Allocator;

use crate::db::Database;

/// Shared application state.
///
/// This is passed to all request handlers via Axum's state extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    allocator: Arc<Allocator>,
    db: Option<Database>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// `db` is `None` when scores live in memory.
    pub fn new(allocator: Arc<Allocator>, db: Option<Database>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { allocator, db }),
        }
    }

    /// Get a reference to the allocator.
    pub fn allocator(&self) -> &Allocator {
        &self.inner.allocator
    }

    /// Get a reference to the database, if one is configured.
    pub fn db(&self) -> Option<&Database> {
        self.inner.db.as_ref()
    }
}
