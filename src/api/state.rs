//! Shared state passed to all API handlers.

use std::sync::Arc;

use crate::storage::{LastValueRepository, TimeSeriesRepository};

/// Handles to the two stores the read side joins over.
#[derive(Clone)]
pub struct ApiState {
    /// Catalog + history (source of truth).
    pub store: Arc<dyn TimeSeriesRepository>,

    /// Live last values.
    pub cache: Arc<dyn LastValueRepository>,
}

impl ApiState {
    pub fn new(store: Arc<dyn TimeSeriesRepository>, cache: Arc<dyn LastValueRepository>) -> Self {
        Self { store, cache }
    }
}
