//! API handlers module

pub mod health;
pub mod query;
pub mod stores;
pub mod upload;

use crate::AppState;
use ragbridge_common::errors::{AppError, Result};

/// Resolve a store display name to its resource id, mapping an
/// unresolvable name to a 404. Query handlers do NOT use this: for them,
/// resolution failure is reported inside the answer, not as an error.
pub(crate) async fn resolve_store_id(state: &AppState, store_name: &str) -> Result<String> {
    state
        .provider
        .resolve_store(store_name)
        .await?
        .ok_or_else(|| AppError::StoreNotFound {
            name: store_name.to_string(),
        })
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::AppState;
    use ragbridge_common::{
        config::AppConfig, documents::DocumentIntake, gemini::MockFileSearch,
        search::SearchEngine,
    };
    use std::sync::Arc;

    /// Application state wired to the in-memory mock provider
    pub fn mock_state() -> AppState {
        let config = Arc::new(AppConfig::default());
        let provider = Arc::new(MockFileSearch::new());
        let engine = Arc::new(SearchEngine::new(provider.clone(), "mock-model"));
        let intake = Arc::new(DocumentIntake::new(provider.clone(), &config.intake));
        AppState {
            config,
            provider,
            engine,
            intake,
        }
    }
}
