use std::sync::Arc;

use crate::services::orchestrator::QuizOrchestrator;
use crate::services::store::JobStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn JobStore>,
    pub orchestrator: Arc<QuizOrchestrator>,
}

impl AppState {
    pub fn new(store: Arc<dyn JobStore>, orchestrator: Arc<QuizOrchestrator>) -> Self {
        Self {
            store,
            orchestrator,
        }
    }
}
