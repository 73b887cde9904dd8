use std::sync::Arc;

use crate::application::{AnswerPipeline, IngestionOrchestrator, SessionContext};
use crate::infrastructure::Config;

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionContext>,
    pub orchestrator: Arc<IngestionOrchestrator>,
    pub answer: Arc<AnswerPipeline>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        session: Arc<SessionContext>,
        orchestrator: Arc<IngestionOrchestrator>,
        answer: Arc<AnswerPipeline>,
        config: Config,
    ) -> Self {
        Self {
            session,
            orchestrator,
            answer,
            config: Arc::new(config),
        }
    }
}
