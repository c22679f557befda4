use std::sync::Arc;

use sqlx::PgPool;

use crate::core::config::Settings;
use crate::services::ai_assistant::AiAssistant;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: PgPool,
    ai: Option<AiAssistant>,
}

impl AppState {
    pub(crate) fn new(settings: Settings, db: PgPool, ai: Option<AiAssistant>) -> Self {
        Self { inner: Arc::new(InnerState { settings, db, ai }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &PgPool {
        &self.inner.db
    }

    pub(crate) fn ai(&self) -> Option<&AiAssistant> {
        self.inner.ai.as_ref()
    }
}
