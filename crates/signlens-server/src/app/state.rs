use std::sync::Arc;

use signlens_application::TranslationPipeline;

/// State shared by every HTTP and WebSocket handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<TranslationPipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<TranslationPipeline>) -> Self {
        Self { pipeline }
    }
}
