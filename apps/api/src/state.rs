use std::sync::Arc;

use crate::config::Config;
use crate::interview::store::SessionStore;
use crate::llm_client::GenerationService;
use crate::voice::{AudioSynthesizer, BatchTranscriber};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub llm: Arc<dyn GenerationService>,
    /// In-memory by default; Redis when `REDIS_URL` is set.
    pub sessions: Arc<dyn SessionStore>,
    /// `None` when no transcription backend is configured.
    pub transcriber: Option<Arc<dyn BatchTranscriber>>,
    /// `None` when no speech synthesis backend is configured.
    pub synthesizer: Option<Arc<dyn AudioSynthesizer>>,
    pub config: Config,
}
