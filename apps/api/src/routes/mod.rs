pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::interview::handlers;
use crate::interview::onboarding::MAX_RESUME_BYTES;
use crate::state::AppState;

/// Multipart framing overhead on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;
/// Whisper-compatible endpoints accept up to 25 MB of audio.
const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Onboarding
        .route("/api/v1/domains", get(handlers::handle_list_domains))
        .route(
            "/api/v1/resume/extract",
            post(handlers::handle_extract_resume).layer(DefaultBodyLimit::max(
                MAX_RESUME_BYTES + MULTIPART_OVERHEAD_BYTES,
            )),
        )
        // Interview sessions
        .route("/api/v1/interviews", post(handlers::handle_create_interview))
        .route(
            "/api/v1/interviews/:id",
            get(handlers::handle_get_interview).delete(handlers::handle_delete_interview),
        )
        .route(
            "/api/v1/interviews/:id/answers",
            post(handlers::handle_submit_answer),
        )
        .route(
            "/api/v1/interviews/:id/end",
            post(handlers::handle_end_interview),
        )
        // Voice
        .route("/api/v1/speech", post(handlers::handle_synthesize))
        .route(
            "/api/v1/transcriptions",
            post(handlers::handle_transcribe).layer(DefaultBodyLimit::max(MAX_AUDIO_BYTES)),
        )
        .with_state(state)
}
