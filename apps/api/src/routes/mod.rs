pub mod health;
pub mod sessions;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::state::AppState;

/// Transport ceiling for uploads. Kept above the 5 MiB document limit so oversized
/// files reach the extractor and fail with a validation error instead of a 413.
pub const UPLOAD_BODY_LIMIT: usize = 16 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Sessions
        .route("/api/v1/sessions", post(sessions::handle_create_session))
        .route(
            "/api/v1/sessions/:id",
            get(sessions::handle_get_session).delete(sessions::handle_delete_session),
        )
        // Intake
        .route(
            "/api/v1/sessions/:id/resume/upload",
            post(sessions::handle_upload_resume).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/v1/sessions/:id/resume", put(sessions::handle_set_resume))
        .route(
            "/api/v1/sessions/:id/job-description",
            put(sessions::handle_set_job_description),
        )
        // Transitions
        .route("/api/v1/sessions/:id/score", post(sessions::handle_score))
        .route("/api/v1/sessions/:id/optimize", post(sessions::handle_optimize))
        .route(
            "/api/v1/sessions/:id/interview-prep",
            post(sessions::handle_interview_prep),
        )
        .route("/api/v1/sessions/:id/reset", post(sessions::handle_reset))
        .route("/api/v1/sessions/:id/export", get(sessions::handle_export))
        .with_state(state)
}
