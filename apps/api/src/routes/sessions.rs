use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::session::SessionIdentity;
use crate::state::AppState;
use crate::workflow::{PipelineState, Workflow, EXPORT_MEDIA_TYPE};

/// Header carrying the opaque user identifier, read once at session creation.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Multipart field that carries the uploaded résumé.
const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub state: PipelineState,
    pub busy: bool,
}

#[derive(Debug, Deserialize)]
pub struct TextBody {
    pub text: String,
}

async fn find(state: &AppState, id: Uuid) -> Result<Arc<Workflow>, AppError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session {id} does not exist")))
}

async fn respond(id: Uuid, workflow: &Workflow) -> Json<SessionResponse> {
    Json(SessionResponse {
        session_id: id,
        state: workflow.snapshot().await,
        busy: workflow.is_busy(),
    })
}

/// POST /api/v1/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> (StatusCode, Json<SessionResponse>) {
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let workflow = state.workflow_for(SessionIdentity::new(user_id));
    let (id, workflow) = state.sessions.create(workflow).await;
    (StatusCode::CREATED, respond(id, &workflow).await)
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let workflow = find(&state, id).await?;
    Ok(respond(id, &workflow).await)
}

/// DELETE /api/v1/sessions/:id
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.sessions.remove(id).await {
        return Err(AppError::NotFound(format!("Session {id} does not exist")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/sessions/:id/resume/upload
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<SessionResponse>, AppError> {
    let workflow = find(&state, id).await?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed upload: {e}")))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(str::to_owned);
        let media_type = declared_media_type(field.content_type(), file_name.as_deref());
        let blob: Bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Malformed upload: {e}")))?;

        workflow.ingest_document(blob, &media_type, file_name).await?;
        return Ok(respond(id, &workflow).await);
    }

    Err(AppError::Validation(format!(
        "Upload must contain a '{UPLOAD_FIELD}' field"
    )))
}

/// Falls back to the file extension when the part carries no usable content type.
fn declared_media_type(content_type: Option<&str>, file_name: Option<&str>) -> String {
    match content_type {
        Some(ct) if !ct.trim().is_empty() && ct != "application/octet-stream" => ct.to_string(),
        fallback => {
            let extension = file_name
                .and_then(|n| n.rsplit_once('.'))
                .map(|(_, ext)| ext.to_ascii_lowercase());
            match extension.as_deref() {
                Some("pdf") => "application/pdf".to_string(),
                Some("txt") => "text/plain".to_string(),
                _ => fallback.unwrap_or("application/octet-stream").to_string(),
            }
        }
    }
}

/// PUT /api/v1/sessions/:id/resume
pub async fn handle_set_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<TextBody>,
) -> Result<Json<SessionResponse>, AppError> {
    let workflow = find(&state, id).await?;
    workflow.set_resume_text(body.text).await?;
    Ok(respond(id, &workflow).await)
}

/// PUT /api/v1/sessions/:id/job-description
pub async fn handle_set_job_description(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<TextBody>,
) -> Result<Json<SessionResponse>, AppError> {
    let workflow = find(&state, id).await?;
    workflow.set_job_description(body.text).await?;
    Ok(respond(id, &workflow).await)
}

/// POST /api/v1/sessions/:id/score
pub async fn handle_score(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let workflow = find(&state, id).await?;
    workflow.run_scoring().await?;
    Ok(respond(id, &workflow).await)
}

/// POST /api/v1/sessions/:id/optimize
pub async fn handle_optimize(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let workflow = find(&state, id).await?;
    workflow.run_optimization().await?;
    Ok(respond(id, &workflow).await)
}

/// POST /api/v1/sessions/:id/interview-prep
pub async fn handle_interview_prep(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let workflow = find(&state, id).await?;
    workflow.run_interview_prep().await?;
    Ok(respond(id, &workflow).await)
}

/// POST /api/v1/sessions/:id/reset
pub async fn handle_reset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let workflow = find(&state, id).await?;
    workflow.reset().await;
    Ok(respond(id, &workflow).await)
}

/// GET /api/v1/sessions/:id/export
pub async fn handle_export(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let workflow = find(&state, id).await?;
    let exported = workflow.export_optimized_resume().await?;
    Ok((
        [
            (header::CONTENT_TYPE, EXPORT_MEDIA_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, exported.content_disposition()),
        ],
        exported.bytes,
    )
        .into_response())
}
