//! Submission intake, history and analysis procedures

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use dentalscan_core::upload::{check_declared_size, decode_image, submission_key};
use dentalscan_core::{ImageMime, SubmissionStatus};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::auth::SuccessResponse;
use super::extract::{ApiJson, ApiQuery, CurrentUser};
use crate::email::EmailSender;
use crate::error::ApiError;
use crate::pipeline;
use crate::state::AppState;
use crate::storage::BlobStore;
use crate::store::{
    AnalysisResult, ImageQuality, NewAnalyticsEvent, NewSubmission, Page, Store, Submission,
    SubmissionId, User,
};

const DEFAULT_HISTORY_LIMIT: u32 = 20;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub file_name: String,
    pub file_size: u64,
    pub mime_type: String,
    #[serde(default)]
    pub image_quality: ImageQuality,
    pub image_base64: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub submission_id: SubmissionId,
    pub image_url: String,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRef {
    pub submission_id: u64,
}

#[derive(Serialize)]
pub struct SubmissionDetails {
    pub submission: Submission,
    pub analysis: Option<AnalysisResult>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub submission_id: SubmissionId,
    pub status: SubmissionStatus,
}

/// Load a submission owned by `user`; anything else is `NOT_FOUND`
fn owned_submission<S: Store>(store: &S, user: &User, id: u64) -> Result<Submission, ApiError> {
    store
        .get_submission(SubmissionId(id))?
        .filter(|s| s.user_id == user.id)
        .ok_or_else(ApiError::not_found)
}

/// POST /api/submission.upload
pub async fn upload<S, B, E>(
    State(state): State<Arc<AppState<S, B, E>>>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<UploadRequest>,
) -> Result<Json<UploadResponse>, ApiError>
where
    S: Store + 'static,
    B: BlobStore + 'static,
    E: EmailSender + 'static,
{
    check_declared_size(req.file_size)?;
    let mime = ImageMime::parse(&req.mime_type)?;
    let bytes = decode_image(&req.image_base64)?;

    let key = submission_key(user.id.0, Utc::now().timestamp_millis(), &req.file_name);
    let image_url = state.blobs.put(&key, &bytes, mime.as_str())?;

    let submission = state.store.create_submission(NewSubmission {
        user_id: user.id,
        image_key: key,
        image_url: image_url.clone(),
        file_name: req.file_name,
        mime_type: mime.as_str().to_string(),
        file_size: req.file_size,
        image_quality: req.image_quality,
    })?;

    state.store.track_event(NewAnalyticsEvent {
        event_type: "submission_uploaded".to_string(),
        user_id: Some(user.id),
        metadata: Some(json!({
            "submissionId": submission.id.0,
            "fileSize": req.file_size,
        })),
    })?;

    tracing::info!(
        user_id = user.id.0,
        submission_id = submission.id.0,
        size = bytes.len(),
        "Submission uploaded"
    );

    Ok(Json(UploadResponse {
        submission_id: submission.id,
        image_url,
    }))
}

/// GET /api/submission.getHistory
pub async fn get_history<S, B, E>(
    State(state): State<Arc<AppState<S, B, E>>>,
    CurrentUser(user): CurrentUser,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> Result<Json<Vec<Submission>>, ApiError>
where
    S: Store + 'static,
    B: BlobStore + 'static,
    E: EmailSender + 'static,
{
    let page = Page::new(
        query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT),
        query.offset.unwrap_or(0),
    );
    Ok(Json(state.store.list_user_submissions(user.id, page)?))
}

/// GET /api/submission.getDetails
pub async fn get_details<S, B, E>(
    State(state): State<Arc<AppState<S, B, E>>>,
    CurrentUser(user): CurrentUser,
    ApiQuery(query): ApiQuery<SubmissionRef>,
) -> Result<Json<SubmissionDetails>, ApiError>
where
    S: Store + 'static,
    B: BlobStore + 'static,
    E: EmailSender + 'static,
{
    let submission = owned_submission(state.store.as_ref(), &user, query.submission_id)?;
    let analysis = state.store.get_analysis_result(submission.id)?;

    Ok(Json(SubmissionDetails {
        submission,
        analysis,
    }))
}

/// POST /api/submission.delete
pub async fn delete<S, B, E>(
    State(state): State<Arc<AppState<S, B, E>>>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<SubmissionRef>,
) -> Result<Json<SuccessResponse>, ApiError>
where
    S: Store + 'static,
    B: BlobStore + 'static,
    E: EmailSender + 'static,
{
    let submission = owned_submission(state.store.as_ref(), &user, req.submission_id)?;

    if !state.store.delete_submission(submission.id)? {
        return Err(ApiError::not_found());
    }

    if let Err(e) = state.blobs.delete(&submission.image_key) {
        tracing::warn!(key = %submission.image_key, error = %e, "Failed to delete stored image");
    }

    tracing::info!(user_id = user.id.0, submission_id = submission.id.0, "Submission deleted");
    Ok(SuccessResponse::ok())
}

/// POST /api/submission.analyze
///
/// Starts analysis in the background; poll `submission.getDetails` for the result.
pub async fn analyze<S, B, E>(
    State(state): State<Arc<AppState<S, B, E>>>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<SubmissionRef>,
) -> Result<Json<AnalyzeResponse>, ApiError>
where
    S: Store + 'static,
    B: BlobStore + 'static,
    E: EmailSender + 'static,
{
    let mut submission = owned_submission(state.store.as_ref(), &user, req.submission_id)?;

    if !state.store.begin_analysis(submission.id)? {
        return Err(ApiError::Conflict(
            "Submission has already been analyzed".to_string(),
        ));
    }
    submission.status = SubmissionStatus::Analyzing;

    let submission_id = submission.id;
    pipeline::spawn_analysis(state.clone(), submission);

    Ok(Json(AnalyzeResponse {
        submission_id,
        status: SubmissionStatus::Analyzing,
    }))
}
