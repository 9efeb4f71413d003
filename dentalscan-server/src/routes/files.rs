//! Serves stored images at the URLs handed out by `submission.upload`

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::email::EmailSender;
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::{validate_key, BlobStore};
use crate::store::Store;

/// GET /files/*key
pub async fn get_file<S, B, E>(
    State(state): State<Arc<AppState<S, B, E>>>,
    Path(key): Path<String>,
) -> Result<Response, ApiError>
where
    S: Store,
    B: BlobStore,
    E: EmailSender,
{
    if validate_key(&key).is_err() {
        return Err(ApiError::not_found());
    }

    let object = state.blobs.get(&key)?.ok_or_else(ApiError::not_found)?;

    Ok((
        [
            (header::CONTENT_TYPE, object.content_type),
            (header::CACHE_CONTROL, "private, max-age=3600".to_string()),
        ],
        object.bytes,
    )
        .into_response())
}
