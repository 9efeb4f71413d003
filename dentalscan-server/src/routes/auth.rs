//! Sign-in, current user and logout

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;

use super::extract::{ApiJson, IdentityCallback};
use super::session::{clear_session_cookie, session_id, set_session_cookie, user_from_cookies};
use crate::email::EmailSender;
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::BlobStore;
use crate::store::{IdentityUpsert, Role, Store, User};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub open_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub login_method: Option<String>,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Json<Self> {
        Json(Self { success: true })
    }
}

/// POST /api/auth.signIn
///
/// Identity-provider callback: records the identity and starts a session.
/// Only the provider, holding the shared secret, may call it.
pub async fn sign_in<S, B, E>(
    State(state): State<Arc<AppState<S, B, E>>>,
    _callback: IdentityCallback,
    cookies: Cookies,
    ApiJson(req): ApiJson<SignInRequest>,
) -> Result<Json<User>, ApiError>
where
    S: Store + 'static,
    B: BlobStore + 'static,
    E: EmailSender + 'static,
{
    let open_id = req.open_id.trim();
    if open_id.is_empty() {
        return Err(ApiError::BadRequest("openId required".to_string()));
    }

    let is_owner = state.settings.owner_open_id.as_deref() == Some(open_id);
    let user = state.store.upsert_user(IdentityUpsert {
        open_id: open_id.to_string(),
        name: req.name,
        email: req.email,
        login_method: req.login_method,
        role: is_owner.then_some(Role::Admin),
    })?;

    // Replace any session this browser already had
    if let Some(previous) = session_id(&cookies) {
        state.store.delete_session(&previous)?;
    }
    let session = state.store.create_session(user.id)?;
    set_session_cookie(&cookies, &session.id);

    tracing::info!(user_id = user.id.0, role = user.role.as_str(), "User signed in");
    Ok(Json(user))
}

/// GET /api/auth.me
pub async fn me<S, B, E>(
    State(state): State<Arc<AppState<S, B, E>>>,
    cookies: Cookies,
) -> Result<Json<Option<User>>, ApiError>
where
    S: Store,
    B: BlobStore,
    E: EmailSender,
{
    let user = user_from_cookies(&cookies, state.store.as_ref())?;
    Ok(Json(user))
}

/// POST /api/auth.logout
pub async fn logout<S, B, E>(
    State(state): State<Arc<AppState<S, B, E>>>,
    cookies: Cookies,
) -> Result<Json<SuccessResponse>, ApiError>
where
    S: Store,
    B: BlobStore,
    E: EmailSender,
{
    if let Some(session_id) = session_id(&cookies) {
        state.store.delete_session(&session_id)?;
    }
    clear_session_cookie(&cookies);

    Ok(SuccessResponse::ok())
}
