//! Request extractors: JSON and query inputs, the identity callback check,
//! and the two access levels

use std::sync::Arc;

use axum::extract::{FromRequest, FromRequestParts, Query};
use axum::http::request::Parts;
use tower_cookies::Cookies;

use super::session::user_from_cookies;
use crate::email::EmailSender;
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::BlobStore;
use crate::store::{Role, Store, User};

/// JSON body whose rejection is reported as `BAD_REQUEST`
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string whose rejection is reported as `BAD_REQUEST`
#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// Header carrying the identity provider's shared secret on `auth.signIn`
pub const IDENTITY_SECRET_HEADER: &str = "x-identity-secret";

/// Proof that the request comes from the identity provider.
///
/// `UNAUTHORIZED` when the header is missing or wrong, and always while no
/// secret is configured.
pub struct IdentityCallback;

#[axum::async_trait]
impl<S, B, E> FromRequestParts<Arc<AppState<S, B, E>>> for IdentityCallback
where
    S: Store + 'static,
    B: BlobStore + 'static,
    E: EmailSender + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S, B, E>>,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.settings.identity_secret.as_deref() else {
            tracing::warn!("Sign-in refused: IDENTITY_SECRET is not configured");
            return Err(ApiError::Unauthorized);
        };

        let presented = parts
            .headers
            .get(IDENTITY_SECRET_HEADER)
            .map(|v| v.as_bytes())
            .unwrap_or_default();

        if !secrets_match(presented, expected.as_bytes()) {
            tracing::warn!("Sign-in refused: identity callback secret missing or wrong");
            return Err(ApiError::Unauthorized);
        }
        Ok(IdentityCallback)
    }
}

/// Compare without stopping at the first differing byte
fn secrets_match(presented: &[u8], expected: &[u8]) -> bool {
    presented.len() == expected.len()
        && presented
            .iter()
            .zip(expected)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// A signed-in caller; `UNAUTHORIZED` without a valid session
pub struct CurrentUser(pub User);

#[axum::async_trait]
impl<S, B, E> FromRequestParts<Arc<AppState<S, B, E>>> for CurrentUser
where
    S: Store + 'static,
    B: BlobStore + 'static,
    E: EmailSender + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S, B, E>>,
    ) -> Result<Self, Self::Rejection> {
        let cookies = Cookies::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| ApiError::Internal(msg.to_string()))?;

        user_from_cookies(&cookies, state.store.as_ref())?
            .map(CurrentUser)
            .ok_or(ApiError::Unauthorized)
    }
}

/// A signed-in admin; `FORBIDDEN` for any other signed-in caller
pub struct AdminUser(pub User);

#[axum::async_trait]
impl<S, B, E> FromRequestParts<Arc<AppState<S, B, E>>> for AdminUser
where
    S: Store + 'static,
    B: BlobStore + 'static,
    E: EmailSender + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S, B, E>>,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;

        if user.role != Role::Admin {
            tracing::warn!(user_id = user.id.0, "Non-admin attempted an admin procedure");
            return Err(ApiError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}
