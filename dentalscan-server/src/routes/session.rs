//! Session cookie helpers

use tower_cookies::{Cookie, Cookies};

use crate::store::{SessionId, SessionStore, StoreResult, User, UserStore};

pub const SESSION_COOKIE: &str = "dentalscan_session";

/// Session id carried by the request, if any
pub fn session_id(cookies: &Cookies) -> Option<SessionId> {
    cookies
        .get(SESSION_COOKIE)
        .map(|c| SessionId(c.value().to_string()))
        .filter(|id| !id.0.is_empty())
}

/// Resolve the signed-in user from the session cookie.
///
/// A cookie naming an unknown session, or a session whose user no longer
/// exists, is treated as signed out.
pub fn user_from_cookies<S>(cookies: &Cookies, store: &S) -> StoreResult<Option<User>>
where
    S: SessionStore + UserStore,
{
    let Some(session_id) = session_id(cookies) else {
        return Ok(None);
    };
    let Some(session) = store.get_session(&session_id)? else {
        return Ok(None);
    };
    store.get_user(session.user_id)
}

pub fn set_session_cookie(cookies: &Cookies, session_id: &SessionId) {
    let cookie = Cookie::build((SESSION_COOKIE, session_id.0.clone()))
        .path("/")
        .http_only(true)
        .same_site(tower_cookies::cookie::SameSite::Lax)
        .build();
    cookies.add(cookie);
}

pub fn clear_session_cookie(cookies: &Cookies) {
    let cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .max_age(tower_cookies::cookie::time::Duration::ZERO)
        .build();
    cookies.add(cookie);
}
